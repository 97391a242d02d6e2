use thiserror::Error;

/// Errors raised by schema parsing, value generation and route handling.
///
/// Circular references are not errors under the default policy; they only
/// surface as [`MockError::CircularRef`] when the generator is configured to
/// reject them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MockError {
    #[error("Schema parse error: {0}")]
    SchemaParse(String),

    #[error("Unresolvable $ref '{pointer}': {reason}")]
    SchemaRef { pointer: String, reason: String },

    #[error("Circular $ref detected at '{0}'")]
    CircularRef(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No route for {method} {path}")]
    RouteNotFound { method: String, path: String },
}

impl MockError {
    pub fn schema_ref(pointer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaRef {
            pointer: pointer.into(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable tag used in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SchemaParse(_) => "schema_parse",
            Self::SchemaRef { .. } => "schema_ref",
            Self::CircularRef(_) => "circular_ref",
            Self::Validation(_) => "validation",
            Self::RouteNotFound { .. } => "route_not_found",
        }
    }

    /// HTTP status the request boundary maps this error to.
    pub fn status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::RouteNotFound { .. } => 404,
            Self::SchemaParse(_) | Self::SchemaRef { .. } | Self::CircularRef(_) => 500,
        }
    }
}

pub type MockResult<T> = Result<T, MockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(MockError::Validation("bad".into()).status(), 400);
        assert_eq!(MockError::schema_ref("#/a", "missing").status(), 500);
        assert_eq!(
            MockError::RouteNotFound {
                method: "GET".into(),
                path: "/x".into()
            }
            .status(),
            404
        );
    }

    #[test]
    fn test_display_includes_pointer() {
        let err = MockError::schema_ref("#/definitions/User", "missing segment 'User'");
        assert!(err.to_string().contains("#/definitions/User"));
        assert_eq!(err.kind(), "schema_ref");
    }
}
