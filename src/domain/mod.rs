use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;

pub mod error;
pub mod schema;

pub use error::{MockError, MockResult};
pub use schema::SchemaNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Case-insensitive parse of a method name.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request as handed to route handlers by the HTTP layer. The body is already
/// parsed JSON; `params` holds the values captured by `:name` path segments.
#[derive(Debug, Clone, Default)]
pub struct MockRequest {
    pub method: HttpMethod,
    pub path: String,
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Option<Value>,
    pub headers: HashMap<String, String>,
}

impl MockRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Response produced by a route. A `None` body is sent as an empty payload.
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl MockResponse {
    pub fn new(status: u16, body: Option<Value>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(200, Some(body))
    }

    pub fn created(body: Value) -> Self {
        Self::new(201, Some(body))
    }

    pub fn no_content() -> Self {
        Self::new(204, None)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Structured body for a genuine failure; `injected` is always false so
    /// clients can tell these apart from scenario faults.
    pub fn from_error(error: &MockError) -> Self {
        Self::new(
            error.status(),
            Some(json!({
                "error": {
                    "kind": error.kind(),
                    "message": error.to_string(),
                    "injected": false,
                }
            })),
        )
    }
}

/// Per-call options for value generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Only required object properties are generated when set.
    pub strict: bool,
    /// Name of the property being generated, used by heuristics.
    pub property_name: Option<String>,
    pub use_cache: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            strict: false,
            property_name: None,
            use_cache: true,
        }
    }
}

impl GenerateOptions {
    pub fn uncached() -> Self {
        Self {
            use_cache: false,
            ..Default::default()
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse_is_case_insensitive() {
        assert_eq!(HttpMethod::parse("delete"), Some(HttpMethod::Delete));
        assert_eq!(HttpMethod::parse("Get"), Some(HttpMethod::Get));
        assert_eq!(HttpMethod::parse("TRACE"), None);
    }

    #[test]
    fn test_error_response_is_not_injected() {
        let response = MockResponse::from_error(&MockError::Validation("missing name".into()));
        assert_eq!(response.status, 400);
        let body = response.body.unwrap();
        assert_eq!(body["error"]["kind"], "validation");
        assert_eq!(body["error"]["injected"], false);
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let response = MockResponse::ok(json!([])).with_header("X-Total-Count", "0");
        assert_eq!(response.header("x-total-count"), Some("0"));
    }
}
