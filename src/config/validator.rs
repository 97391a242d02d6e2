use thiserror::Error;

use crate::adapters::route_table::validate_resource_name;
use crate::config::{
    CacheSettings, GeneratorSettings, RouteSettings, ScenarioSettings, ServerSettings, Settings,
};

pub const MAX_CACHE_CAPACITY: usize = 100_000;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ValidationError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(settings: &Settings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        Self::validate_server(&settings.server, &mut errors);
        Self::validate_generator(&settings.generator, &mut errors);
        Self::validate_cache(&settings.cache, &mut errors);
        Self::validate_routes(&settings.routes, &mut errors);
        Self::validate_scenario(&settings.scenario, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_server(server: &ServerSettings, errors: &mut Vec<ValidationError>) {
        if server.host.is_empty() {
            errors.push(ValidationError::MissingField("server.host".to_string()));
        }

        if server.port == 0 {
            errors.push(ValidationError::invalid(
                "server.port",
                "Port must be greater than 0",
            ));
        }
    }

    fn validate_generator(generator: &GeneratorSettings, errors: &mut Vec<ValidationError>) {
        if !is_probability(generator.optional_probability) {
            errors.push(ValidationError::invalid(
                "generator.optional_probability",
                "Must be between 0.0 and 1.0",
            ));
        }
    }

    fn validate_cache(cache: &CacheSettings, errors: &mut Vec<ValidationError>) {
        if !(1..=MAX_CACHE_CAPACITY).contains(&cache.capacity) {
            errors.push(ValidationError::invalid(
                "cache.capacity",
                format!("Must be between 1 and {}", MAX_CACHE_CAPACITY),
            ));
        }
        if cache.ttl_seconds == Some(0) {
            errors.push(ValidationError::invalid(
                "cache.ttl_seconds",
                "Must be greater than 0 when set",
            ));
        }
    }

    fn validate_routes(routes: &RouteSettings, errors: &mut Vec<ValidationError>) {
        if let Some(name) = &routes.resource_name {
            if let Err(e) = validate_resource_name(name) {
                errors.push(ValidationError::invalid("routes.resource_name", e.to_string()));
            }
        }

        if routes.prefix.trim_matches('/').contains('/') {
            errors.push(ValidationError::invalid(
                "routes.prefix",
                "Must be a single path segment",
            ));
        }

        if let Some(base_path) = &routes.base_path {
            if base_path.trim_matches('/').is_empty() {
                errors.push(ValidationError::invalid(
                    "routes.base_path",
                    "Must not be empty",
                ));
            }
        }
    }

    fn validate_scenario(scenario: &ScenarioSettings, errors: &mut Vec<ValidationError>) {
        if !is_probability(scenario.fault_probability) {
            errors.push(ValidationError::invalid(
                "scenario.fault_probability",
                "Must be between 0.0 and 1.0",
            ));
        }
    }
}

fn is_probability(p: f64) -> bool {
    (0.0..=1.0).contains(&p)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_settings() -> Settings {
        Settings {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            schema: Default::default(),
            generator: Default::default(),
            cache: Default::default(),
            routes: Default::default(),
            scenario: Default::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(ConfigValidator::validate(&valid_settings()).is_ok());
    }

    #[test]
    fn test_invalid_port() {
        let mut settings = valid_settings();
        settings.server.port = 0;

        let errors = ConfigValidator::validate(&settings).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("server.port"));
    }

    #[test]
    fn test_collects_every_error() {
        let mut settings = valid_settings();
        settings.server.host = String::new();
        settings.cache.capacity = 0;
        settings.generator.optional_probability = 1.5;
        settings.scenario.fault_probability = -0.1;
        settings.routes.resource_name = Some("bad name".to_string());
        settings.routes.prefix = "v1/api".to_string();

        let errors = ConfigValidator::validate(&settings).unwrap_err();
        assert_eq!(errors.len(), 6);
    }

    #[test]
    fn test_nan_probability_rejected() {
        let mut settings = valid_settings();
        settings.scenario.fault_probability = f64::NAN;
        assert!(ConfigValidator::validate(&settings).is_err());
    }
}
