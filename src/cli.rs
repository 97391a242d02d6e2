use clap::Parser;
use std::path::PathBuf;

use crate::adapters::scenario::Scenario;

/// Schemock - serve realistic mock REST APIs straight from a JSON Schema
#[derive(Parser, Debug, Clone)]
#[command(name = "schemock", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "SCHEMOCK_CONFIG", default_value = "schemock.toml")]
    pub config: PathBuf,

    /// JSON or YAML schema to derive routes from
    #[arg(short, long, env = "SCHEMOCK_SCHEMA")]
    pub schema: Option<PathBuf>,

    /// Server host address
    #[arg(long, env = "SCHEMOCK_HOST")]
    pub host: Option<String>,

    /// Server port
    #[arg(short, long, env = "SCHEMOCK_PORT")]
    pub port: Option<u16>,

    /// Seed for reproducible generated data
    #[arg(long, env = "SCHEMOCK_SEED")]
    pub seed: Option<u64>,

    /// Active scenario: happy-path, slow, error-heavy or sad-path
    #[arg(long, env = "SCHEMOCK_SCENARIO")]
    pub scenario: Option<Scenario>,

    /// Path prefix for generated CRUD routes
    #[arg(long, env = "SCHEMOCK_PREFIX")]
    pub prefix: Option<String>,

    /// Resource name override (defaults to the pluralized schema title)
    #[arg(long, env = "SCHEMOCK_RESOURCE")]
    pub resource: Option<String>,

    /// Full base path override for CRUD routes
    #[arg(long, env = "SCHEMOCK_BASE_PATH")]
    pub base_path: Option<String>,

    /// Only generate required properties and validate request bodies
    #[arg(long, env = "SCHEMOCK_STRICT")]
    pub strict: bool,

    /// Disable the generation cache
    #[arg(long, env = "SCHEMOCK_NO_CACHE")]
    pub no_cache: bool,

    /// Reload routes when the schema file changes
    #[arg(short, long, env = "SCHEMOCK_WATCH")]
    pub watch: bool,

    /// Wrap responses in {"data": ...} envelopes
    #[arg(long, env = "SCHEMOCK_WRAP")]
    pub wrap: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["schemock"]);
        assert_eq!(cli.config, PathBuf::from("schemock.toml"));
        assert!(cli.schema.is_none());
        assert!(cli.host.is_none());
        assert!(cli.port.is_none());
        assert!(cli.scenario.is_none());
        assert!(!cli.strict);
        assert!(!cli.watch);
    }

    #[test]
    fn test_cli_with_args() {
        let cli = Cli::parse_from([
            "schemock",
            "--config",
            "custom.toml",
            "--schema",
            "user.yaml",
            "--host",
            "0.0.0.0",
            "--port",
            "8080",
            "--seed",
            "42",
            "--scenario",
            "error-heavy",
            "--resource",
            "people",
            "--strict",
            "--no-cache",
            "--watch",
            "--wrap",
        ]);
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        assert_eq!(cli.schema, Some(PathBuf::from("user.yaml")));
        assert_eq!(cli.host, Some("0.0.0.0".to_string()));
        assert_eq!(cli.port, Some(8080));
        assert_eq!(cli.seed, Some(42));
        assert_eq!(cli.scenario, Some(Scenario::ErrorHeavy));
        assert_eq!(cli.resource, Some("people".to_string()));
        assert!(cli.strict && cli.no_cache && cli.watch && cli.wrap);
    }

    #[test]
    fn test_unknown_scenario_rejected() {
        assert!(Cli::try_parse_from(["schemock", "--scenario", "chaos"]).is_err());
    }
}
