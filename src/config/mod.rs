use anyhow::Context as _;
use config::{Config, File};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub mod validator;
pub mod watcher;

use crate::adapters::result_cache::{ResultCache, DEFAULT_CAPACITY};
use crate::adapters::route_table::{RouteOptions, DEFAULT_PREFIX, DEFAULT_SEED_COUNT};
use crate::adapters::scenario::{
    Scenario, ScenarioPolicy, DEFAULT_FAULT_PROBABILITY, DEFAULT_LATENCY_BASE_MS,
    DEFAULT_LATENCY_JITTER_MS,
};
use crate::adapters::value_generator::{CircularPolicy, GeneratorTuning};
use crate::cli::Cli;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerSettings,
    #[serde(default)]
    pub schema: SchemaSettings,
    #[serde(default)]
    pub generator: GeneratorSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub routes: RouteSettings,
    #[serde(default)]
    pub scenario: ScenarioSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SchemaSettings {
    /// JSON or YAML schema document the routes are derived from
    pub path: Option<PathBuf>,
    /// Rebuild the route table when the schema file changes
    #[serde(default)]
    pub watch: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Fixed seed for reproducible output; entropy when absent
    pub seed: Option<u64>,
    /// Generate required properties only and validate request bodies
    pub strict: bool,
    pub optional_probability: f64,
    pub circular_policy: CircularPolicy,
    pub max_extra_properties: usize,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        let tuning = GeneratorTuning::default();
        Self {
            seed: None,
            strict: false,
            optional_probability: tuning.optional_probability,
            circular_policy: tuning.circular_policy,
            max_extra_properties: tuning.max_extra_properties,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub capacity: usize,
    pub ttl_seconds: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_CAPACITY,
            ttl_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteSettings {
    pub prefix: String,
    pub resource_name: Option<String>,
    pub base_path: Option<String>,
    /// Records generated when a resource is first listed
    pub seed_count: usize,
    /// Wrap payloads in `{"data": ...}` envelopes
    pub wrap: bool,
}

impl Default for RouteSettings {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            resource_name: None,
            base_path: None,
            seed_count: DEFAULT_SEED_COUNT,
            wrap: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScenarioSettings {
    pub active: Scenario,
    pub fault_probability: f64,
    pub latency_base_ms: u64,
    pub latency_jitter_ms: u64,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            active: Scenario::HappyPath,
            fault_probability: DEFAULT_FAULT_PROBABILITY,
            latency_base_ms: DEFAULT_LATENCY_BASE_MS,
            latency_jitter_ms: DEFAULT_LATENCY_JITTER_MS,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, anyhow::Error> {
        Self::from_root(".")
    }

    /// Load `<root>/schemock.{toml,yaml,json}` if present, falling back to
    /// defaults, and validate the result.
    pub fn from_root(root: &str) -> Result<Self, anyhow::Error> {
        let root = Path::new(root);
        let mut settings = Self::load(File::from(root.join("schemock")).required(false))?;
        settings.resolve_schema_path(root);
        settings.validate()?;
        Ok(settings)
    }

    /// Create settings from CLI arguments (config file, then CLI/env overrides)
    pub fn new_with_cli(cli: &Cli) -> Result<Self, anyhow::Error> {
        let config_path = &cli.config;
        let mut settings = Self::load(File::from(config_path.clone()).required(false))?;

        let root = config_path.parent().unwrap_or_else(|| Path::new("."));
        settings.resolve_schema_path(root);

        // CLI > env vars > config file
        settings.apply_cli_overrides(cli);
        settings.validate()?;
        Ok(settings)
    }

    fn load<T>(source: T) -> Result<Self, anyhow::Error>
    where
        T: config::Source + Send + Sync + 'static,
    {
        let s = Config::builder()
            .add_source(source)
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .build()?;
        Ok(s.try_deserialize()?)
    }

    /// Relative schema paths in a config file are relative to that file.
    fn resolve_schema_path(&mut self, root: &Path) {
        if let Some(path) = &self.schema.path {
            if path.is_relative() && !root.as_os_str().is_empty() {
                self.schema.path = Some(root.join(path));
            }
        }
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        validator::ConfigValidator::validate(self).map_err(|errors| {
            let error_messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            anyhow::anyhow!(
                "Configuration validation failed:\n{}",
                error_messages.join("\n")
            )
        })
    }

    /// Apply CLI argument overrides to settings
    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(schema) = &cli.schema {
            self.schema.path = Some(schema.clone());
        }
        if cli.watch {
            self.schema.watch = true;
        }
        if let Some(seed) = cli.seed {
            self.generator.seed = Some(seed);
        }
        if cli.strict {
            self.generator.strict = true;
        }
        if cli.no_cache {
            self.cache.enabled = false;
        }
        if let Some(prefix) = &cli.prefix {
            self.routes.prefix = prefix.clone();
        }
        if let Some(resource) = &cli.resource {
            self.routes.resource_name = Some(resource.clone());
        }
        if let Some(base_path) = &cli.base_path {
            self.routes.base_path = Some(base_path.clone());
        }
        if cli.wrap {
            self.routes.wrap = true;
        }
        if let Some(scenario) = cli.scenario {
            self.scenario.active = scenario;
        }
    }

    /// Read and parse the configured schema document.
    pub fn load_schema(&self) -> Result<Value, anyhow::Error> {
        let path = self
            .schema
            .path
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No schema configured: set schema.path or pass --schema"))?;
        load_schema_file(path)
    }

    pub fn generator_tuning(&self) -> GeneratorTuning {
        GeneratorTuning {
            optional_probability: self.generator.optional_probability,
            circular_policy: self.generator.circular_policy,
            max_extra_properties: self.generator.max_extra_properties,
        }
    }

    pub fn route_options(&self) -> RouteOptions {
        RouteOptions {
            resource_name: self.routes.resource_name.clone(),
            base_path: self.routes.base_path.clone(),
            prefix: self.routes.prefix.clone(),
            strict: self.generator.strict,
            seed_count: self.routes.seed_count,
            wrap: self.routes.wrap,
        }
    }

    pub fn scenario_policy(&self) -> ScenarioPolicy {
        ScenarioPolicy {
            scenario: self.scenario.active,
            fault_probability: self.scenario.fault_probability,
            latency_base: Duration::from_millis(self.scenario.latency_base_ms),
            latency_jitter: Duration::from_millis(self.scenario.latency_jitter_ms),
        }
    }

    /// Result cache per the `cache` section, or `None` when disabled.
    pub fn build_cache(&self) -> Option<Arc<ResultCache>> {
        if !self.cache.enabled {
            return None;
        }
        let cache = match self.cache.ttl_seconds {
            Some(ttl) => ResultCache::with_ttl(self.cache.capacity, Duration::from_secs(ttl)),
            None => ResultCache::new(self.cache.capacity),
        };
        Some(Arc::new(cache))
    }
}

/// Parse a schema file. `.yaml`/`.yml` files are read as YAML, everything
/// else as JSON with a YAML fallback.
pub fn load_schema_file(path: &Path) -> Result<Value, anyhow::Error> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    if is_yaml {
        return serde_yaml::from_str(&text)
            .with_context(|| format!("Invalid YAML in {}", path.display()));
    }
    match serde_json::from_str(&text) {
        Ok(value) => Ok(value),
        Err(json_err) => serde_yaml::from_str(&text).map_err(|_| {
            anyhow::anyhow!("Invalid JSON in {}: {}", path.display(), json_err)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::from_root(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 3000);
        assert!(settings.cache.enabled);
        assert_eq!(settings.cache.capacity, 256);
        assert_eq!(settings.generator.optional_probability, 0.9);
        assert_eq!(settings.scenario.active, Scenario::HappyPath);
        assert_eq!(settings.scenario.fault_probability, 0.3);
        assert_eq!(settings.routes.prefix, "api");
        assert!(settings.schema.path.is_none());
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("schemock.toml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            "[server]\nhost = \"0.0.0.0\"\nport = 4000\n\n[schema]\npath = \"user.json\"\n\n[scenario]\nactive = \"slow\""
        )
        .unwrap();

        let cli = Cli::parse_from([
            "schemock",
            "--config",
            config_path.to_str().unwrap(),
            "--port",
            "5000",
            "--seed",
            "9",
            "--no-cache",
        ]);
        let settings = Settings::new_with_cli(&cli).unwrap();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 5000);
        assert_eq!(settings.generator.seed, Some(9));
        assert!(!settings.cache.enabled);
        assert!(settings.build_cache().is_none());
        assert_eq!(settings.scenario.active, Scenario::Slow);
        assert_eq!(settings.schema.path, Some(dir.path().join("user.json")));
    }

    #[test]
    fn test_load_yaml_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.yaml");
        std::fs::write(&path, "type: object\ntitle: User\nrequired: [id]\n").unwrap();
        let schema = load_schema_file(&path).unwrap();
        assert_eq!(schema["title"], "User");
        assert_eq!(schema["required"][0], "id");
    }

    #[test]
    fn test_invalid_schema_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_schema_file(&path).is_err());
        assert!(load_schema_file(&dir.path().join("missing.json")).is_err());
    }
}
