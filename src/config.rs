//! Configuration management for stacksmith
//!
//! Settings load from `STACKSMITH_*` environment variables with defaults. A
//! YAML or JSON file passed with `--config` is applied on top, so file values
//! win over the environment.
//!
//! # Environment Variables
//!
//! - `STACKSMITH_PROVIDER`: reasoning provider (ollama|openai|anthropic|gemini|xai|groq). Unset means heuristic-only.
//! - `STACKSMITH_MODEL`: model name - default: "qwen2.5-coder:7b"
//! - `STACKSMITH_REQUEST_TIMEOUT`: arbitration timeout in seconds - default: "30"
//! - `STACKSMITH_RETRY_BACKOFF_MS`: delay before the single retry - default: "500"
//! - `STACKSMITH_MAX_DEPTH`, `STACKSMITH_MAX_FILES`, `STACKSMITH_BYTE_BUDGET`: scan limits
//! - `STACKSMITH_THRESHOLD`: shortlist threshold - default: "0.5"
//! - `STACKSMITH_DEFAULT_DATA_STORE`: kind used when nothing is detected - default: "postgresql"
//! - `STACKSMITH_FEATURES`: comma list of cache, search, monitoring, ci - default: "cache,search"
//! - `STACKSMITH_TIER`, `STACKSMITH_SCALE`: environment tier and scale
//! - `STACKSMITH_DB_PASSWORD`: primary data-store password (generated when unset)
//! - `STACKSMITH_HEURISTIC_LOG`: JSONL file for arbitration exchanges
//! - `STACKSMITH_LOG_LEVEL`: logging level - default: "info"
//!
//! Provider credentials are read by genai from the usual variables
//! (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, `OLLAMA_HOST`, ...).
//!
//! # Example
//!
//! ```no_run
//! use stacksmith::StacksmithConfig;
//! use std::path::Path;
//!
//! let config = StacksmithConfig::load(Some(Path::new("stacksmith.yaml"))).unwrap();
//! config.validate().unwrap();
//! let classifier = config.classifier(false);
//! ```

use crate::classify::{ArbitrationConfig, Arbiter, Classifier, ScanConfig};
use crate::heuristics::HeuristicLogger;
use crate::llm::{GenAIClient, LLMClient};
use crate::stack::{
    AdapterRegistry, AssemblyOptions, DataStoreConfig, DataStoreKind, FeatureSet, Scale,
    StackAssembler, Tier,
};
use crate::util::logging::{parse_level, LOG_LEVELS};
use clap::ValueEnum;
use genai::adapter::AdapterKind;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_MODEL: &str = "qwen2.5-coder:7b";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;
const DEFAULT_THRESHOLD: f64 = 0.5;
const MAX_REQUEST_TIMEOUT_SECS: u64 = 600;
const MAX_SCAN_DEPTH: usize = 64;
const MIN_BYTE_BUDGET: usize = 1024;
const MAX_BYTE_BUDGET: usize = 256 * 1024 * 1024;

pub const PROVIDER_ENV: &str = "STACKSMITH_PROVIDER";
pub const MODEL_ENV: &str = "STACKSMITH_MODEL";
pub const REQUEST_TIMEOUT_ENV: &str = "STACKSMITH_REQUEST_TIMEOUT";
pub const RETRY_BACKOFF_ENV: &str = "STACKSMITH_RETRY_BACKOFF_MS";
pub const MAX_DEPTH_ENV: &str = "STACKSMITH_MAX_DEPTH";
pub const MAX_FILES_ENV: &str = "STACKSMITH_MAX_FILES";
pub const BYTE_BUDGET_ENV: &str = "STACKSMITH_BYTE_BUDGET";
pub const THRESHOLD_ENV: &str = "STACKSMITH_THRESHOLD";
pub const DEFAULT_DATA_STORE_ENV: &str = "STACKSMITH_DEFAULT_DATA_STORE";
pub const FEATURES_ENV: &str = "STACKSMITH_FEATURES";
pub const TIER_ENV: &str = "STACKSMITH_TIER";
pub const SCALE_ENV: &str = "STACKSMITH_SCALE";
pub const DB_PASSWORD_ENV: &str = "STACKSMITH_DB_PASSWORD";
pub const HEURISTIC_LOG_ENV: &str = "STACKSMITH_HEURISTIC_LOG";
pub use crate::util::logging::LOG_LEVEL_ENV;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid provider: {0}. Valid options: ollama, openai, anthropic, gemini, xai, groq")]
    InvalidProvider(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },

    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {message}")]
    FileFormat { path: PathBuf, message: String },
}

pub fn parse_provider(s: &str) -> Result<AdapterKind, ConfigError> {
    AdapterKind::from_lower_str(&s.trim().to_lowercase())
        .ok_or_else(|| ConfigError::InvalidProvider(s.to_string()))
}

/// Shape of the `--config` file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    provider: Option<String>,
    model: Option<String>,
    request_timeout_secs: Option<u64>,
    retry_backoff_ms: Option<u64>,
    scan: Option<ScanConfig>,
    shortlist_threshold: Option<f64>,
    default_data_store: Option<String>,
    features: Option<Vec<String>>,
    tier: Option<String>,
    scale: Option<String>,
    data_store: Option<DataStoreConfig>,
    heuristic_log: Option<PathBuf>,
    log_level: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StacksmithConfig {
    /// Reasoning provider; `None` runs heuristics only.
    pub provider: Option<AdapterKind>,
    pub model: String,
    pub request_timeout_secs: u64,
    pub retry_backoff_ms: u64,
    pub scan: ScanConfig,
    pub shortlist_threshold: f64,
    pub default_data_store: DataStoreKind,
    pub features: FeatureSet,
    pub tier: Tier,
    pub scale: Scale,
    pub data_store: DataStoreConfig,
    pub heuristic_log: Option<PathBuf>,
    pub log_level: String,
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = key, value = %raw, "Ignoring unparsable environment value");
            None
        }
    }
}

fn env_value_enum<T: ValueEnum>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match T::from_str(raw.trim(), true) {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = key, value = %raw, "Ignoring unknown environment value");
            None
        }
    }
}

impl Default for StacksmithConfig {
    /// Loads from `STACKSMITH_*` variables, falling back to defaults for
    /// anything missing or unparsable.
    fn default() -> Self {
        let provider = env::var(PROVIDER_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .and_then(|s| match parse_provider(&s) {
                Ok(kind) => Some(kind),
                Err(e) => {
                    warn!(error = %e, "Ignoring {}", PROVIDER_ENV);
                    None
                }
            });

        let defaults = ScanConfig::default();
        let scan = ScanConfig {
            max_depth: env_parsed(MAX_DEPTH_ENV).unwrap_or(defaults.max_depth),
            max_files: env_parsed(MAX_FILES_ENV).unwrap_or(defaults.max_files),
            byte_budget: env_parsed(BYTE_BUDGET_ENV).unwrap_or(defaults.byte_budget),
            max_file_bytes: defaults.max_file_bytes,
        };

        let features = env::var(FEATURES_ENV)
            .ok()
            .and_then(|list| match FeatureSet::parse(&list) {
                Ok(set) => Some(set),
                Err(e) => {
                    warn!(error = %e, "Ignoring {}", FEATURES_ENV);
                    None
                }
            })
            .unwrap_or_else(|| AssemblyOptions::default().features);

        let mut data_store = DataStoreConfig::default();
        if let Ok(password) = env::var(DB_PASSWORD_ENV) {
            data_store = data_store.with_password(password);
        }

        Self {
            provider,
            model: env::var(MODEL_ENV).unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            request_timeout_secs: env_parsed(REQUEST_TIMEOUT_ENV).unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            retry_backoff_ms: env_parsed(RETRY_BACKOFF_ENV).unwrap_or(DEFAULT_RETRY_BACKOFF_MS),
            scan,
            shortlist_threshold: env_parsed(THRESHOLD_ENV).unwrap_or(DEFAULT_THRESHOLD),
            default_data_store: env::var(DEFAULT_DATA_STORE_ENV)
                .map(|s| DataStoreKind::parse(&s))
                .unwrap_or(DataStoreKind::PostgreSql),
            features,
            tier: env_value_enum(TIER_ENV).unwrap_or_default(),
            scale: env_value_enum(SCALE_ENV).unwrap_or_default(),
            data_store,
            heuristic_log: env::var(HEURISTIC_LOG_ENV).ok().map(PathBuf::from),
            log_level: env::var(LOG_LEVEL_ENV)
                .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
                .to_lowercase(),
        }
    }
}

impl StacksmithConfig {
    /// Environment configuration, overlaid by `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = path {
            config.apply_file(path)?;
        }
        Ok(config)
    }

    /// Applies a YAML or JSON config file. `.json` files are parsed as JSON,
    /// anything else as YAML.
    pub fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let file: ConfigFile = if is_json {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(&content).map_err(|e| e.to_string())
        }
        .map_err(|message| ConfigError::FileFormat {
            path: path.to_path_buf(),
            message,
        })?;

        debug!(path = %path.display(), "Applying config file");
        self.apply(file)
    }

    fn apply(&mut self, file: ConfigFile) -> Result<(), ConfigError> {
        if let Some(provider) = file.provider {
            self.provider = Some(parse_provider(&provider)?);
        }
        if let Some(model) = file.model {
            self.model = model;
        }
        if let Some(timeout) = file.request_timeout_secs {
            self.request_timeout_secs = timeout;
        }
        if let Some(backoff) = file.retry_backoff_ms {
            self.retry_backoff_ms = backoff;
        }
        if let Some(scan) = file.scan {
            self.scan = scan;
        }
        if let Some(threshold) = file.shortlist_threshold {
            self.shortlist_threshold = threshold;
        }
        if let Some(kind) = file.default_data_store {
            self.default_data_store = DataStoreKind::parse(&kind);
        }
        if let Some(features) = file.features {
            self.features = FeatureSet::parse(&features.join(",")).map_err(|error| ConfigError::ParseError {
                field: "features".to_string(),
                error,
            })?;
        }
        if let Some(tier) = file.tier {
            self.tier = Tier::from_str(&tier, true).map_err(|error| ConfigError::ParseError {
                field: "tier".to_string(),
                error,
            })?;
        }
        if let Some(scale) = file.scale {
            self.scale = Scale::from_str(&scale, true).map_err(|error| ConfigError::ParseError {
                field: "scale".to_string(),
                error,
            })?;
        }
        if let Some(data_store) = file.data_store {
            let password = self.data_store.password.take();
            self.data_store = DataStoreConfig { password, ..data_store };
        }
        if let Some(path) = file.heuristic_log {
            self.heuristic_log = Some(path);
        }
        if let Some(level) = file.log_level {
            self.log_level = level.to_lowercase();
        }
        Ok(())
    }

    /// Checks numeric ranges and the log level.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 || self.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS {
            return Err(ConfigError::ValidationFailed(format!(
                "Request timeout must be between 1 and {} seconds",
                MAX_REQUEST_TIMEOUT_SECS
            )));
        }

        if self.scan.max_depth == 0 || self.scan.max_depth > MAX_SCAN_DEPTH {
            return Err(ConfigError::ValidationFailed(format!(
                "Scan depth must be between 1 and {}",
                MAX_SCAN_DEPTH
            )));
        }

        if self.scan.max_files == 0 {
            return Err(ConfigError::ValidationFailed(
                "Max files must be at least 1".to_string(),
            ));
        }

        // a zero cap would sample nothing while still reporting success
        if self.scan.max_file_bytes == 0 {
            return Err(ConfigError::ValidationFailed(
                "Max file bytes must be at least 1".to_string(),
            ));
        }

        if self.scan.byte_budget < MIN_BYTE_BUDGET || self.scan.byte_budget > MAX_BYTE_BUDGET {
            return Err(ConfigError::ValidationFailed(
                "Byte budget must be between 1KB and 256MB".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.shortlist_threshold) {
            return Err(ConfigError::ValidationFailed(format!(
                "Threshold {} is outside 0.0..=1.0",
                self.shortlist_threshold
            )));
        }

        if parse_level(&self.log_level).is_none() {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}. Valid options: {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    pub fn arbitration_config(&self) -> ArbitrationConfig {
        ArbitrationConfig {
            timeout: Duration::from_secs(self.request_timeout_secs),
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            threshold: self.shortlist_threshold,
            ..ArbitrationConfig::default()
        }
    }

    /// Reasoning client for the configured provider, if any.
    pub fn create_client(&self) -> Option<Arc<dyn LLMClient>> {
        let provider = self.provider?;
        let client = GenAIClient::new(
            provider,
            self.model.clone(),
            Duration::from_secs(self.request_timeout_secs),
        );
        Some(Arc::new(client))
    }

    /// Classifier for these settings. `no_llm` forces heuristic-only mode.
    pub fn classifier(&self, no_llm: bool) -> Classifier {
        let classifier = Classifier::new(self.scan.clone(), self.shortlist_threshold);
        if no_llm {
            return classifier;
        }
        match self.create_client() {
            Some(client) => {
                let logger = Arc::new(HeuristicLogger::new(self.heuristic_log.clone()));
                classifier.with_arbiter(Arbiter::new(client, self.arbitration_config()).with_logger(logger))
            }
            None => classifier,
        }
    }

    pub fn assembler(&self, registry: Arc<AdapterRegistry>) -> StackAssembler {
        StackAssembler::new(registry)
            .with_default_kind(self.default_data_store.clone())
            .with_threshold(self.shortlist_threshold)
    }

    pub fn assembly_options(&self) -> AssemblyOptions {
        AssemblyOptions {
            features: self.features.clone(),
            tier: self.tier,
            scale: self.scale,
            data_store: self.data_store.clone(),
            ..AssemblyOptions::default()
        }
    }

    pub fn to_display_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();

        map.insert(
            "provider".to_string(),
            self.provider
                .map(|p| p.as_lower_str().to_string())
                .unwrap_or_else(|| "none".to_string()),
        );
        map.insert("model".to_string(), self.model.clone());
        map.insert(
            "request_timeout_secs".to_string(),
            self.request_timeout_secs.to_string(),
        );
        map.insert("retry_backoff_ms".to_string(), self.retry_backoff_ms.to_string());
        map.insert("scan.max_depth".to_string(), self.scan.max_depth.to_string());
        map.insert("scan.max_files".to_string(), self.scan.max_files.to_string());
        map.insert("scan.byte_budget".to_string(), self.scan.byte_budget.to_string());
        map.insert(
            "shortlist_threshold".to_string(),
            self.shortlist_threshold.to_string(),
        );
        map.insert(
            "default_data_store".to_string(),
            self.default_data_store.to_string(),
        );
        map.insert("features".to_string(), self.features.to_string());
        map.insert("tier".to_string(), self.tier.to_string());
        map.insert("scale".to_string(), self.scale.to_string());
        map.insert("log_level".to_string(), self.log_level.clone());

        map
    }
}

impl fmt::Display for StacksmithConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Stacksmith Configuration:")?;
        for (key, value) in self.to_display_map() {
            writeln!(f, "  {}: {}", key, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::Feature;
    use serial_test::serial;
    use std::io::Write;

    /// Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }

        fn unset(key: &str) -> Self {
            let old_value = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    fn clean_env() -> Vec<EnvGuard> {
        [
            PROVIDER_ENV,
            MODEL_ENV,
            REQUEST_TIMEOUT_ENV,
            RETRY_BACKOFF_ENV,
            MAX_DEPTH_ENV,
            MAX_FILES_ENV,
            BYTE_BUDGET_ENV,
            THRESHOLD_ENV,
            DEFAULT_DATA_STORE_ENV,
            FEATURES_ENV,
            TIER_ENV,
            SCALE_ENV,
            DB_PASSWORD_ENV,
            HEURISTIC_LOG_ENV,
            LOG_LEVEL_ENV,
        ]
        .into_iter()
        .map(EnvGuard::unset)
        .collect()
    }

    #[test]
    #[serial]
    fn test_default_configuration() {
        let _guards = clean_env();

        let config = StacksmithConfig::default();

        assert!(config.provider.is_none());
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.scan, ScanConfig::default());
        assert_eq!(config.default_data_store, DataStoreKind::PostgreSql);
        assert_eq!(config.features.to_string(), "cache,search");
        assert_eq!(config.tier, Tier::Development);
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert!(config.validate().is_ok());
        assert!(!config.classifier(false).has_arbiter());
    }

    #[test]
    #[serial]
    fn test_environment_variable_parsing() {
        let _clean = clean_env();
        let _guards = vec![
            EnvGuard::set(PROVIDER_ENV, "anthropic"),
            EnvGuard::set(MODEL_ENV, "custom-model"),
            EnvGuard::set(REQUEST_TIMEOUT_ENV, "60"),
            EnvGuard::set(MAX_DEPTH_ENV, "4"),
            EnvGuard::set(DEFAULT_DATA_STORE_ENV, "Mongo"),
            EnvGuard::set(FEATURES_ENV, "monitoring,ci"),
            EnvGuard::set(TIER_ENV, "prod"),
            EnvGuard::set(SCALE_ENV, "large"),
            EnvGuard::set(LOG_LEVEL_ENV, "DEBUG"),
        ];

        let config = StacksmithConfig::default();

        assert_eq!(config.provider, Some(AdapterKind::Anthropic));
        assert_eq!(config.model, "custom-model");
        assert_eq!(config.request_timeout_secs, 60);
        assert_eq!(config.scan.max_depth, 4);
        assert_eq!(config.default_data_store, DataStoreKind::MongoDb);
        assert!(config.features.contains(Feature::Ci));
        assert!(!config.features.contains(Feature::Cache));
        assert_eq!(config.tier, Tier::Production);
        assert_eq!(config.scale, Scale::Large);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.arbitration_config().timeout, Duration::from_secs(60));
    }

    #[test]
    #[serial]
    fn test_unparsable_environment_falls_back() {
        let _clean = clean_env();
        let _guards = vec![
            EnvGuard::set(PROVIDER_ENV, "carrier-pigeon"),
            EnvGuard::set(REQUEST_TIMEOUT_ENV, "soon"),
            EnvGuard::set(FEATURES_ENV, "cache,telemetry"),
        ];

        let config = StacksmithConfig::default();

        assert!(config.provider.is_none());
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.features.to_string(), "cache,search");
    }

    #[test]
    #[serial]
    fn test_yaml_file_overrides_environment() {
        let _clean = clean_env();
        let _guards = vec![EnvGuard::set(TIER_ENV, "staging")];

        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "tier: production\nfeatures: [cache]\nscan:\n  max_depth: 3\ndata_store:\n  database: shop\n  pool_size: 20"
        )
        .unwrap();

        let config = StacksmithConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.tier, Tier::Production);
        assert_eq!(config.features.to_string(), "cache");
        assert_eq!(config.scan.max_depth, 3);
        assert_eq!(config.data_store.database, "shop");
        assert_eq!(config.data_store.pool_size, 20);
        assert_eq!(config.assembly_options().tier, Tier::Production);
    }

    #[test]
    #[serial]
    fn test_json_file_and_bad_values() {
        let _clean = clean_env();

        let mut good = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(good, r#"{{"default_data_store": "mysql", "shortlist_threshold": 0.6}}"#).unwrap();
        let config = StacksmithConfig::load(Some(good.path())).unwrap();
        assert_eq!(config.default_data_store, DataStoreKind::MySql);
        assert_eq!(config.shortlist_threshold, 0.6);

        let mut bad = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(bad, "scale: enormous").unwrap();
        let err = StacksmithConfig::load(Some(bad.path())).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { ref field, .. } if field == "scale"));

        let mut unknown = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(unknown, "colour: blue").unwrap();
        assert!(matches!(
            StacksmithConfig::load(Some(unknown.path())),
            Err(ConfigError::FileFormat { .. })
        ));

        assert!(matches!(
            StacksmithConfig::load(Some(Path::new("/nonexistent/stacksmith.yaml"))),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_file_password_is_rejected() {
        let _clean = clean_env();
        let _guards = vec![EnvGuard::set(DB_PASSWORD_ENV, "from-env")];

        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "data_store:\n  database: shop\n  password: hunter2").unwrap();

        match StacksmithConfig::load(Some(file.path())) {
            Err(ConfigError::FileFormat { message, .. }) => assert!(message.contains("password"), "{}", message),
            other => panic!("expected a file format error, got {:?}", other.map(|c| c.data_store.database)),
        }

        // without the key the environment password survives the file section
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "data_store:\n  database: shop").unwrap();
        let config = StacksmithConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.data_store.database, "shop");
        assert_eq!(config.data_store.password.as_ref().map(|p| p.expose()), Some("from-env"));
    }

    #[test]
    #[serial]
    fn test_configuration_validation() {
        let _clean = clean_env();

        let mut config = StacksmithConfig::default();
        config.request_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = StacksmithConfig::default();
        config.scan.max_depth = 65;
        assert!(config.validate().is_err());

        let mut config = StacksmithConfig::default();
        config.scan.byte_budget = 512;
        assert!(config.validate().is_err());

        let mut config = StacksmithConfig::default();
        config.scan.max_file_bytes = 0;
        assert!(config.validate().is_err());

        // a per-file cap above the total budget is clamped by the budget
        let mut config = StacksmithConfig::default();
        config.scan.byte_budget = 2048;
        assert!(config.validate().is_ok());

        let mut config = StacksmithConfig::default();
        config.shortlist_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = StacksmithConfig::default();
        config.log_level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_provider_enables_arbitration() {
        let _clean = clean_env();
        let _guards = vec![EnvGuard::set(PROVIDER_ENV, "ollama")];

        let config = StacksmithConfig::default();
        assert!(config.classifier(false).has_arbiter());
        assert!(!config.classifier(true).has_arbiter());
    }

    #[test]
    #[serial]
    fn test_config_display() {
        let _clean = clean_env();
        let display = StacksmithConfig::default().to_string();
        assert!(display.contains("Stacksmith Configuration:"));
        assert!(display.contains("provider: none"));
    }
}
