//! Data-store adapter contract.
//!
//! Adapters are stateless strategies bound to one [`DataStoreKind`]. They
//! never perform I/O: everything they return is derived from the
//! configuration they are handed.

use super::ids::DataStoreKind;
use super::service::{SecretString, ServiceDefinition};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

pub const MAX_POOL_SIZE: u32 = 1000;
pub const MAX_TIMEOUT_SECS: u64 = 300;

/// Connection settings for one data store.
///
/// `port == 0` selects the adapter's default port and `image == None` its
/// default image. The password is never read from a file; unknown keys,
/// `password` included, are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataStoreConfig {
    pub database: String,
    pub host: String,
    pub port: u32,
    pub username: String,
    #[serde(skip)]
    pub password: Option<SecretString>,
    pub image: Option<String>,
    pub pool_size: u32,
    pub timeout_secs: u64,
    pub tls: bool,
}

impl Default for DataStoreConfig {
    fn default() -> Self {
        Self {
            database: "app".to_string(),
            host: "localhost".to_string(),
            port: 0,
            username: "app".to_string(),
            password: None,
            image: None,
            pool_size: 10,
            timeout_secs: 30,
            tls: false,
        }
    }
}

impl DataStoreConfig {
    pub fn with_password(mut self, password: impl Into<SecretString>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn resolved_port(&self, default: u16) -> u16 {
        match u16::try_from(self.port) {
            Ok(0) | Err(_) => default,
            Ok(port) => port,
        }
    }

    pub fn resolved_image<'a>(&'a self, default: &'a str) -> &'a str {
        self.image.as_deref().unwrap_or(default)
    }

    pub fn password_or_empty(&self) -> SecretString {
        self.password.clone().unwrap_or_default()
    }

    /// Checks every kind-independent constraint, collecting all violations.
    pub fn common_violations(&self) -> Vec<ConfigViolation> {
        let mut violations = Vec::new();

        for (field, value) in [
            ("database", &self.database),
            ("host", &self.host),
            ("username", &self.username),
        ] {
            if value.trim().is_empty() {
                violations.push(ConfigViolation::new(field, "is required"));
            }
        }
        if matches!(self.image.as_deref(), Some(image) if image.trim().is_empty()) {
            violations.push(ConfigViolation::new("image", "must not be empty when set"));
        }
        if self.port > u16::MAX as u32 {
            violations.push(ConfigViolation::new(
                "port",
                format!("{} is outside 0..=65535", self.port),
            ));
        }
        if !(1..=MAX_POOL_SIZE).contains(&self.pool_size) {
            violations.push(ConfigViolation::new(
                "pool_size",
                format!("{} is outside 1..={}", self.pool_size, MAX_POOL_SIZE),
            ));
        }
        if !(1..=MAX_TIMEOUT_SECS).contains(&self.timeout_secs) {
            violations.push(ConfigViolation::new(
                "timeout_secs",
                format!("{} is outside 1..={}", self.timeout_secs, MAX_TIMEOUT_SECS),
            ));
        }
        if matches!(&self.password, Some(p) if p.is_empty()) {
            violations.push(ConfigViolation::new("password", "must not be empty when set"));
        }

        violations
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigViolation {
    pub field: String,
    pub message: String,
}

impl ConfigViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.message)
    }
}

/// Every constraint a configuration violated.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid {kind} configuration: {}", join_violations(.violations))]
pub struct ValidationError {
    pub kind: DataStoreKind,
    pub violations: Vec<ConfigViolation>,
}

fn join_violations(violations: &[ConfigViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    /// `Ok` when `violations` is empty.
    pub fn check(kind: DataStoreKind, violations: Vec<ConfigViolation>) -> Result<(), Self> {
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Self { kind, violations })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthScheme {
    UsernamePassword,
    PasswordOnly,
    None,
}

/// Where and how to reach a data store.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionDescriptor {
    pub scheme: &'static str,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub auth: AuthScheme,
    pub tls: bool,
    /// Full connection string, including credentials.
    pub url: SecretString,
}

impl ConnectionDescriptor {
    /// Connection string with the password replaced, safe to log.
    pub fn redacted_url(&self, password: &SecretString) -> String {
        if password.is_empty() {
            self.url.expose().to_string()
        } else {
            self.url.expose().replace(password.expose(), "****")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "support", rename_all = "kebab-case")]
pub enum VectorCapability {
    Unsupported,
    Supported {
        max_dimensions: u32,
        index_type: &'static str,
        metric: &'static str,
    },
}

impl VectorCapability {
    pub fn is_supported(&self) -> bool {
        matches!(self, VectorCapability::Supported { .. })
    }

    pub fn check_dimensions(&self, dimensions: u32) -> Option<ConfigViolation> {
        match self {
            VectorCapability::Unsupported => Some(ConfigViolation::new(
                "dimensions",
                "vector search is not supported",
            )),
            VectorCapability::Supported { max_dimensions, .. } if dimensions == 0 || dimensions > *max_dimensions => {
                Some(ConfigViolation::new(
                    "dimensions",
                    format!("{} is outside 1..={}", dimensions, max_dimensions),
                ))
            }
            VectorCapability::Supported { .. } => None,
        }
    }
}

impl fmt::Display for VectorCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VectorCapability::Unsupported => write!(f, "none"),
            VectorCapability::Supported {
                max_dimensions,
                index_type,
                metric,
            } => write!(f, "{} {} (<= {} dims)", index_type, metric, max_dimensions),
        }
    }
}

/// Target of a vector index statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorIndexSpec {
    pub collection: String,
    pub column: String,
    pub dimensions: u32,
}

impl VectorIndexSpec {
    pub fn new(collection: impl Into<String>, column: impl Into<String>, dimensions: u32) -> Self {
        Self {
            collection: collection.into(),
            column: column.into(),
            dimensions,
        }
    }

    /// Identifier and dimension violations against `capability`.
    pub fn violations(&self, capability: &VectorCapability) -> Vec<ConfigViolation> {
        static IDENT: OnceLock<Regex> = OnceLock::new();
        let ident = IDENT.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

        let mut violations = Vec::new();
        for (field, value) in [("collection", &self.collection), ("column", &self.column)] {
            if !ident.is_match(value) {
                violations.push(ConfigViolation::new(
                    field,
                    format!("'{}' is not a valid identifier", value),
                ));
            }
        }
        violations.extend(capability.check_dimensions(self.dimensions));
        violations
    }
}

/// Service name used for the primary data store of `kind`.
pub fn primary_service_name(kind: &DataStoreKind) -> String {
    format!("primary-{}", kind)
}

/// Strategy for one data-store kind.
pub trait DataStoreAdapter: Send + Sync {
    fn kind(&self) -> DataStoreKind;

    fn default_port(&self) -> u16;

    fn default_image(&self) -> &str;

    /// Container ports exposed in addition to the default one.
    fn extra_ports(&self) -> Vec<u16> {
        Vec::new()
    }

    fn vector_capability(&self) -> VectorCapability;

    /// Builds the connection string for `config`.
    fn connection_descriptor(&self, config: &DataStoreConfig) -> Result<ConnectionDescriptor, ValidationError>;

    /// Builds the container definition for `config`. A missing password is
    /// rendered as an empty secret and left to topology checks.
    fn service_definition(&self, config: &DataStoreConfig) -> Result<ServiceDefinition, ValidationError>;

    /// DDL or index command for a vector collection.
    fn vector_index_statement(&self, spec: &VectorIndexSpec) -> Result<String, ValidationError> {
        let mut violations = spec.violations(&self.vector_capability());
        if violations.is_empty() {
            violations.push(ConfigViolation::new("kind", "has no vector index statement"));
        }
        Err(ValidationError {
            kind: self.kind(),
            violations,
        })
    }

    fn validate(&self, config: &DataStoreConfig) -> Result<(), ValidationError> {
        ValidationError::check(self.kind(), config.common_violations())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_violation_is_reported() {
        let config = DataStoreConfig {
            database: String::new(),
            host: " ".to_string(),
            port: 70_000,
            username: String::new(),
            image: Some(String::new()),
            pool_size: 0,
            timeout_secs: 301,
            ..DataStoreConfig::default()
        };

        let fields: Vec<_> = config
            .common_violations()
            .into_iter()
            .map(|v| v.field)
            .collect();
        assert_eq!(
            fields,
            vec!["database", "host", "username", "image", "port", "pool_size", "timeout_secs"]
        );
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(DataStoreConfig::default().common_violations().is_empty());
    }

    #[test]
    fn test_validation_error_display_lists_violations() {
        let err = ValidationError {
            kind: DataStoreKind::MySql,
            violations: vec![
                ConfigViolation::new("host", "is required"),
                ConfigViolation::new("pool_size", "0 is outside 1..=1000"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "invalid mysql configuration: host is required; pool_size 0 is outside 1..=1000"
        );
    }

    #[test]
    fn test_port_resolution() {
        let config = DataStoreConfig::default();
        assert_eq!(config.resolved_port(5432), 5432);

        let custom = DataStoreConfig {
            port: 15432,
            ..DataStoreConfig::default()
        };
        assert_eq!(custom.resolved_port(5432), 15432);
    }

    #[test]
    fn test_vector_spec_violations() {
        let capability = VectorCapability::Supported {
            max_dimensions: 2000,
            index_type: "ivfflat",
            metric: "cosine",
        };
        assert!(VectorIndexSpec::new("documents", "embedding", 1536)
            .violations(&capability)
            .is_empty());

        let bad = VectorIndexSpec::new("drop table", "embedding", 4096).violations(&capability);
        assert_eq!(bad.len(), 2);

        let unsupported = VectorIndexSpec::new("docs", "v", 3).violations(&VectorCapability::Unsupported);
        assert_eq!(unsupported[0].message, "vector search is not supported");
    }
}
