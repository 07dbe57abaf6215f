//! Service definitions and their building blocks.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// What a service contributes to the topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceRole {
    DataStore,
    Cache,
    Search,
    Monitoring,
    Ci,
    Application,
}

impl fmt::Display for ServiceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceRole::DataStore => "data-store",
            ServiceRole::Cache => "cache",
            ServiceRole::Search => "search",
            ServiceRole::Monitoring => "monitoring",
            ServiceRole::Ci => "ci",
            ServiceRole::Application => "application",
        };
        f.write_str(s)
    }
}

/// A string that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Environment variable value. Secrets are referenced by name in manifests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvValue {
    Literal(String),
    Secret { name: String, value: SecretString },
}

impl EnvValue {
    pub fn literal(value: impl Into<String>) -> Self {
        EnvValue::Literal(value.into())
    }

    pub fn secret(name: impl Into<String>, value: impl Into<SecretString>) -> Self {
        EnvValue::Secret {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, EnvValue::Secret { .. })
    }

    /// Manifest form: the literal value, or `${NAME}` for secrets.
    pub fn render(&self) -> String {
        match self {
            EnvValue::Literal(v) => v.clone(),
            EnvValue::Secret { name, .. } => format!("${{{}}}", name),
        }
    }
}

impl Serialize for EnvValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.render())
    }
}

/// `host: None` exposes the container port on the network only, which is
/// what replicated services need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PortBinding {
    pub host: Option<u16>,
    pub container: u16,
}

impl PortBinding {
    pub fn same(port: u16) -> Self {
        Self {
            host: Some(port),
            container: port,
        }
    }

    pub fn mapped(host: u16, container: u16) -> Self {
        Self {
            host: Some(host),
            container,
        }
    }

    pub fn internal(container: u16) -> Self {
        Self { host: None, container }
    }
}

impl fmt::Display for PortBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.host {
            Some(host) => write!(f, "{}:{}", host, self.container),
            None => write!(f, "{}", self.container),
        }
    }
}

/// Readiness probe. `test` uses the compose exec form (`CMD` / `CMD-SHELL`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub test: Vec<String>,
    pub interval_secs: u64,
    pub timeout_secs: u64,
    pub retries: u32,
    pub start_period_secs: u64,
}

impl HealthCheck {
    pub fn cmd<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut test = vec!["CMD".to_string()];
        test.extend(args.into_iter().map(Into::into));
        Self::with_test(test)
    }

    pub fn shell(command: impl Into<String>) -> Self {
        Self::with_test(vec!["CMD-SHELL".to_string(), command.into()])
    }

    fn with_test(test: Vec<String>) -> Self {
        Self {
            test,
            interval_secs: 30,
            timeout_secs: 10,
            retries: 3,
            start_period_secs: 10,
        }
    }

    pub fn timing(mut self, interval_secs: u64, timeout_secs: u64, retries: u32) -> Self {
        self.interval_secs = interval_secs;
        self.timeout_secs = timeout_secs;
        self.retries = retries;
        self
    }

    pub fn start_period(mut self, secs: u64) -> Self {
        self.start_period_secs = secs;
        self
    }

    /// Whether there is an actual command to run.
    pub fn is_pollable(&self) -> bool {
        self.test.len() > 1 && self.test[1..].iter().any(|arg| !arg.trim().is_empty())
    }

    /// Command portion without the exec-form prefix.
    pub fn command_line(&self) -> String {
        self.test.iter().skip(1).cloned().collect::<Vec<_>>().join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "source", rename_all = "lowercase")]
pub enum VolumeSource {
    /// Named volume managed by the runtime.
    Named(String),
    /// Host path.
    Bind(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeMount {
    pub source: VolumeSource,
    pub target: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
}

impl VolumeMount {
    pub fn named(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: VolumeSource::Named(name.into()),
            target: target.into(),
            read_only: false,
        }
    }

    pub fn bind(path: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: VolumeSource::Bind(path.into()),
            target: target.into(),
            read_only: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Compose short syntax, e.g. `postgres_data:/var/lib/postgresql/data`.
    pub fn short_syntax(&self) -> String {
        let source = match &self.source {
            VolumeSource::Named(name) => name,
            VolumeSource::Bind(path) => path,
        };
        if self.read_only {
            format!("{}:{}:ro", source, self.target)
        } else {
            format!("{}:{}", source, self.target)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceHints {
    pub cpu_request: String,
    pub memory_request: String,
    pub cpu_limit: String,
    pub memory_limit: String,
    pub replicas: u32,
    pub workers: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDefinition {
    pub name: String,
    pub role: ServiceRole,
    pub image: String,
    pub ports: Vec<PortBinding>,
    pub environment: BTreeMap<String, EnvValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheck>,
    pub volumes: Vec<VolumeMount>,
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceHints>,
    pub restart: String,
}

impl ServiceDefinition {
    pub fn new(name: impl Into<String>, role: ServiceRole, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role,
            image: image.into(),
            ports: Vec::new(),
            environment: BTreeMap::new(),
            command: None,
            health_check: None,
            volumes: Vec::new(),
            depends_on: Vec::new(),
            resources: None,
            restart: "unless-stopped".to_string(),
        }
    }

    pub fn port(mut self, binding: PortBinding) -> Self {
        self.ports.push(binding);
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), EnvValue::literal(value));
        self
    }

    /// Adds a secret whose variable name doubles as its secret name.
    pub fn secret(mut self, key: impl Into<String>, value: impl Into<SecretString>) -> Self {
        let key = key.into();
        self.environment
            .insert(key.clone(), EnvValue::secret(key, value));
        self
    }

    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn health_check(mut self, check: HealthCheck) -> Self {
        self.health_check = Some(check);
        self
    }

    pub fn volume(mut self, mount: VolumeMount) -> Self {
        self.volumes.push(mount);
        self
    }

    pub fn depends_on(mut self, service: impl Into<String>) -> Self {
        let service = service.into();
        if !self.depends_on.contains(&service) {
            self.depends_on.push(service);
        }
        self
    }

    pub fn host_ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.ports.iter().filter_map(|p| p.host)
    }

    /// Replica count from the resource hints, 1 when unset.
    pub fn replicas(&self) -> u32 {
        self.resources.as_ref().map_or(1, |r| r.replicas)
    }

    /// Secret environment entries as `(variable, secret name, value)`.
    pub fn secrets(&self) -> impl Iterator<Item = (&str, &str, &SecretString)> + '_ {
        self.environment.iter().filter_map(|(key, value)| match value {
            EnvValue::Secret { name, value } => Some((key.as_str(), name.as_str(), value)),
            EnvValue::Literal(_) => None,
        })
    }
}
