//! Topology serialization: the manifest document, compose YAML and the env file.
//!
//! Secret environment values are rendered as `${NAME}` references in both the
//! manifest and the compose file. Only [`render_env_file`] emits their values.

use crate::classify::TechnologyProfile;
use crate::stack::{
    AuthScheme, DataStoreKind, HealthCheck, KindSource, ResourceHints, ServiceDefinition,
    Topology, VectorCapability,
};
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

pub const MANIFEST_VERSION: &str = "1.0";

/// Primary data store summary with the credentials left out.
#[derive(Debug, Clone, Serialize)]
pub struct DataStoreSummary {
    pub kind: DataStoreKind,
    pub source: KindSource,
    pub service: String,
    pub scheme: &'static str,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub auth: AuthScheme,
    pub tls: bool,
    pub vector: VectorCapability,
}

#[derive(Debug, Clone, Serialize)]
pub struct DependencyEdge<'a> {
    pub from: &'a str,
    pub to: &'a str,
}

/// Orchestrator-neutral description of a topology.
#[derive(Debug, Clone, Serialize)]
pub struct Manifest<'a> {
    pub version: &'static str,
    pub generator: String,
    pub generated_at: DateTime<Utc>,
    pub project: &'a str,
    pub tier: String,
    pub scale: String,
    pub features: Vec<String>,
    pub network: &'a str,
    pub data_store: DataStoreSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<&'a TechnologyProfile>,
    pub services: &'a [ServiceDefinition],
    pub dependencies: Vec<DependencyEdge<'a>>,
    /// Secret names the env file must provide.
    pub secrets: Vec<&'a str>,
}

impl<'a> Manifest<'a> {
    pub fn new(topology: &'a Topology, profile: Option<&'a TechnologyProfile>) -> Self {
        let connection = &topology.connection;
        Self {
            version: MANIFEST_VERSION,
            generator: format!("{} {}", crate::NAME, crate::VERSION),
            generated_at: Utc::now(),
            project: &topology.project_name,
            tier: topology.tier.to_string(),
            scale: topology.scale.to_string(),
            features: topology.features.iter().map(|f| f.to_string()).collect(),
            network: &topology.network,
            data_store: DataStoreSummary {
                kind: topology.kind.clone(),
                source: topology.kind_source,
                service: connection.host.clone(),
                scheme: connection.scheme,
                host: connection.host.clone(),
                port: connection.port,
                database: connection.database.clone(),
                auth: connection.auth,
                tls: connection.tls,
                vector: topology.vector.clone(),
            },
            profile,
            services: &topology.services,
            dependencies: topology
                .dependency_edges()
                .into_iter()
                .map(|(from, to)| DependencyEdge { from, to })
                .collect(),
            secrets: topology.secrets().into_keys().collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Serialize)]
struct ComposeFile<'a> {
    name: &'a str,
    services: OrderedServices<'a>,
    networks: BTreeMap<&'a str, ComposeNetwork>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    volumes: BTreeMap<&'a str, NamedVolume>,
}

/// Keeps services in topology order instead of sorting them by name.
#[derive(Debug)]
struct OrderedServices<'a>(Vec<(&'a str, ComposeService<'a>)>);

impl Serialize for OrderedServices<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, service) in &self.0 {
            map.serialize_entry(name, service)?;
        }
        map.end()
    }
}

#[derive(Debug, Serialize)]
struct ComposeService<'a> {
    image: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    environment: BTreeMap<&'a str, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    volumes: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    depends_on: BTreeMap<&'a str, DependsOn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    healthcheck: Option<ComposeHealthcheck<'a>>,
    restart: &'a str,
    networks: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deploy: Option<Deploy>,
}

#[derive(Debug, Serialize)]
struct DependsOn {
    condition: &'static str,
}

#[derive(Debug, Serialize)]
struct ComposeHealthcheck<'a> {
    test: &'a [String],
    interval: String,
    timeout: String,
    retries: u32,
    start_period: String,
}

impl<'a> From<&'a HealthCheck> for ComposeHealthcheck<'a> {
    fn from(check: &'a HealthCheck) -> Self {
        Self {
            test: &check.test,
            interval: format!("{}s", check.interval_secs),
            timeout: format!("{}s", check.timeout_secs),
            retries: check.retries,
            start_period: format!("{}s", check.start_period_secs),
        }
    }
}

#[derive(Debug, Serialize)]
struct Deploy {
    replicas: u32,
    resources: DeployResources,
}

#[derive(Debug, Serialize)]
struct DeployResources {
    limits: ResourceAmount,
    reservations: ResourceAmount,
}

#[derive(Debug, Serialize)]
struct ResourceAmount {
    cpus: String,
    memory: String,
}

impl From<&ResourceHints> for Deploy {
    fn from(hints: &ResourceHints) -> Self {
        Self {
            replicas: hints.replicas,
            resources: DeployResources {
                limits: ResourceAmount {
                    cpus: compose_cpus(&hints.cpu_limit),
                    memory: compose_memory(&hints.memory_limit),
                },
                reservations: ResourceAmount {
                    cpus: compose_cpus(&hints.cpu_request),
                    memory: compose_memory(&hints.memory_request),
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ComposeNetwork {
    driver: &'static str,
}

#[derive(Debug, Serialize)]
struct NamedVolume {}

/// `250m` -> `0.25`. Values without the millicore suffix pass through.
fn compose_cpus(value: &str) -> String {
    match value.strip_suffix('m').and_then(|m| m.parse::<u32>().ok()) {
        Some(millis) => {
            let cpus = format!("{}.{:03}", millis / 1000, millis % 1000);
            cpus.trim_end_matches('0').trim_end_matches('.').to_string()
        }
        None => value.to_string(),
    }
}

/// `512Mi` -> `512M`, `1Gi` -> `1G`.
fn compose_memory(value: &str) -> String {
    value.trim_end_matches('i').to_string()
}

fn compose_service<'a>(topology: &'a Topology, service: &'a ServiceDefinition) -> ComposeService<'a> {
    let depends_on = service
        .depends_on
        .iter()
        .map(|dependency| {
            let healthy = topology
                .service(dependency)
                .and_then(|d| d.health_check.as_ref())
                .is_some_and(HealthCheck::is_pollable);
            let condition = if healthy {
                "service_healthy"
            } else {
                "service_started"
            };
            (dependency.as_str(), DependsOn { condition })
        })
        .collect();

    ComposeService {
        image: &service.image,
        command: service.command.as_deref(),
        ports: service.ports.iter().map(|p| p.to_string()).collect(),
        environment: service
            .environment
            .iter()
            .map(|(key, value)| (key.as_str(), value.render()))
            .collect(),
        volumes: service.volumes.iter().map(|v| v.short_syntax()).collect(),
        depends_on,
        healthcheck: service.health_check.as_ref().map(ComposeHealthcheck::from),
        restart: &service.restart,
        networks: vec![topology.network.as_str()],
        deploy: service.resources.as_ref().map(Deploy::from),
    }
}

/// Renders the topology as a compose file.
pub fn render_compose(topology: &Topology) -> Result<String, serde_yaml::Error> {
    let file = ComposeFile {
        name: &topology.project_name,
        services: OrderedServices(
            topology
                .services
                .iter()
                .map(|s| (s.name.as_str(), compose_service(topology, s)))
                .collect(),
        ),
        networks: BTreeMap::from([(topology.network.as_str(), ComposeNetwork { driver: "bridge" })]),
        volumes: topology
            .named_volumes()
            .into_iter()
            .map(|name| (name, NamedVolume {}))
            .collect(),
    };
    serde_yaml::to_string(&file)
}

/// `NAME=value` lines for every secret the topology references.
pub fn render_env_file(topology: &Topology) -> String {
    let mut out = String::from("# Generated by stacksmith. Keep this file out of version control.\n");
    for (name, value) in topology.secrets() {
        out.push_str(name);
        out.push('=');
        out.push_str(&quote_env_value(value.expose()));
        out.push('\n');
    }
    out
}

fn quote_env_value(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\'' | '$' | '\\'));
    if needs_quotes {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\"").replace('$', "$$"))
    } else {
        value.to_string()
    }
}
