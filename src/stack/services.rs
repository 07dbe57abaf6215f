//! Cross-cutting services and the application tier.

use super::options::Tier;
use super::service::{
    EnvValue, HealthCheck, PortBinding, SecretString, ServiceDefinition, ServiceRole, VolumeMount,
};
use super::DataStoreKind;

pub const CACHE_SERVICE: &str = "cache";
pub const SEARCH_SERVICE: &str = "search";
pub const PROMETHEUS_SERVICE: &str = "prometheus";
pub const GRAFANA_SERVICE: &str = "grafana";
pub const GITEA_SERVICE: &str = "gitea";
pub const APP_SERVICE: &str = "app";

const CACHE_PORT: u16 = 6379;
const SEARCH_PORT: u16 = 7700;

fn probe(check: HealthCheck) -> HealthCheck {
    check.timing(10, 5, 3)
}

pub fn cache_service() -> ServiceDefinition {
    ServiceDefinition::new(CACHE_SERVICE, ServiceRole::Cache, "redis:7.2-alpine")
        .port(PortBinding::same(CACHE_PORT))
        .command("redis-server --appendonly yes --maxmemory 512mb")
        .volume(VolumeMount::named("cache_data", "/data"))
        .health_check(probe(HealthCheck::cmd(["redis-cli", "ping"])))
}

pub fn search_service(master_key: SecretString, tier: Tier) -> ServiceDefinition {
    let meili_env = if tier == Tier::Production {
        "production"
    } else {
        "development"
    };
    ServiceDefinition::new(SEARCH_SERVICE, ServiceRole::Search, "getmeili/meilisearch:latest")
        .port(PortBinding::same(SEARCH_PORT))
        .env("MEILI_ENV", meili_env)
        .secret("MEILI_MASTER_KEY", master_key)
        .volume(VolumeMount::named("meili_data", "/meili_data"))
        .health_check(probe(HealthCheck::cmd([
            "curl",
            "-f",
            "http://localhost:7700/health",
        ])))
}

/// Prometheus plus a Grafana instance that depends on it.
pub fn monitoring_services(grafana_password: SecretString) -> Vec<ServiceDefinition> {
    let prometheus = ServiceDefinition::new(PROMETHEUS_SERVICE, ServiceRole::Monitoring, "prom/prometheus:latest")
        .port(PortBinding::same(9090))
        .command("--config.file=/etc/prometheus/prometheus.yml")
        .volume(VolumeMount::bind("./prometheus.yml", "/etc/prometheus/prometheus.yml").read_only())
        .volume(VolumeMount::named("prometheus_data", "/prometheus"))
        .health_check(probe(HealthCheck::cmd([
            "wget",
            "-q",
            "--spider",
            "http://localhost:9090/-/healthy",
        ])));

    let grafana = ServiceDefinition::new(GRAFANA_SERVICE, ServiceRole::Monitoring, "grafana/grafana:latest")
        .port(PortBinding::mapped(3001, 3000))
        .secret("GF_SECURITY_ADMIN_PASSWORD", grafana_password)
        .volume(VolumeMount::named("grafana_data", "/var/lib/grafana"))
        .depends_on(PROMETHEUS_SERVICE)
        .health_check(probe(HealthCheck::cmd([
            "curl",
            "-f",
            "http://localhost:3000/api/health",
        ])));

    vec![prometheus, grafana]
}

/// Self-hosted git service. It stores its data in the primary data store
/// when that is a relational database it supports, otherwise in SQLite.
pub fn ci_service(primary: &ServiceDefinition, kind: &DataStoreKind, db_password: SecretString) -> ServiceDefinition {
    let service = ServiceDefinition::new(GITEA_SERVICE, ServiceRole::Ci, "gitea/gitea:latest")
        .port(PortBinding::mapped(3002, 3000))
        .volume(VolumeMount::named("gitea_data", "/data"))
        .health_check(probe(HealthCheck::cmd([
            "curl",
            "-f",
            "http://localhost:3000/api/v1/version",
        ])));

    let db_type = match kind {
        DataStoreKind::PostgreSql => "postgres",
        DataStoreKind::MySql => "mysql",
        _ => return service.env("GITEA__database__DB_TYPE", "sqlite3"),
    };
    let container_port = primary.ports.first().map(|p| p.container).unwrap_or_default();
    let (user_key, db_key) = match kind {
        DataStoreKind::MySql => ("MYSQL_USER", "MYSQL_DATABASE"),
        _ => ("POSTGRES_USER", "POSTGRES_DB"),
    };
    let literal = |key: &str| match primary.environment.get(key) {
        Some(EnvValue::Literal(v)) => v.clone(),
        _ => String::new(),
    };

    service
        .env("GITEA__database__DB_TYPE", db_type)
        .env("GITEA__database__HOST", format!("{}:{}", primary.name, container_port))
        .env("GITEA__database__NAME", literal(db_key))
        .env("GITEA__database__USER", literal(user_key))
        .secret("GITEA__database__PASSWD", db_password)
        .depends_on(primary.name.clone())
}

/// Runtime defaults for the application tier, chosen by leading language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppRuntime {
    pub image: String,
    pub port: u16,
    pub command: Option<&'static str>,
    pub health_check: HealthCheck,
}

impl AppRuntime {
    pub fn for_language(language: Option<&str>, project_name: &str) -> Self {
        match language {
            Some("python") => Self {
                image: "python:3.11-slim".to_string(),
                port: 8000,
                command: Some("python -m uvicorn main:app --host 0.0.0.0 --port 8000"),
                health_check: probe(HealthCheck::cmd(["curl", "-f", "http://localhost:8000/health"])),
            },
            Some("javascript") | Some("typescript") => Self {
                image: "node:18-alpine".to_string(),
                port: 3000,
                command: Some("npm start"),
                health_check: probe(HealthCheck::cmd([
                    "wget",
                    "-q",
                    "--spider",
                    "http://localhost:3000/health",
                ])),
            },
            _ => Self {
                image: format!("{}:latest", project_name),
                port: 8080,
                command: None,
                health_check: probe(HealthCheck::cmd(["curl", "-f", "http://localhost:8080/health"])),
            },
        }
    }
}

/// Connection settings the application receives.
#[derive(Debug, Clone)]
pub struct AppWiring {
    pub database_url: SecretString,
    /// Secret when it carries credentials.
    pub redis_url: Option<EnvValue>,
    pub search_url: Option<String>,
}

pub fn application_service(
    runtime: AppRuntime,
    tier: Tier,
    wiring: AppWiring,
    depends_on: &[String],
) -> ServiceDefinition {
    let mut service = ServiceDefinition::new(APP_SERVICE, ServiceRole::Application, runtime.image)
        .port(PortBinding::same(runtime.port))
        .env("APP_ENV", tier.as_str())
        .env("LOG_LEVEL", tier.log_level())
        .env("PORT", runtime.port.to_string())
        .secret("DATABASE_URL", wiring.database_url)
        .volume(VolumeMount::bind(".", "/app"))
        .health_check(runtime.health_check);

    if let Some(command) = runtime.command {
        service = service.command(command);
    }
    if let Some(redis_url) = wiring.redis_url {
        service.environment.insert("REDIS_URL".to_string(), redis_url);
    }
    if let Some(search_url) = wiring.search_url {
        service = service.env("MEILI_HOST", search_url);
    }
    for dependency in depends_on {
        service = service.depends_on(dependency.clone());
    }
    service
}
