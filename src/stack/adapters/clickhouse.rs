use crate::stack::adapter::{
    primary_service_name, AuthScheme, ConnectionDescriptor, DataStoreAdapter, DataStoreConfig,
    ValidationError, VectorCapability, VectorIndexSpec,
};
use crate::stack::service::{HealthCheck, PortBinding, ServiceDefinition, ServiceRole, VolumeMount};
use crate::stack::DataStoreKind;

const HTTP_PORT: u16 = 8123;
const NATIVE_PORT: u16 = 9000;

pub struct ClickHouseAdapter;

impl DataStoreAdapter for ClickHouseAdapter {
    fn kind(&self) -> DataStoreKind {
        DataStoreKind::ClickHouse
    }

    fn default_port(&self) -> u16 {
        HTTP_PORT
    }

    fn default_image(&self) -> &str {
        "clickhouse/clickhouse-server:latest"
    }

    fn extra_ports(&self) -> Vec<u16> {
        vec![NATIVE_PORT]
    }

    fn vector_capability(&self) -> VectorCapability {
        VectorCapability::Supported {
            max_dimensions: 65535,
            index_type: "array-float32",
            metric: "cosine",
        }
    }

    fn connection_descriptor(&self, config: &DataStoreConfig) -> Result<ConnectionDescriptor, ValidationError> {
        self.validate(config)?;
        let port = config.resolved_port(HTTP_PORT);
        let password = config.password_or_empty();
        let mut url = format!(
            "clickhouse://{}:{}@{}:{}/{}",
            config.username,
            password.expose(),
            config.host,
            port,
            config.database
        );
        if config.tls {
            url.push_str("?secure=true");
        }

        Ok(ConnectionDescriptor {
            scheme: "clickhouse",
            host: config.host.clone(),
            port,
            database: config.database.clone(),
            auth: AuthScheme::UsernamePassword,
            tls: config.tls,
            url: url.into(),
        })
    }

    fn service_definition(&self, config: &DataStoreConfig) -> Result<ServiceDefinition, ValidationError> {
        self.validate(config)?;

        Ok(ServiceDefinition::new(
            primary_service_name(&self.kind()),
            ServiceRole::DataStore,
            config.resolved_image(self.default_image()),
        )
        .port(PortBinding::mapped(config.resolved_port(HTTP_PORT), HTTP_PORT))
        .port(PortBinding::same(NATIVE_PORT))
        .env("CLICKHOUSE_DB", &config.database)
        .env("CLICKHOUSE_USER", &config.username)
        .secret("CLICKHOUSE_PASSWORD", config.password_or_empty())
        .volume(VolumeMount::named("clickhouse_data", "/var/lib/clickhouse"))
        .health_check(HealthCheck::cmd(["curl", "-f", "http://localhost:8123/ping"])))
    }

    fn vector_index_statement(&self, spec: &VectorIndexSpec) -> Result<String, ValidationError> {
        ValidationError::check(self.kind(), spec.violations(&self.vector_capability()))?;
        let VectorIndexSpec {
            collection,
            column,
            dimensions,
        } = spec;

        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {collection} (\n    \
                 id UInt64,\n    \
                 content String,\n    \
                 {column} Array(Float32),\n    \
                 created_at DateTime DEFAULT now(),\n    \
                 CONSTRAINT {column}_dims CHECK length({column}) = {dimensions}\n\
             ) ENGINE = MergeTree() ORDER BY id;"
        ))
    }
}
