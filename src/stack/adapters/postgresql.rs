use crate::stack::adapter::{
    primary_service_name, AuthScheme, ConnectionDescriptor, DataStoreAdapter, DataStoreConfig,
    ValidationError, VectorCapability, VectorIndexSpec,
};
use crate::stack::service::{HealthCheck, PortBinding, ServiceDefinition, ServiceRole, VolumeMount};
use crate::stack::DataStoreKind;

const PORT: u16 = 5432;

pub struct PostgresAdapter;

impl DataStoreAdapter for PostgresAdapter {
    fn kind(&self) -> DataStoreKind {
        DataStoreKind::PostgreSql
    }

    fn default_port(&self) -> u16 {
        PORT
    }

    fn default_image(&self) -> &str {
        "pgvector/pgvector:pg16"
    }

    fn vector_capability(&self) -> VectorCapability {
        // pgvector caps indexed columns at 2000 dimensions
        VectorCapability::Supported {
            max_dimensions: 2000,
            index_type: "ivfflat",
            metric: "cosine",
        }
    }

    fn connection_descriptor(&self, config: &DataStoreConfig) -> Result<ConnectionDescriptor, ValidationError> {
        self.validate(config)?;
        let port = config.resolved_port(PORT);
        let ssl_mode = if config.tls { "require" } else { "disable" };
        let password = config.password_or_empty();

        Ok(ConnectionDescriptor {
            scheme: "postgresql",
            host: config.host.clone(),
            port,
            database: config.database.clone(),
            auth: AuthScheme::UsernamePassword,
            tls: config.tls,
            url: format!(
                "postgresql://{}:{}@{}:{}/{}?sslmode={}",
                config.username,
                password.expose(),
                config.host,
                port,
                config.database,
                ssl_mode
            )
            .into(),
        })
    }

    fn service_definition(&self, config: &DataStoreConfig) -> Result<ServiceDefinition, ValidationError> {
        self.validate(config)?;

        Ok(ServiceDefinition::new(
            primary_service_name(&self.kind()),
            ServiceRole::DataStore,
            config.resolved_image(self.default_image()),
        )
        .port(PortBinding::mapped(config.resolved_port(PORT), PORT))
        .env("POSTGRES_DB", &config.database)
        .env("POSTGRES_USER", &config.username)
        .secret("POSTGRES_PASSWORD", config.password_or_empty())
        .volume(VolumeMount::named("postgres_data", "/var/lib/postgresql/data"))
        .health_check(HealthCheck::shell(format!(
            "pg_isready -U {} -d {}",
            config.username, config.database
        ))))
    }

    fn vector_index_statement(&self, spec: &VectorIndexSpec) -> Result<String, ValidationError> {
        ValidationError::check(self.kind(), spec.violations(&self.vector_capability()))?;
        let VectorIndexSpec {
            collection,
            column,
            dimensions,
        } = spec;

        Ok(format!(
            "CREATE EXTENSION IF NOT EXISTS vector;\n\
             CREATE TABLE IF NOT EXISTS {collection} (\n    \
                 id BIGSERIAL PRIMARY KEY,\n    \
                 content TEXT,\n    \
                 metadata JSONB,\n    \
                 {column} vector({dimensions})\n\
             );\n\
             CREATE INDEX IF NOT EXISTS {collection}_{column}_idx ON {collection} \
             USING ivfflat ({column} vector_cosine_ops) WITH (lists = 100);"
        ))
    }
}
