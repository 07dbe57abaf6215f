use crate::stack::adapter::{
    primary_service_name, AuthScheme, ConnectionDescriptor, DataStoreAdapter, DataStoreConfig,
    ValidationError, VectorCapability, VectorIndexSpec,
};
use crate::stack::service::{HealthCheck, PortBinding, ServiceDefinition, ServiceRole, VolumeMount};
use crate::stack::DataStoreKind;

const PORT: u16 = 6379;

pub struct RedisAdapter;

impl DataStoreAdapter for RedisAdapter {
    fn kind(&self) -> DataStoreKind {
        DataStoreKind::Redis
    }

    fn default_port(&self) -> u16 {
        PORT
    }

    /// FT.CREATE needs the search module, which plain redis images lack.
    fn default_image(&self) -> &str {
        "redis/redis-stack-server:7.2.0-v10"
    }

    fn vector_capability(&self) -> VectorCapability {
        VectorCapability::Supported {
            max_dimensions: 32768,
            index_type: "flat",
            metric: "cosine",
        }
    }

    fn connection_descriptor(&self, config: &DataStoreConfig) -> Result<ConnectionDescriptor, ValidationError> {
        self.validate(config)?;
        let port = config.resolved_port(PORT);
        let password = config.password_or_empty();
        let scheme = if config.tls { "rediss" } else { "redis" };

        Ok(ConnectionDescriptor {
            scheme,
            host: config.host.clone(),
            port,
            database: "0".to_string(),
            auth: AuthScheme::PasswordOnly,
            tls: config.tls,
            url: format!("{}://:{}@{}:{}/0", scheme, password.expose(), config.host, port).into(),
        })
    }

    fn service_definition(&self, config: &DataStoreConfig) -> Result<ServiceDefinition, ValidationError> {
        self.validate(config)?;

        // the stack entrypoint loads its modules and appends REDIS_ARGS;
        // overriding the command would start a server without them
        Ok(ServiceDefinition::new(
            primary_service_name(&self.kind()),
            ServiceRole::DataStore,
            config.resolved_image(self.default_image()),
        )
        .port(PortBinding::mapped(config.resolved_port(PORT), PORT))
        .secret("REDIS_PASSWORD", config.password_or_empty())
        .env("REDIS_ARGS", "--appendonly yes --requirepass ${REDIS_PASSWORD}")
        .volume(VolumeMount::named("redis_data", "/data"))
        .health_check(HealthCheck::cmd(["redis-cli", "ping"])))
    }

    fn vector_index_statement(&self, spec: &VectorIndexSpec) -> Result<String, ValidationError> {
        ValidationError::check(self.kind(), spec.violations(&self.vector_capability()))?;

        Ok(format!(
            "FT.CREATE {c}_idx ON HASH PREFIX 1 {c}: SCHEMA content TEXT {col} VECTOR FLAT 6 \
             TYPE FLOAT32 DIM {d} DISTANCE_METRIC COSINE",
            c = spec.collection,
            col = spec.column,
            d = spec.dimensions
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_only_auth() {
        let config = DataStoreConfig::default().with_host("primary-redis").with_password("pw");
        let descriptor = RedisAdapter.connection_descriptor(&config).unwrap();
        assert_eq!(descriptor.url.expose(), "redis://:pw@primary-redis:6379/0");
        assert_eq!(descriptor.auth, AuthScheme::PasswordOnly);
    }

    #[test]
    fn test_password_is_referenced_not_embedded() {
        let service = RedisAdapter
            .service_definition(&DataStoreConfig::default().with_password("topsecretvalue"))
            .unwrap();
        let args = service.environment["REDIS_ARGS"].render();
        assert!(args.contains("--requirepass ${REDIS_PASSWORD}"));
        assert!(!args.contains("topsecretvalue"));
    }

    #[test]
    fn test_primary_image_carries_search_module() {
        let service = RedisAdapter.service_definition(&DataStoreConfig::default()).unwrap();
        assert_eq!(service.image, "redis/redis-stack-server:7.2.0-v10");
        // the image entrypoint must stay in charge
        assert!(service.command.is_none());

        let pinned = DataStoreConfig {
            image: Some("redis/redis-stack-server:latest".to_string()),
            ..DataStoreConfig::default()
        };
        assert_eq!(
            RedisAdapter.service_definition(&pinned).unwrap().image,
            "redis/redis-stack-server:latest"
        );
    }

    #[test]
    fn test_flat_index_command() {
        let command = RedisAdapter
            .vector_index_statement(&VectorIndexSpec::new("docs", "embedding", 1536))
            .unwrap();
        assert_eq!(
            command,
            "FT.CREATE docs_idx ON HASH PREFIX 1 docs: SCHEMA content TEXT embedding VECTOR FLAT 6 \
             TYPE FLOAT32 DIM 1536 DISTANCE_METRIC COSINE"
        );
    }
}
