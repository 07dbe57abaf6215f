use crate::stack::adapter::{
    primary_service_name, AuthScheme, ConfigViolation, ConnectionDescriptor, DataStoreAdapter,
    DataStoreConfig, ValidationError, VectorCapability, VectorIndexSpec,
};
use crate::stack::service::{HealthCheck, PortBinding, ServiceDefinition, ServiceRole, VolumeMount};
use crate::stack::DataStoreKind;
use serde_json::json;

const PORT: u16 = 9200;

pub struct ElasticsearchAdapter;

impl DataStoreAdapter for ElasticsearchAdapter {
    fn kind(&self) -> DataStoreKind {
        DataStoreKind::Elasticsearch
    }

    fn default_port(&self) -> u16 {
        PORT
    }

    fn default_image(&self) -> &str {
        "docker.elastic.co/elasticsearch/elasticsearch:8.0.0"
    }

    fn vector_capability(&self) -> VectorCapability {
        // indexed dense_vector limit in 8.0
        VectorCapability::Supported {
            max_dimensions: 1024,
            index_type: "dense_vector",
            metric: "cosine",
        }
    }

    fn connection_descriptor(&self, config: &DataStoreConfig) -> Result<ConnectionDescriptor, ValidationError> {
        self.validate(config)?;
        let port = config.resolved_port(PORT);
        let password = config.password_or_empty();
        let scheme = if config.tls { "https" } else { "http" };

        Ok(ConnectionDescriptor {
            scheme,
            host: config.host.clone(),
            port,
            database: config.database.clone(),
            auth: AuthScheme::UsernamePassword,
            tls: config.tls,
            url: format!(
                "{}://{}:{}@{}:{}",
                scheme,
                config.username,
                password.expose(),
                config.host,
                port
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
        .env("discovery.type", "single-node")
        .env("xpack.security.enabled", "true")
        .secret("ELASTIC_PASSWORD", config.password_or_empty())
        .volume(VolumeMount::named(
            "elasticsearch_data",
            "/usr/share/elasticsearch/data",
        ))
        .health_check(
            HealthCheck::cmd(["curl", "-f", "http://localhost:9200/_cluster/health"]).start_period(30),
        ))
    }

    fn vector_index_statement(&self, spec: &VectorIndexSpec) -> Result<String, ValidationError> {
        let mut violations = spec.violations(&self.vector_capability());
        if spec.collection.chars().any(|c| c.is_ascii_uppercase()) {
            violations.push(ConfigViolation::new("collection", "index names must be lowercase"));
        }
        ValidationError::check(self.kind(), violations)?;

        let mut properties = serde_json::Map::new();
        properties.insert("content".to_string(), json!({ "type": "text" }));
        properties.insert(
            spec.column.clone(),
            json!({
                "type": "dense_vector",
                "dims": spec.dimensions,
                "index": true,
                "similarity": "cosine",
            }),
        );
        let body = json!({ "mappings": { "properties": properties } });

        let rendered = serde_json::to_string_pretty(&body).map_err(|e| ValidationError {
            kind: self.kind(),
            violations: vec![ConfigViolation::new("mappings", e.to_string())],
        })?;
        Ok(format!("PUT /{}\n{}", spec.collection, rendered))
    }
}
