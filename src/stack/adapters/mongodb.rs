use crate::stack::adapter::{
    primary_service_name, AuthScheme, ConnectionDescriptor, DataStoreAdapter, DataStoreConfig,
    ValidationError, VectorCapability, VectorIndexSpec,
};
use crate::stack::service::{HealthCheck, PortBinding, ServiceDefinition, ServiceRole, VolumeMount};
use crate::stack::DataStoreKind;
use serde_json::json;

const PORT: u16 = 27017;

pub struct MongoAdapter;

impl DataStoreAdapter for MongoAdapter {
    fn kind(&self) -> DataStoreKind {
        DataStoreKind::MongoDb
    }

    fn default_port(&self) -> u16 {
        PORT
    }

    fn default_image(&self) -> &str {
        "mongo:7.0"
    }

    fn vector_capability(&self) -> VectorCapability {
        VectorCapability::Supported {
            max_dimensions: 2000,
            index_type: "vector-ivf",
            metric: "cosine",
        }
    }

    fn connection_descriptor(&self, config: &DataStoreConfig) -> Result<ConnectionDescriptor, ValidationError> {
        self.validate(config)?;
        let port = config.resolved_port(PORT);
        let password = config.password_or_empty();
        let mut url = format!(
            "mongodb://{}:{}@{}:{}/{}",
            config.username,
            password.expose(),
            config.host,
            port,
            config.database
        );
        if config.tls {
            url.push_str("?tls=true");
        }

        Ok(ConnectionDescriptor {
            scheme: "mongodb",
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
        .port(PortBinding::mapped(config.resolved_port(PORT), PORT))
        .env("MONGO_INITDB_DATABASE", &config.database)
        .env("MONGO_INITDB_ROOT_USERNAME", &config.username)
        .secret("MONGO_INITDB_ROOT_PASSWORD", config.password_or_empty())
        .volume(VolumeMount::named("mongodb_data", "/data/db"))
        .health_check(HealthCheck::cmd(["mongosh", "--eval", "db.adminCommand('ping')"])))
    }

    fn vector_index_statement(&self, spec: &VectorIndexSpec) -> Result<String, ValidationError> {
        ValidationError::check(self.kind(), spec.violations(&self.vector_capability()))?;

        let mut key = serde_json::Map::new();
        key.insert(spec.column.clone(), json!("cosmosSearch"));
        let command = json!({
            "createIndexes": spec.collection,
            "indexes": [{
                "name": format!("{}_{}_idx", spec.collection, spec.column),
                "key": key,
                "cosmosSearchOptions": {
                    "kind": "vector-ivf",
                    "numLists": 100,
                    "similarity": "COS",
                    "dimensions": spec.dimensions,
                },
            }],
        });
        Ok(format!("db.runCommand({})", command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_string() {
        let config = DataStoreConfig::default()
            .with_host("primary-mongodb")
            .with_password("pw");
        let descriptor = MongoAdapter.connection_descriptor(&config).unwrap();
        assert_eq!(descriptor.url.expose(), "mongodb://app:pw@primary-mongodb:27017/app");
        assert_eq!(descriptor.auth, AuthScheme::UsernamePassword);
    }

    #[test]
    fn test_service_definition() {
        let service = MongoAdapter
            .service_definition(&DataStoreConfig::default().with_password("pw"))
            .unwrap();
        assert_eq!(service.image, "mongo:7.0");
        assert!(service.environment.contains_key("MONGO_INITDB_ROOT_PASSWORD"));
        assert_eq!(
            service.health_check.unwrap().test,
            vec!["CMD", "mongosh", "--eval", "db.adminCommand('ping')"]
        );
    }

    #[test]
    fn test_vector_index_command_is_json() {
        let statement = MongoAdapter
            .vector_index_statement(&VectorIndexSpec::new("documents", "embedding", 768))
            .unwrap();
        let body = statement
            .strip_prefix("db.runCommand(")
            .and_then(|s| s.strip_suffix(')'))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(value["indexes"][0]["cosmosSearchOptions"]["dimensions"], 768);
        assert_eq!(value["indexes"][0]["key"]["embedding"], "cosmosSearch");
    }
}
