use crate::stack::adapter::{
    primary_service_name, AuthScheme, ConnectionDescriptor, DataStoreAdapter, DataStoreConfig,
    ValidationError, VectorCapability, VectorIndexSpec,
};
use crate::stack::service::{HealthCheck, PortBinding, ServiceDefinition, ServiceRole, VolumeMount};
use crate::stack::DataStoreKind;

const PORT: u16 = 3306;

pub struct MySqlAdapter;

impl DataStoreAdapter for MySqlAdapter {
    fn kind(&self) -> DataStoreKind {
        DataStoreKind::MySql
    }

    fn default_port(&self) -> u16 {
        PORT
    }

    fn default_image(&self) -> &str {
        "mysql:8.0"
    }

    fn vector_capability(&self) -> VectorCapability {
        VectorCapability::Supported {
            max_dimensions: 16383,
            index_type: "vector-index",
            metric: "cosine",
        }
    }

    fn connection_descriptor(&self, config: &DataStoreConfig) -> Result<ConnectionDescriptor, ValidationError> {
        self.validate(config)?;
        let port = config.resolved_port(PORT);
        let password = config.password_or_empty();

        Ok(ConnectionDescriptor {
            scheme: "mysql",
            host: config.host.clone(),
            port,
            database: config.database.clone(),
            auth: AuthScheme::UsernamePassword,
            tls: config.tls,
            url: format!(
                "mysql://{}:{}@{}:{}/{}?useSSL={}",
                config.username,
                password.expose(),
                config.host,
                port,
                config.database,
                config.tls
            )
            .into(),
        })
    }

    fn service_definition(&self, config: &DataStoreConfig) -> Result<ServiceDefinition, ValidationError> {
        self.validate(config)?;
        let password = config.password_or_empty();

        Ok(ServiceDefinition::new(
            primary_service_name(&self.kind()),
            ServiceRole::DataStore,
            config.resolved_image(self.default_image()),
        )
        .port(PortBinding::mapped(config.resolved_port(PORT), PORT))
        .env("MYSQL_DATABASE", &config.database)
        .env("MYSQL_USER", &config.username)
        .secret("MYSQL_PASSWORD", password.clone())
        .secret("MYSQL_ROOT_PASSWORD", password)
        .volume(VolumeMount::named("mysql_data", "/var/lib/mysql"))
        .health_check(HealthCheck::cmd(["mysqladmin", "ping", "-u", config.username.as_str()])))
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
                 id INT AUTO_INCREMENT PRIMARY KEY,\n    \
                 content LONGTEXT NOT NULL,\n    \
                 metadata JSON,\n    \
                 {column} VECTOR({dimensions}) NOT NULL,\n    \
                 created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,\n    \
                 VECTOR INDEX {collection}_{column}_idx ({column})\n\
             );"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_string_tls_switch() {
        let config = DataStoreConfig::default().with_password("pw");
        let url = MySqlAdapter.connection_descriptor(&config).unwrap().url;
        assert_eq!(url.expose(), "mysql://app:pw@localhost:3306/app?useSSL=false");

        let tls = DataStoreConfig { tls: true, ..config };
        assert!(MySqlAdapter
            .connection_descriptor(&tls)
            .unwrap()
            .url
            .expose()
            .ends_with("useSSL=true"));
    }

    #[test]
    fn test_root_password_matches_user_password() {
        let service = MySqlAdapter
            .service_definition(&DataStoreConfig::default().with_password("pw"))
            .unwrap();
        let secrets: Vec<_> = service.secrets().map(|(key, _, value)| (key, value.expose())).collect();
        assert_eq!(secrets, vec![("MYSQL_PASSWORD", "pw"), ("MYSQL_ROOT_PASSWORD", "pw")]);
        assert_eq!(
            service.health_check.unwrap().test,
            vec!["CMD", "mysqladmin", "ping", "-u", "app"]
        );
    }

    #[test]
    fn test_vector_table_statement() {
        let sql = MySqlAdapter
            .vector_index_statement(&VectorIndexSpec::new("chunks", "embedding", 384))
            .unwrap();
        assert!(sql.contains("embedding VECTOR(384) NOT NULL"));
        assert!(sql.contains("VECTOR INDEX chunks_embedding_idx (embedding)"));
    }
}
