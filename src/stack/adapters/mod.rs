//! Built-in data-store adapters.

mod clickhouse;
mod elasticsearch;
mod mongodb;
mod mysql;
mod postgresql;
mod redis;

pub use clickhouse::ClickHouseAdapter;
pub use elasticsearch::ElasticsearchAdapter;
pub use mongodb::MongoAdapter;
pub use mysql::MySqlAdapter;
pub use postgresql::PostgresAdapter;
pub use redis::RedisAdapter;

use super::adapter::DataStoreAdapter;
use super::DataStoreKind;
use std::sync::Arc;

/// Adapter for a built-in kind; `None` for custom kinds.
pub fn builtin_adapter(kind: &DataStoreKind) -> Option<Arc<dyn DataStoreAdapter>> {
    let adapter: Arc<dyn DataStoreAdapter> = match kind {
        DataStoreKind::PostgreSql => Arc::new(PostgresAdapter),
        DataStoreKind::MongoDb => Arc::new(MongoAdapter),
        DataStoreKind::MySql => Arc::new(MySqlAdapter),
        DataStoreKind::ClickHouse => Arc::new(ClickHouseAdapter),
        DataStoreKind::Redis => Arc::new(RedisAdapter),
        DataStoreKind::Elasticsearch => Arc::new(ElasticsearchAdapter),
        DataStoreKind::Custom(_) => return None,
    };
    Some(adapter)
}
