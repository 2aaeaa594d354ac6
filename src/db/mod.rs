pub mod catalog;
pub mod history;
pub mod postgres;
pub mod snapshot;

pub use catalog::{CatalogStore, PgCatalogStore, TrackRow};
pub use history::{create_redis_client, HistorySink, PgHistorySink, RedisHistorySink};
pub use postgres::{create_pool, run_migrations};
pub use snapshot::SnapshotCatalogStore;

#[cfg(test)]
pub use catalog::MockCatalogStore;
