//! Item repository factory

use std::sync::Arc;

use crate::config::{DatabaseConfig, StorageBackend};
use crate::postgres::PostgresPool;

use super::memory_backend::MemoryItemRepository;
use super::postgres_backend::PostgresItemRepository;
use super::repository::ItemRepository;

/// Create an item repository based on configuration.
///
/// - `postgres`: a `PostgresItemRepository` if a pool is provided
/// - `memory` (default): a `MemoryItemRepository`
///
/// ```rust,ignore
/// let repository = create_item_repository(&settings.database, Some(&pg_pool));
/// ```
pub fn create_item_repository(
    settings: &DatabaseConfig,
    postgres_pool: Option<&PostgresPool>,
) -> Arc<dyn ItemRepository> {
    match settings.backend {
        StorageBackend::Postgres => {
            if let Some(pool) = postgres_pool {
                tracing::info!(backend = "postgres", "Creating PostgreSQL item repository");
                Arc::new(PostgresItemRepository::new(pool.pool().clone()))
            } else {
                tracing::warn!(
                    "PostgreSQL backend requested but no pool provided, falling back to memory"
                );
                Arc::new(MemoryItemRepository::new())
            }
        }
        StorageBackend::Memory => {
            tracing::info!(backend = "memory", "Creating memory item repository");
            Arc::new(MemoryItemRepository::new())
        }
    }
}
