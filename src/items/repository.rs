//! Storage trait for item records.
//!
//! This module defines the abstraction layer for item storage, allowing
//! different backends (memory, PostgreSQL) to be used interchangeably.

use async_trait::async_trait;
use thiserror::Error;

use super::model::{CreateItem, Item, UpdateItem};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),
}

/// Durable record store for items.
///
/// Lookups of missing ids return `Ok(None)`; errors are reserved for
/// storage faults.
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Backend type identifier ("memory", "postgres")
    fn backend_type(&self) -> &'static str;

    /// Get an item by id.
    async fn get(&self, id: i64) -> Result<Option<Item>, RepositoryError>;

    /// Get up to `limit` items ordered by id, skipping the first `offset`.
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Item>, RepositoryError>;

    /// Number of stored items.
    async fn count(&self) -> Result<u64, RepositoryError>;

    /// Insert a new item and return it with its assigned id.
    async fn create(&self, item: CreateItem) -> Result<Item, RepositoryError>;

    /// Apply a partial update; `None` when the id is absent.
    async fn update(&self, id: i64, changes: UpdateItem) -> Result<Option<Item>, RepositoryError>;

    /// Delete an item, returning it; `None` when the id is absent.
    async fn delete(&self, id: i64) -> Result<Option<Item>, RepositoryError>;

    /// Whether the backend is reachable.
    async fn is_healthy(&self) -> bool {
        true
    }
}
