//! In-memory item repository.
//!
//! Items are lost on service restart. Used as the default backend and in tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::model::{CreateItem, Item, UpdateItem};
use super::repository::{ItemRepository, RepositoryError};

/// In-memory item repository.
///
/// A `BTreeMap` keeps items ordered by id so paging is stable.
pub struct MemoryItemRepository {
    items: RwLock<BTreeMap<i64, Item>>,
    next_id: AtomicI64,
}

impl MemoryItemRepository {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryItemRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ItemRepository for MemoryItemRepository {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, id: i64) -> Result<Option<Item>, RepositoryError> {
        Ok(self.items.read().await.get(&id).cloned())
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Item>, RepositoryError> {
        let offset = offset.max(0) as usize;
        let limit = limit.max(0) as usize;

        Ok(self
            .items
            .read()
            .await
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.items.read().await.len() as u64)
    }

    async fn create(&self, item: CreateItem) -> Result<Item, RepositoryError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let item = Item {
            id,
            name: item.name,
            description: item.description,
            price: item.price,
            is_active: item.is_active,
            created_at: Utc::now(),
            updated_at: None,
        };

        self.items.write().await.insert(id, item.clone());

        tracing::trace!(item_id = id, "Item stored in memory");
        Ok(item)
    }

    async fn update(&self, id: i64, changes: UpdateItem) -> Result<Option<Item>, RepositoryError> {
        let mut items = self.items.write().await;
        let Some(item) = items.get_mut(&id) else {
            return Ok(None);
        };

        changes.apply_to(item);
        Ok(Some(item.clone()))
    }

    async fn delete(&self, id: i64) -> Result<Option<Item>, RepositoryError> {
        Ok(self.items.write().await.remove(&id))
    }
}
