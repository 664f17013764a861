//! Item directory service

use std::sync::Arc;

use crate::metrics::ItemMetrics;

use super::model::{CreateItem, Item, ItemPage, UpdateItem};
use super::repository::{ItemRepository, RepositoryError};

/// Thin orchestration layer over the item repository.
///
/// Missing ids are reported as `None` / `false`; only storage faults are errors.
#[derive(Clone)]
pub struct ItemService {
    repository: Arc<dyn ItemRepository>,
}

impl ItemService {
    pub fn new(repository: Arc<dyn ItemRepository>) -> Self {
        Self { repository }
    }

    pub fn backend_type(&self) -> &'static str {
        self.repository.backend_type()
    }

    pub async fn is_healthy(&self) -> bool {
        self.repository.is_healthy().await
    }

    pub async fn get(&self, id: i64) -> Result<Option<Item>, RepositoryError> {
        tracing::info!(item_id = id, "Getting item");

        let item = self.repository.get(id).await?;
        ItemMetrics::record("get", if item.is_some() { "ok" } else { "not_found" });
        Ok(item)
    }

    pub async fn list(&self, skip: i64, limit: i64) -> Result<ItemPage, RepositoryError> {
        tracing::info!(skip, limit, "Getting items");

        let items = self.repository.list(skip, limit).await?;
        let total = self.repository.count().await?;
        ItemMetrics::record("list", "ok");

        Ok(ItemPage {
            items,
            total,
            skip,
            limit,
        })
    }

    pub async fn create(&self, item: CreateItem) -> Result<Item, RepositoryError> {
        tracing::info!(name = %item.name, "Creating item");

        let created = self.repository.create(item).await?;
        ItemMetrics::record("create", "ok");

        tracing::info!(item_id = created.id, "Item created");
        Ok(created)
    }

    pub async fn update(&self, id: i64, changes: UpdateItem) -> Result<Option<Item>, RepositoryError> {
        tracing::info!(item_id = id, "Updating item");

        let updated = self.repository.update(id, changes).await?;
        match updated {
            Some(_) => {
                ItemMetrics::record("update", "ok");
                tracing::info!(item_id = id, "Item updated");
            }
            None => {
                ItemMetrics::record("update", "not_found");
                tracing::warn!(item_id = id, "Item not found");
            }
        }

        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<bool, RepositoryError> {
        tracing::info!(item_id = id, "Deleting item");

        let deleted = self.repository.delete(id).await?.is_some();
        if deleted {
            ItemMetrics::record("delete", "ok");
            tracing::info!(item_id = id, "Item deleted");
        } else {
            ItemMetrics::record("delete", "not_found");
            tracing::warn!(item_id = id, "Item not found");
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::MemoryItemRepository;

    fn service() -> ItemService {
        ItemService::new(Arc::new(MemoryItemRepository::new()))
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let service = service();

        let created = service
            .create(CreateItem {
                name: "Widget".to_string(),
                description: None,
                price: 9.99,
                is_active: true,
            })
            .await
            .unwrap();
        assert!(created.is_active);

        let fetched = service.get(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Widget");
        assert_eq!(fetched.price, 9.99);
    }

    #[tokio::test]
    async fn test_missing_ids_are_not_errors() {
        let service = service();

        assert!(service.get(99).await.unwrap().is_none());
        assert!(service.update(99, UpdateItem::default()).await.unwrap().is_none());
        assert!(!service.delete(99).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_reports_total() {
        let service = service();
        for i in 0..3 {
            service
                .create(CreateItem {
                    name: format!("item-{}", i),
                    description: None,
                    price: 1.0,
                    is_active: true,
                })
                .await
                .unwrap();
        }

        let page = service.list(0, 2).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 3);
        assert_eq!(page.skip, 0);
        assert_eq!(page.limit, 2);
    }
}
