//! PostgreSQL-based item repository.
//!
//! Items live in the `items` table, created on startup by [`ensure_schema`]
//! when it does not exist yet.

use async_trait::async_trait;
use sqlx::PgPool;

use super::model::{CreateItem, Item, UpdateItem};
use super::repository::{ItemRepository, RepositoryError};

const CREATE_ITEMS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS items (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(100) NOT NULL,
        description VARCHAR(500),
        price DOUBLE PRECISION NOT NULL CHECK (price >= 0),
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ
    )
"#;

const CREATE_ITEMS_NAME_INDEX: &str = "CREATE INDEX IF NOT EXISTS ix_items_name ON items (name)";

const ITEM_COLUMNS: &str = "id, name, description, price, is_active, created_at, updated_at";

/// Create the `items` table and its index if missing.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), RepositoryError> {
    sqlx::query(CREATE_ITEMS_TABLE).execute(pool).await?;
    sqlx::query(CREATE_ITEMS_NAME_INDEX).execute(pool).await?;

    tracing::info!("Item schema ready");
    Ok(())
}

/// PostgreSQL item repository.
pub struct PostgresItemRepository {
    pool: PgPool,
}

impl PostgresItemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ItemRepository for PostgresItemRepository {
    fn backend_type(&self) -> &'static str {
        "postgres"
    }

    async fn get(&self, id: i64) -> Result<Option<Item>, RepositoryError> {
        let item = sqlx::query_as::<_, Item>(&format!(
            "SELECT {} FROM items WHERE id = $1",
            ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Item>, RepositoryError> {
        let items = sqlx::query_as::<_, Item>(&format!(
            "SELECT {} FROM items ORDER BY id OFFSET $1 LIMIT $2",
            ITEM_COLUMNS
        ))
        .bind(offset.max(0))
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }

    async fn create(&self, item: CreateItem) -> Result<Item, RepositoryError> {
        let created = sqlx::query_as::<_, Item>(&format!(
            r#"
            INSERT INTO items (name, description, price, is_active)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            ITEM_COLUMNS
        ))
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.price)
        .bind(item.is_active)
        .fetch_one(&self.pool)
        .await?;

        tracing::trace!(item_id = created.id, "Item inserted into PostgreSQL");
        Ok(created)
    }

    async fn update(&self, id: i64, changes: UpdateItem) -> Result<Option<Item>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Row lock keeps concurrent partial updates from losing fields
        let current = sqlx::query_as::<_, Item>(&format!(
            "SELECT {} FROM items WHERE id = $1 FOR UPDATE",
            ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(mut item) = current else {
            tx.rollback().await?;
            return Ok(None);
        };

        changes.apply_to(&mut item);

        let updated = sqlx::query_as::<_, Item>(&format!(
            r#"
            UPDATE items
            SET name = $2, description = $3, price = $4, is_active = $5, updated_at = $6
            WHERE id = $1
            RETURNING {}
            "#,
            ITEM_COLUMNS
        ))
        .bind(id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.price)
        .bind(item.is_active)
        .bind(item.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn delete(&self, id: i64) -> Result<Option<Item>, RepositoryError> {
        let deleted = sqlx::query_as::<_, Item>(&format!(
            "DELETE FROM items WHERE id = $1 RETURNING {}",
            ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(deleted)
    }

    async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
