//! Item catalogue: records, storage backends and the directory service.
//!
//! - `ItemRepository`: storage trait with memory and PostgreSQL backends
//! - `ItemService`: the directory service the HTTP handlers call into
//! - `CreateItem` / `UpdateItem`: request payloads with schema validation

mod factory;
mod memory_backend;
mod model;
mod postgres_backend;
mod repository;
mod service;

pub use factory::create_item_repository;
pub use memory_backend::MemoryItemRepository;
pub use model::{
    CreateItem, Item, ItemPage, UpdateItem, ValidationError, DESCRIPTION_MAX_LEN, NAME_MAX_LEN,
};
pub use postgres_backend::{ensure_schema, PostgresItemRepository};
pub use repository::{ItemRepository, RepositoryError};
pub use service::ItemService;
