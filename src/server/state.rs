use std::sync::Arc;
use std::time::Instant;

use crate::broadcast::Broadcaster;
use crate::config::Settings;
use crate::connection_manager::{ConnectionLimits, ConnectionRegistry};
use crate::items::{create_item_repository, ItemService};
use crate::postgres::PostgresPool;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<ConnectionRegistry>,
    pub broadcaster: Arc<Broadcaster>,
    pub items: ItemService,
    pub start_time: Instant,
    pub postgres_pool: Option<PostgresPool>,
}

impl AppState {
    /// Build state with the storage backend chosen by `settings.database`
    pub fn new(settings: Settings, postgres_pool: Option<PostgresPool>) -> Self {
        let repository = create_item_repository(&settings.database, postgres_pool.as_ref());
        let registry = Arc::new(ConnectionRegistry::with_limits(ConnectionLimits::from(
            &settings.websocket,
        )));
        let broadcaster = Arc::new(Broadcaster::new(registry.clone()));

        Self {
            settings: Arc::new(settings),
            registry,
            broadcaster,
            items: ItemService::new(repository),
            start_time: Instant::now(),
            postgres_pool,
        }
    }
}
