mod settings;

pub use settings::{
    ApiConfig, DatabaseConfig, LogConfig, LogFormat, OtelConfig, ServerConfig, Settings,
    StorageBackend, WebSocketConfig,
};
