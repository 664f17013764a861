use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use mumo_service::config::{Settings, StorageBackend};
use mumo_service::items::ensure_schema;
use mumo_service::postgres::PostgresPool;
use mumo_service::server::{create_app, AppState};
use mumo_service::shutdown::GracefulShutdown;
use mumo_service::tasks::HeartbeatTask;
use mumo_service::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new().context("failed to load configuration")?;

    // Initialize tracing
    let _telemetry = init_telemetry(&settings.log, &settings.otel)?;
    tracing::info!(project = %settings.api.project_name, "Configuration loaded");

    // Connect storage
    let postgres_pool = match settings.database.backend {
        StorageBackend::Postgres => {
            let pool = PostgresPool::new(&settings.database)
                .await
                .context("failed to connect to PostgreSQL")?;
            ensure_schema(pool.pool())
                .await
                .context("failed to create items schema")?;
            Some(pool)
        }
        StorageBackend::Memory => None,
    };

    // Create application state
    let state = AppState::new(settings.clone(), postgres_pool.clone());
    tracing::info!(storage = state.items.backend_type(), "Application state initialized");

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Start heartbeat task in background
    let heartbeat_task = HeartbeatTask::new(
        settings.websocket.clone(),
        state.registry.clone(),
        shutdown_tx.subscribe(),
    );
    let heartbeat_handle = tokio::spawn(async move {
        heartbeat_task.run().await;
    });

    let graceful = GracefulShutdown::new(
        state.registry.clone(),
        state.broadcaster.clone(),
        shutdown_tx,
    );

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Server listening on {}", addr);

    // Upgraded WebSocket connections outlive the HTTP server, so they are
    // closed explicitly once the signal arrives
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let reason = shutdown_signal_handler().await;
            graceful.execute(reason).await;
        })
        .await?;

    tracing::info!("Waiting for background tasks to finish...");
    let _ = heartbeat_handle.await;

    if let Some(pool) = postgres_pool {
        pool.close().await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
            "ctrl_c"
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
            "terminate"
        }
    }
}
