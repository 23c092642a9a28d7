use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rebate_core::service::{Backends, RebateService};
use rebate_db::repositories::{
    PgCalculationRepository, PgReconciliationSource, PgReportRepository, PgRuleRepository,
};
use rebate_events::{EventBus, EventLog, EventPersistence};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rebate_api::config::{ServerConfig, StorageBackend};
use rebate_api::router::build_app_router;
use rebate_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rebate_api=debug,rebate_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        storage = ?config.storage,
        "Loaded server configuration"
    );

    // --- Storage ---
    let (backends, pool) = match config.storage {
        StorageBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .expect("DATABASE_URL must be set when STORAGE_BACKEND=postgres");

            let pool = rebate_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            rebate_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            tracing::info!("Database health check passed");

            rebate_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            let backends = Backends {
                rules: Arc::new(PgRuleRepository::new(pool.clone())),
                calculations: Arc::new(PgCalculationRepository::new(pool.clone())),
                reports: Arc::new(PgReportRepository::new(pool.clone())),
                source: Arc::new(PgReconciliationSource::new(pool.clone())),
            };
            (backends, Some(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage with demo data; nothing is persisted");
            (Backends::in_memory_demo(), None)
        }
    };

    // --- Service ---
    let service = Arc::new(RebateService::new(backends, config.service.clone()));
    service
        .initialize()
        .await
        .expect("Failed to seed default validation rules");
    tracing::info!("Default validation rules seeded");

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let events_handle = match &pool {
        Some(pool) => tokio::spawn(EventPersistence::run(pool.clone(), event_bus.subscribe())),
        None => {
            let receiver = event_bus.subscribe();
            tokio::spawn(async move {
                let seen = EventLog::run(receiver).await;
                tracing::debug!(seen, "Event log drained");
            })
        }
    };
    tracing::info!("Event services started");

    // --- App state ---
    let shutdown = CancellationToken::new();
    let state = AppState {
        service,
        config: Arc::new(config.clone()),
        event_bus: Arc::clone(&event_bus),
        pool,
        shutdown: shutdown.clone(),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Abandon in-flight validation runs; they commit nothing.
    shutdown.cancel();

    // Dropping the last sender closes the channel and ends the subscriber.
    drop(event_bus);
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(shutdown_timeout, events_handle)
        .await
        .is_err()
    {
        tracing::warn!("Event subscriber did not stop within the shutdown timeout");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
