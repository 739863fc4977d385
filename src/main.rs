use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use payflow::api::response::ConfigResponse;
use payflow::api::routes::{create_router, AppState};
use payflow::config::Config;
use payflow::observability::{init_tracing, MetricsRegistry};
use payflow::service::PaymentProcessor;
use payflow::storage::{MemoryStorage, PostgresStorage, Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration
    let config = Config::parse();

    // Initialize tracing
    init_tracing(&config.log_level, config.log_format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting payflow payment service"
    );

    // Storage backend
    let storage: Arc<dyn Storage> = match config.database_url {
        Some(ref url) => {
            let storage = PostgresStorage::connect(
                url,
                config.db_min_connections,
                config.db_max_connections,
            )
            .await?;
            storage.run_migrations().await?;
            info!(
                max_connections = config.db_max_connections,
                "Connected to PostgreSQL, migrations applied"
            );
            Arc::new(storage)
        }
        None => {
            warn!("No database URL configured, using in-memory storage");
            Arc::new(MemoryStorage::new())
        }
    };

    let settings = config.fraud_settings();
    info!(
        enabled = settings.enabled,
        high_amount_threshold = %settings.high_amount_threshold,
        velocity_limit = settings.velocity_limit,
        velocity_window_secs = settings.velocity_window_secs,
        block_score = settings.block_score,
        "Fraud detection configured"
    );

    let metrics = Arc::new(MetricsRegistry::new());
    let processor = PaymentProcessor::new(storage, &settings, metrics.clone())
        .with_evaluation_timeout(config.evaluation_timeout())
        .with_failure_rate(config.failure_probability());

    // Create application state
    let state = Arc::new(AppState {
        processor,
        metrics,
        config: ConfigResponse {
            fraud: settings,
            storage: config.storage_kind().to_string(),
            evaluation_timeout_ms: config.evaluation_timeout_ms,
            failure_rate: config.failure_probability(),
        },
        start_time: Instant::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    });

    // Create router
    let app = create_router(state);

    // Parse listen address
    let addr: SocketAddr = config.listen_addr.parse()?;

    info!(addr = %addr, "Starting HTTP server");

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run server with graceful shutdown
    if config.graceful_shutdown {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else {
        axum::serve(listener, app).await?;
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
