//! Manager server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vt_manager::{
    create_router, metrics, AppState, ManagerConfig, StateStore, Tidier, TidierConfig,
};
use vt_models::TaskType;
use vt_queue::RedisBroker;

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Install rustls crypto provider (required for rustls 0.23+)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    init_tracing();

    info!("Starting vt-manager");

    let config = ManagerConfig::from_env();
    info!("Manager config: {:?}", config);
    if !config.has_credentials() {
        warn!("VT_HTTP_USER/VT_HTTP_PASS not set, status and task endpoints will reject every request");
    }

    let broker = match RedisBroker::from_env() {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to create broker client: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = broker.init(&TaskType::ALL).await {
        error!("Failed to initialise broker: {}", e);
        std::process::exit(1);
    }

    let store = Arc::new(StateStore::new());
    let state = AppState::new(config.clone(), Arc::clone(&store), Arc::new(broker));

    let metrics_handle = if config.metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => {
                info!("Prometheus metrics enabled at /metrics");
                Some(handle)
            }
            Err(e) => {
                warn!("Failed to install metrics recorder: {}", e);
                None
            }
        }
    } else {
        None
    };

    // Start tidier background task
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tidier = Tidier::new(Arc::clone(&store), TidierConfig::from_env());
    let tidier_handle = tokio::spawn(async move {
        tidier.run(shutdown_rx).await;
    });

    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = match config.bind_address().parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid bind address {}: {}", config.bind_address(), e);
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("Listening on {}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
    }

    shutdown_tx.send_replace(true);
    if let Err(e) = tidier_handle.await {
        warn!("Tidier ended abnormally: {}", e);
    }

    info!("Server shutdown complete");
}

fn init_tracing() {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vt=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
