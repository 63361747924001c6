//! Transcode worker binary.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vt_queue::RedisBroker;
use vt_storage::{CdnClient, ObjectStore};
use vt_worker::{SyncClient, TaskContext, Worker, WorkerConfig};

use vt_models::TaskType;

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting vt-worker");

    let config = WorkerConfig::from_env();
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }
    info!("Worker config: {:?}", config);

    match vt_media::ffmpeg_version(&config.ffmpeg_path).await {
        Ok(version) => info!("Using {}", version),
        Err(e) => {
            error!("FFmpeg check failed: {}", e);
            std::process::exit(1);
        }
    }

    let store: Option<Arc<dyn ObjectStore>> = match CdnClient::from_env() {
        Ok(client) => Some(Arc::new(client) as Arc<dyn ObjectStore>),
        Err(e) if config.tasks_enabled.contains(&TaskType::Vod) => {
            error!("VOD tasks need the CDN: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            warn!("CDN not configured: {}", e);
            None
        }
    };

    let broker = match RedisBroker::from_env() {
        Ok(b) => Arc::new(b),
        Err(e) => {
            error!("Failed to create broker client: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = broker.init(&config.tasks_enabled).await {
        error!("Failed to initialise broker: {}", e);
        std::process::exit(1);
    }

    let sync = match SyncClient::connect(&config.manager_url).await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to connect to manager: {}", e);
            std::process::exit(1);
        }
    };

    let ctx = Arc::new(TaskContext::new(&config, store));
    let worker = Arc::new(Worker::new(
        config,
        sync.worker_id(),
        broker.clone(),
        broker,
        sync.clone(),
        ctx,
    ));

    // Setup signal handler
    {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
            worker.shutdown();
        });
    }

    if let Err(e) = Arc::clone(&worker).run().await {
        error!("Worker error: {}", e);
    }

    if let Err(e) = sync.disconnect().await {
        warn!("Failed to disconnect cleanly: {}", e);
    }

    info!("Worker shutdown complete");
}

fn init_tracing() {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vt=info"));

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
