//! Video processing worker binary.

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vms_queue::JobQueue;
use vms_worker::{JobExecutor, WorkerConfig};

#[tokio::main]
async fn main() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive("vms=info".parse().unwrap()))
        .init();

    info!("starting vms-worker");

    let config = WorkerConfig::from_env();
    info!(?config, "worker config loaded");

    let queue = match JobQueue::from_env() {
        Ok(q) => q,
        Err(e) => {
            error!("failed to create job queue: {}", e);
            std::process::exit(1);
        }
    };

    let executor = JobExecutor::new(config, queue);

    let shutdown_handle = tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
    });

    if let Err(e) = executor.run().await {
        error!("executor error: {}", e);
        std::process::exit(1);
    }

    shutdown_handle.await.ok();

    info!("worker shutdown complete");
}
