use anyhow::Result;
use dotenv::dotenv;
use feed_collector_rust::{Collector, Config};
use oddsfeed_rust_core::storage::{StorageConfig, StorageGateway};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting Feed Collector Service...");

    let config = Config::from_env();

    let storage = Arc::new(
        StorageGateway::initialize(StorageConfig {
            redis_url: config.redis_url.clone(),
            key_prefix: config.cache_key_prefix.clone(),
            file_path: config.snapshot_file.clone(),
        })
        .await,
    );
    info!(
        "Storage gateway ready ({} mode)",
        storage.storage_type().as_str()
    );

    let collector = Arc::new(Collector::new(&config, storage));

    if config.autostart {
        if let Err(e) = collector
            .start(config.default_interval_secs, &config.default_sport)
            .await
        {
            error!("Autostart rejected: {}", e);
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping collector");
    collector.stop().await;

    Ok(())
}
