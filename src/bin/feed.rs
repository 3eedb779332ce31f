// src/bin/feed.rs
use anyhow::Context;
use sweepscope::config::feed_config_from_env;
use sweepscope::feed::{DeviceServer, FeedServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = feed_config_from_env().context("failed to load feed configuration")?;
    if config.spawn_device {
        let device = DeviceServer::bind(&config)
            .await
            .with_context(|| format!("failed to bind device {}", config.device_addr()))?;
        tokio::spawn(async move {
            if let Err(e) = device.run().await {
                log::error!("device stopped: {e}");
            }
        });
    }
    let server = FeedServer::bind(&config)
        .await
        .with_context(|| format!("failed to bind {}", config.addr()))?;
    log::info!(
        "{} channels, {} samples per batch every {} ms from {}",
        config.channels,
        config.sub_frames(),
        config.interval_ms,
        config.device_addr()
    );
    tokio::select! {
        result = server.run() => result.context("feed server stopped")?,
        _ = tokio::signal::ctrl_c() => log::info!("shutting down"),
    }
    Ok(())
}
