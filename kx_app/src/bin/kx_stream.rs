use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use kx_app::AppConfig;
use kx_app::cli;
use kx_app::config_loader;
use kx_app::shutdown_handler;
use kx_app::tracing_setup;
use kx_http::ExchangeClient;
use kx_http::HttpTransport;
use kx_ws::StreamClient;
use kx_ws::StreamEvent;
use serde_json::json;
use tracing::error;
use tracing::info;
use tracing::warn;

fn main() -> anyhow::Result<()> {
    // .env may provide KX_CONFIG and RUST_LOG
    dotenvy::dotenv().ok();

    let path = cli::config_path("config/kx.toml");
    let (config, load_error) = config_loader::load_config_or_default(&path);

    // Keep guard alive for entire application lifetime
    let _guard = tracing_setup::init_from_config("kx_stream", &config.log);
    match load_error {
        None => info!("Loaded config from {path}"),
        Some(err) => warn!("Failed to load config from {}: {}. Using defaults.", path, err),
    }

    check_server_time(&config)?;

    let running = Arc::new(AtomicBool::new(true));
    shutdown_handler::setup(Arc::clone(&running))?;

    let mut client = StreamClient::new(config.stream.stream_config())?;
    let pairs: Vec<&str> = config.stream.pairs.iter().map(String::as_str).collect();

    let stream_running = Arc::clone(&running);
    let subscribed = client.subscribe_public(&pairs, json!({ "name": config.stream.channel }), move |event| match event {
        StreamEvent::Message(value) => info!("{value}"),
        StreamEvent::ReconnectExhausted => {
            error!("Stream abandoned after exhausting reconnect attempts");
            stream_running.store(false, Ordering::Relaxed);
        }
    })?;
    if !subscribed {
        anyhow::bail!("subscription for {pairs:?} already active");
    }
    info!("Streaming {} for {}", config.stream.channel, pairs.join(","));

    shutdown_handler::wait(&running, Duration::from_millis(100));

    client.shutdown();
    let stats = client.stats();
    info!(
        "Shutdown complete: {} messages, {} dropped frames, {} connects, {} failures",
        stats.messages_delivered, stats.frames_dropped, stats.connects, stats.connection_failures
    );
    Ok(())
}

/// Public REST round trip through the throttled client before streaming
fn check_server_time(config: &AppConfig) -> anyhow::Result<()> {
    let transport = HttpTransport::with_config(config.client.http_config())?;
    let client = ExchangeClient::new(transport, config.client.client_config()?);

    match client.server_time() {
        Ok(time) => info!("Exchange time: {} ({})", time.rfc1123, time.unixtime),
        Err(err) => warn!("Server time unavailable: {err}"),
    }
    Ok(())
}
