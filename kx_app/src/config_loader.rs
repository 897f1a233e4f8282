use std::path::Path;
use std::time::Duration;

use config::Config;
use config::ConfigError;
use config::File;
use config::FileFormat;
use kx_http::ClientConfig;
use kx_http::HttpClientConfig;
use kx_http::RetryPolicy;
use kx_ratelimit::RateLimitError;
use kx_ratelimit::Tier;
use kx_ws::DEFAULT_HANDSHAKE_TIMEOUT;
use kx_ws::ReconnectConfig;
use kx_ws::StreamConfig;
use serde::Deserialize;

/// Contents of the application TOML file; every section and key is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub client: ClientSection,
    pub stream: StreamSection,
    pub log: LogSection,
}

/// `[client]`: REST pacing and retry
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientSection {
    /// Account tier level: 0, 2, 3 or 4
    pub tier: u8,
    pub retry_delay_ms: u64,
    pub budget_block_delay_ms: u64,
    pub max_attempts: Option<u32>,
    pub public_min_interval_ms: u64,
    pub base_url: Option<String>,
}

/// `[stream]`: websocket endpoint, reconnect schedule and default subscription
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamSection {
    pub url: Option<String>,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_retries: u32,
    pub handshake_timeout_ms: u64,
    pub pairs: Vec<String>,
    pub channel: String,
}

/// `[log]`: tracing output
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub dir: String,
    pub level: String,
    pub stdout: bool,
}

impl Default for ClientSection {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            tier: client.tier.level(),
            retry_delay_ms: client.retry.retry_delay.as_millis() as u64,
            budget_block_delay_ms: client.retry.budget_block_delay.as_millis() as u64,
            max_attempts: client.retry.max_attempts,
            public_min_interval_ms: client.public_min_interval.as_millis() as u64,
            base_url: None,
        }
    }
}

impl Default for StreamSection {
    fn default() -> Self {
        let reconnect = ReconnectConfig::default();
        Self {
            url: None,
            initial_delay_ms: reconnect.initial_delay.as_millis() as u64,
            max_delay_ms: reconnect.max_delay.as_millis() as u64,
            max_retries: reconnect.max_retries,
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT.as_millis() as u64,
            pairs: vec!["XBT/USD".to_string()],
            channel: "ticker".to_string(),
        }
    }
}

impl Default for LogSection {
    fn default() -> Self {
        Self { dir: "./logs".to_string(), level: "info".to_string(), stdout: true }
    }
}

impl ClientSection {
    pub fn client_config(&self) -> Result<ClientConfig, RateLimitError> {
        Ok(ClientConfig {
            tier: Tier::from_level(self.tier)?,
            retry: RetryPolicy {
                retry_delay: Duration::from_millis(self.retry_delay_ms),
                budget_block_delay: Duration::from_millis(self.budget_block_delay_ms),
                max_attempts: self.max_attempts,
            },
            public_min_interval: Duration::from_millis(self.public_min_interval_ms),
        })
    }

    pub fn http_config(&self) -> HttpClientConfig {
        let mut config = HttpClientConfig::default();
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        config
    }
}

impl StreamSection {
    pub fn stream_config(&self) -> StreamConfig {
        let mut config = StreamConfig::default();
        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        config.reconnect.initial_delay = Duration::from_millis(self.initial_delay_ms);
        config.reconnect.max_delay = Duration::from_millis(self.max_delay_ms);
        config.reconnect.max_retries = self.max_retries;
        config.handshake_timeout = Duration::from_millis(self.handshake_timeout_ms);
        config
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let config = Config::builder().add_source(File::from(path.as_ref())).build()?;

    config.try_deserialize()
}

/// Parse TOML text, mainly for embedded defaults and tests
pub fn parse_config(toml: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder().add_source(File::from_str(toml, FileFormat::Toml)).build()?;

    config.try_deserialize()
}

/// Load the config file, falling back to defaults
///
/// The load error is handed back instead of logged, so callers can report it
/// once tracing is initialised from the returned config.
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> (AppConfig, Option<ConfigError>) {
    match load_config(path) {
        Ok(config) => (config, None),
        Err(err) => (AppConfig::default(), Some(err)),
    }
}
