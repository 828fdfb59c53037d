//! Controller configuration read from the environment

use anyhow::{bail, Context, Result};
use gateway_core::resources::{DEFAULT_API_KEY_SECRET, DEFAULT_LITELLM_IMAGE};
use gateway_core::ProxySettings;
use std::net::SocketAddr;
use std::time::Duration;

pub const ENV_LITELLM_IMAGE: &str = "GATEWAY_LITELLM_IMAGE";
pub const ENV_API_KEY_SECRET: &str = "GATEWAY_API_KEY_SECRET";
pub const ENV_LOG_FORMAT: &str = "GATEWAY_LOG_FORMAT";
pub const ENV_METRICS_ADDR: &str = "GATEWAY_METRICS_ADDR";
pub const ENV_RESYNC_SECONDS: &str = "GATEWAY_RESYNC_SECONDS";
pub const ENV_ERROR_REQUEUE_SECONDS: &str = "GATEWAY_ERROR_REQUEUE_SECONDS";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    pub proxy: ProxySettings,
    pub log_format: LogFormat,
    pub metrics_addr: SocketAddr,
    /// Requeue interval after a successful pass
    pub resync_interval: Duration,
    /// Requeue interval after a failed pass
    pub error_requeue: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            proxy: ProxySettings::default(),
            log_format: LogFormat::Text,
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            resync_interval: Duration::from_secs(300),
            error_requeue: Duration::from_secs(30),
        }
    }
}

impl ControllerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup; unset keys keep defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(image) = lookup(ENV_LITELLM_IMAGE).filter(|v| !v.is_empty()) {
            config.proxy.image = image;
        }
        if let Some(secret) = lookup(ENV_API_KEY_SECRET).filter(|v| !v.is_empty()) {
            config.proxy.api_key_secret = secret;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            config.log_format = match format.to_lowercase().as_str() {
                "text" | "" => LogFormat::Text,
                "json" => LogFormat::Json,
                other => bail!("{} must be 'text' or 'json', got '{}'", ENV_LOG_FORMAT, other),
            };
        }
        if let Some(addr) = lookup(ENV_METRICS_ADDR) {
            config.metrics_addr = addr
                .parse()
                .with_context(|| format!("{} is not a socket address: {}", ENV_METRICS_ADDR, addr))?;
        }
        if let Some(secs) = lookup(ENV_RESYNC_SECONDS) {
            config.resync_interval = parse_seconds(ENV_RESYNC_SECONDS, &secs)?;
        }
        if let Some(secs) = lookup(ENV_ERROR_REQUEUE_SECONDS) {
            config.error_requeue = parse_seconds(ENV_ERROR_REQUEUE_SECONDS, &secs)?;
        }

        Ok(config)
    }
}

fn parse_seconds(key: &str, value: &str) -> Result<Duration> {
    let secs: u64 = value
        .parse()
        .with_context(|| format!("{} must be a number of seconds, got '{}'", key, value))?;
    if secs == 0 {
        bail!("{} must be greater than zero", key);
    }
    Ok(Duration::from_secs(secs))
}
