//! Layered monitor configuration: defaults, optional file, `HOAXGUARD_*` environment.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::timing::IDLE_ELAPSED_PLACEHOLDER;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),
    #[error("api_base_url must start with http:// or https://, got {0:?}")]
    BaseUrl(String),
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MonitorConfig {
    pub api_base_url: String,
    pub poll_interval_ms: u64,
    pub tick_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub health_port: u16,
    pub log_level: String,
    pub idle_elapsed_placeholder: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            request_timeout_ms: 10_000,
            health_port: 9095,
            log_level: "info".into(),
            idle_elapsed_placeholder: IDLE_ELAPSED_PLACEHOLDER.into(),
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration { Duration::from_millis(self.poll_interval_ms) }
    pub fn tick_interval(&self) -> Duration { Duration::from_millis(self.tick_interval_ms) }
    pub fn request_timeout(&self) -> Duration { Duration::from_millis(self.request_timeout_ms) }

    /// Normalize and check values that deserialization alone cannot.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.api_base_url = self.api_base_url.trim().trim_end_matches('/').to_string();
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
            return Err(ConfigError::BaseUrl(self.api_base_url));
        }
        if self.poll_interval_ms == 0 { return Err(ConfigError::ZeroInterval("poll_interval_ms")); }
        if self.tick_interval_ms == 0 { return Err(ConfigError::ZeroInterval("tick_interval_ms")); }
        if self.request_timeout_ms == 0 { return Err(ConfigError::ZeroInterval("request_timeout_ms")); }
        Ok(self)
    }
}

fn builder_with_defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    let d = MonitorConfig::default();
    Ok(config::Config::builder()
        .set_default("api_base_url", d.api_base_url)?
        .set_default("poll_interval_ms", d.poll_interval_ms)?
        .set_default("tick_interval_ms", d.tick_interval_ms)?
        .set_default("request_timeout_ms", d.request_timeout_ms)?
        .set_default("health_port", d.health_port as u64)?
        .set_default("log_level", d.log_level)?
        .set_default("idle_elapsed_placeholder", d.idle_elapsed_placeholder)?)
}

/// Load from the file named by `HOAXGUARD_CONFIG_FILE` (if any) and `HOAXGUARD_*` variables.
pub fn load_config() -> Result<MonitorConfig, ConfigError> {
    let mut builder = builder_with_defaults()?;
    if let Ok(file) = std::env::var("HOAXGUARD_CONFIG_FILE") {
        builder = builder.add_source(config::File::with_name(&file).required(false));
    }
    builder = builder.add_source(
        config::Environment::with_prefix("HOAXGUARD")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );
    let cfg: MonitorConfig = builder.build()?.try_deserialize()?;
    cfg.validated()
}

/// Parse a configuration document (YAML) layered over the defaults.
pub fn from_yaml_str(text: &str) -> Result<MonitorConfig, ConfigError> {
    let cfg: MonitorConfig = builder_with_defaults()?
        .add_source(config::File::from_str(text, config::FileFormat::Yaml))
        .build()?
        .try_deserialize()?;
    cfg.validated()
}
