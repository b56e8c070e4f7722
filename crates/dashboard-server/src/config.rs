use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use dashboard_controller::ControllerOptions;
use dashboard_core::SchemaDescriptor;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// Organization HTTP facade
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Controller validations
        if self.controller.name.trim().is_empty() {
            return Err("controller.name must not be empty".into());
        }
        if self.controller.workers == 0 {
            return Err("controller.workers must be > 0".into());
        }
        if self.controller.cache_sync_timeout_ms == 0
            || self.controller.schema_timeout_ms == 0
            || self.controller.schema_poll_interval_ms == 0
        {
            return Err("controller timeouts must be > 0".into());
        }
        if self.controller.backoff_base_ms == 0 {
            return Err("controller.backoff_base_ms must be > 0".into());
        }
        if self.controller.backoff_base_ms > self.controller.backoff_max_ms {
            return Err("controller.backoff_base_ms must be <= controller.backoff_max_ms".into());
        }
        // Store validations
        if self.store.request_timeout_ms == 0 {
            return Err("store.request_timeout_ms must be > 0".into());
        }
        if self.store.event_log_capacity == 0 {
            return Err("store.event_log_capacity must be > 0".into());
        }
        // API validations
        if self.api.enabled && self.api.port == 0 {
            return Err("api.port must be > 0".into());
        }
        if self.api.enabled && self.api.host.parse::<IpAddr>().is_err() {
            return Err(format!(
                "api.host must be an IP address, got \"{}\"",
                self.api.host
            ));
        }
        if self.api.enabled && self.api.subject_header.trim().is_empty() {
            return Err("api.subject_header must not be empty".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    /// Listen address. Only meaningful after [`AppConfig::validate`] passed.
    pub fn addr(&self) -> SocketAddr {
        let host: IpAddr = self
            .api
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.api.port))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.store.request_timeout_ms)
    }

    /// Engine options for the project controller.
    pub fn controller_options(&self) -> ControllerOptions {
        let c = &self.controller;
        ControllerOptions {
            workers: c.workers,
            max_retries: c.max_retries,
            install_schemas: c.install_schemas,
            schemas: vec![SchemaDescriptor::project()],
            schema_timeout: Duration::from_millis(c.schema_timeout_ms),
            schema_poll_interval: Duration::from_millis(c.schema_poll_interval_ms),
            cache_sync_timeout: Duration::from_millis(c.cache_sync_timeout_ms),
            backoff_base: Duration::from_millis(c.backoff_base_ms),
            backoff_max: Duration::from_millis(c.backoff_max_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Written to `app.kubernetes.io/managed-by` on every derived object.
    #[serde(default = "default_controller_name")]
    pub name: String,
    /// `true`: register the schemas then wait for them. `false`: wait only.
    #[serde(default = "default_true")]
    pub install_schemas: bool,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_cache_sync_timeout_ms")]
    pub cache_sync_timeout_ms: u64,
    #[serde(default = "default_schema_timeout_ms")]
    pub schema_timeout_ms: u64,
    #[serde(default = "default_schema_poll_interval_ms")]
    pub schema_poll_interval_ms: u64,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            name: default_controller_name(),
            install_schemas: true,
            workers: default_workers(),
            max_retries: default_max_retries(),
            cache_sync_timeout_ms: default_cache_sync_timeout_ms(),
            schema_timeout_ms: default_schema_timeout_ms(),
            schema_poll_interval_ms: default_schema_poll_interval_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

fn default_controller_name() -> String {
    "project-controller.dashboard.presslabs.com".to_string()
}
fn default_true() -> bool {
    true
}
fn default_workers() -> usize {
    4
}
fn default_max_retries() -> u32 {
    5
}
fn default_cache_sync_timeout_ms() -> u64 {
    30_000
}
fn default_schema_timeout_ms() -> u64 {
    60_000
}
fn default_schema_poll_interval_ms() -> u64 {
    250
}
fn default_backoff_base_ms() -> u64 {
    5
}
fn default_backoff_max_ms() -> u64 {
    1_000_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Deadline applied to every store call.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Watch events retained for resuming watches.
    #[serde(default = "default_event_log_capacity")]
    pub event_log_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            event_log_capacity: default_event_log_capacity(),
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_event_log_capacity() -> usize {
    dashboard_db_memory::DEFAULT_EVENT_LOG_CAPACITY
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Header carrying the caller's opaque subject.
    #[serde(default = "default_subject_header")]
    pub subject_header: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
            subject_header: default_subject_header(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_subject_header() -> String {
    "x-dashboard-subject".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default file looked up when no path is given.
    pub const DEFAULT_CONFIG_PATH: &str = "dashboard.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        let mut builder = Config::builder();
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., DASHBOARD__CONTROLLER__WORKERS=8
        builder = builder.add_source(
            Environment::with_prefix("DASHBOARD")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
