//! Configuration loading and typed config structures.
//!
//! The configuration lives in `housecup-config.yaml` next to the binary's
//! working directory. Every field has a default, so a missing file or a
//! partial file is valid. Environment variables override connection
//! settings after parsing.

use std::path::Path;
use std::time::Duration;

use chrono::TimeDelta;
use serde::Deserialize;

use crate::scoreboard::LedgerLimits;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HouseCupConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Ledger store selection.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Validation bounds for entries and listings.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Synthetic entry generator.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Live fan-out buffers.
    #[serde(default)]
    pub hub: HubConfig,

    /// Old-entry cleanup.
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Logging output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl HouseCupConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `DATABASE_URL` overrides `storage.database_url`
    /// - `HOUSECUP_HOST` overrides `http.host`
    /// - `PORT` overrides `http.port`
    /// - `CLIENT_URL` overrides `http.client_url`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string, without env overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply environment variable overrides in place.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.storage.database_url = Some(url);
        }
        if let Ok(host) = std::env::var("HOUSECUP_HOST") {
            self.http.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            match port.parse() {
                Ok(port) => self.http.port = port,
                Err(e) => tracing::warn!(%port, error = %e, "Ignoring invalid PORT override"),
            }
        }
        if let Ok(origin) = std::env::var("CLIENT_URL") {
            self.http.client_url = Some(origin);
        }
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HttpConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origin. `None` allows any origin.
    #[serde(default)]
    pub client_url: Option<String>,

    /// Per-client request limit on `/api` routes.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            client_url: None,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Fixed-window request limit applied per client IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimitConfig {
    /// Apply the limit at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Requests allowed per client in one window.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length in minutes.
    #[serde(default = "default_rate_window_minutes")]
    pub window_minutes: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: default_max_requests(),
            window_minutes: default_rate_window_minutes(),
        }
    }
}

impl RateLimitConfig {
    /// Window length as a [`Duration`].
    pub fn window(&self) -> Duration {
        minutes(self.window_minutes)
    }
}

const fn default_max_requests() -> u32 {
    100
}

const fn default_rate_window_minutes() -> u32 {
    15
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    3001
}

/// Ledger store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// `PostgreSQL` URL. When absent, the in-memory store is used.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Maximum pool connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: default_max_connections(),
        }
    }
}

const fn default_max_connections() -> u32 {
    10
}

/// Entry and listing bounds enforced at the core boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LedgerConfig {
    /// Largest accepted absolute point delta.
    #[serde(default = "default_max_abs_points")]
    pub max_abs_points: i64,

    /// Recent-activity length when the caller gives none.
    #[serde(default = "default_activity_limit")]
    pub default_activity_limit: u32,

    /// Upper clamp for recent-activity length.
    #[serde(default = "default_max_activity_limit")]
    pub max_activity_limit: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_abs_points: default_max_abs_points(),
            default_activity_limit: default_activity_limit(),
            max_activity_limit: default_max_activity_limit(),
        }
    }
}

impl LedgerConfig {
    /// Convert into the limits consumed by the scoreboard.
    pub const fn limits(&self) -> LedgerLimits {
        LedgerLimits {
            max_abs_points: self.max_abs_points,
            default_activity_limit: self.default_activity_limit,
            max_activity_limit: self.max_activity_limit,
        }
    }
}

const fn default_max_abs_points() -> i64 {
    100
}

const fn default_activity_limit() -> u32 {
    10
}

const fn default_max_activity_limit() -> u32 {
    100
}

/// Synthetic generator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GeneratorConfig {
    /// Start the recurring generator at boot.
    #[serde(default = "default_true")]
    pub autostart: bool,

    /// Seconds to wait after the listener is up before autostarting.
    #[serde(default = "default_autostart_delay_secs")]
    pub autostart_delay_secs: u64,

    /// Period of the recurring generator in minutes.
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,

    /// Delay between bulk generations in milliseconds.
    #[serde(default = "default_bulk_pacing_ms")]
    pub bulk_pacing_ms: u64,

    /// Bulk size when the caller gives none.
    #[serde(default = "default_bulk_count")]
    pub default_bulk_count: u32,

    /// Largest accepted bulk size.
    #[serde(default = "default_max_bulk_count")]
    pub max_bulk_count: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            autostart: true,
            autostart_delay_secs: default_autostart_delay_secs(),
            interval_minutes: default_interval_minutes(),
            bulk_pacing_ms: default_bulk_pacing_ms(),
            default_bulk_count: default_bulk_count(),
            max_bulk_count: default_max_bulk_count(),
        }
    }
}

impl GeneratorConfig {
    /// Recurring period as a [`Duration`].
    pub fn interval(&self) -> Duration {
        minutes(self.interval_minutes)
    }

    /// Bulk pacing as a [`Duration`].
    pub const fn bulk_pacing(&self) -> Duration {
        Duration::from_millis(self.bulk_pacing_ms)
    }

    /// Autostart delay as a [`Duration`].
    pub const fn autostart_delay(&self) -> Duration {
        Duration::from_secs(self.autostart_delay_secs)
    }
}

const fn default_true() -> bool {
    true
}

const fn default_autostart_delay_secs() -> u64 {
    2
}

const fn default_interval_minutes() -> u32 {
    2
}

const fn default_bulk_pacing_ms() -> u64 {
    100
}

const fn default_bulk_count() -> u32 {
    10
}

const fn default_max_bulk_count() -> u32 {
    100
}

/// Live fan-out configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HubConfig {
    /// Per-subscriber queue depth. A full queue drops messages for that
    /// subscriber only.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,

    /// Capacity of the ledger change feed.
    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: default_subscriber_buffer(),
            feed_capacity: default_feed_capacity(),
        }
    }
}

const fn default_subscriber_buffer() -> usize {
    64
}

const fn default_feed_capacity() -> usize {
    256
}

/// Old-entry cleanup configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetentionConfig {
    /// Run the periodic sweeper.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Entries older than this many days are purged.
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,

    /// Minutes between sweeps.
    #[serde(default = "default_sweep_interval_minutes")]
    pub sweep_interval_minutes: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age_days: default_max_age_days(),
            sweep_interval_minutes: default_sweep_interval_minutes(),
        }
    }
}

impl RetentionConfig {
    /// Maximum entry age.
    pub fn max_age(&self) -> TimeDelta {
        TimeDelta::days(i64::from(self.max_age_days))
    }

    /// Time between sweeps.
    pub fn sweep_interval(&self) -> Duration {
        minutes(self.sweep_interval_minutes)
    }
}

const fn default_max_age_days() -> u32 {
    30
}

const fn default_sweep_interval_minutes() -> u32 {
    60
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    String::from("info")
}

fn minutes(n: u32) -> Duration {
    Duration::from_secs(u64::from(n).saturating_mul(60))
}
