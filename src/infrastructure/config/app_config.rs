//! Application configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::args::CliArgs;
use super::loader::ConfigError;

const APP_NAME: &str = "fillproxy";
const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "linuxmobile";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Converts to tracing level.
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Resampling filter used when resizing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeFilter {
    /// Nearest neighbour.
    Nearest,
    /// Linear.
    Triangle,
    /// Cubic.
    CatmullRom,
    /// Gaussian.
    Gaussian,
    /// Lanczos with window 3.
    #[default]
    Lanczos3,
}

impl ResizeFilter {
    /// Converts to the `image` crate filter.
    #[must_use]
    pub const fn to_filter_type(self) -> image::imageops::FilterType {
        use image::imageops::FilterType;
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Service name, used in logs.
    #[serde(default = "default_name")]
    pub name: String,

    /// Listen address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum number of entries in the cache index. Zero disables caching.
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    /// Directory for resized artifacts.
    #[serde(default)]
    pub image_dir: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path. Logs go to stdout when unset.
    #[serde(default)]
    pub log_path: Option<PathBuf>,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream fetch settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Resize settings.
    #[serde(default)]
    pub resize: ResizeConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Deadline for a single `/fill` request, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Time given to in-flight requests after a shutdown signal, in seconds.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl ServerConfig {
    /// Request deadline.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Shutdown grace window.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

/// Upstream fetch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Total timeout per upstream request, in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// Connect timeout, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle pooled connections kept per upstream host.
    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,

    /// Upstream fetches allowed at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Largest accepted source body, in bytes.
    #[serde(default = "default_max_source_bytes")]
    pub max_source_bytes: u64,
}

impl FetchConfig {
    /// Total upstream timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_idle_per_host: default_max_idle_per_host(),
            max_concurrent: default_max_concurrent(),
            max_source_bytes: default_max_source_bytes(),
        }
    }
}

/// Resize configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResizeConfig {
    /// Resampling filter.
    #[serde(default)]
    pub filter: ResizeFilter,

    /// JPEG quality, 1 to 100.
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Largest accepted width or height.
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            filter: ResizeFilter::default(),
            jpeg_quality: default_jpeg_quality(),
            max_dimension: default_max_dimension(),
        }
    }
}

fn default_name() -> String {
    APP_NAME.to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8080
}

const fn default_cache_size() -> usize {
    100
}

const fn default_request_timeout() -> u64 {
    30
}

const fn default_shutdown_grace() -> u64 {
    15
}

const fn default_fetch_timeout() -> u64 {
    10
}

const fn default_connect_timeout() -> u64 {
    5
}

const fn default_max_idle_per_host() -> usize {
    100
}

const fn default_max_concurrent() -> usize {
    100
}

const fn default_max_source_bytes() -> u64 {
    32 * 1024 * 1024
}

const fn default_jpeg_quality() -> u8 {
    75
}

const fn default_max_dimension() -> u32 {
    8192
}

impl AppConfig {
    /// Merges CLI arguments (and their environment fallbacks) into the configuration.
    pub fn merge_with_args(&mut self, args: CliArgs) {
        if let Some(config_path) = args.config {
            self.config = Some(config_path);
        }
        if let Some(name) = args.name {
            self.name = name;
        }
        if let Some(host) = args.host {
            self.host = host;
        }
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(cache_size) = args.cache_size {
            self.cache_size = cache_size;
        }
        if let Some(image_dir) = args.image_dir {
            self.image_dir = Some(image_dir);
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(log_path) = args.log_path {
            self.log_path = Some(log_path);
        }
        if let Some(timeout) = args.request_timeout {
            self.server.request_timeout_secs = timeout;
        }
        if let Some(timeout) = args.fetch_timeout {
            self.fetch.timeout_secs = timeout;
        }
        if let Some(max_concurrent) = args.max_concurrent_fetches {
            self.fetch.max_concurrent = max_concurrent;
        }
        if let Some(filter) = args.filter {
            self.resize.filter = filter;
        }
        if let Some(quality) = args.jpeg_quality {
            self.resize.jpeg_quality = quality;
        }
    }

    /// Rejects settings the service cannot run with.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.port == 0 {
            return invalid("port must be non-zero");
        }
        if self.host.trim().is_empty() {
            return invalid("host must not be empty");
        }
        if self.server.request_timeout_secs == 0 {
            return invalid("server.request_timeout_secs must be non-zero");
        }
        if self.fetch.timeout_secs == 0 || self.fetch.connect_timeout_secs == 0 {
            return invalid("fetch timeouts must be non-zero");
        }
        if self.fetch.max_concurrent == 0 {
            return invalid("fetch.max_concurrent must be non-zero");
        }
        if self.fetch.max_source_bytes == 0 {
            return invalid("fetch.max_source_bytes must be non-zero");
        }
        if !(1..=100).contains(&self.resize.jpeg_quality) {
            return invalid("resize.jpeg_quality must be between 1 and 100");
        }
        if self.resize.max_dimension == 0 {
            return invalid("resize.max_dimension must be non-zero");
        }
        Ok(())
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default config file path.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Returns default image directory.
    #[must_use]
    pub fn default_image_dir() -> PathBuf {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME).map_or_else(
            || std::env::temp_dir().join(APP_NAME).join("images"),
            |dirs| dirs.cache_dir().join("images"),
        )
    }

    /// Returns effective image directory.
    #[must_use]
    pub fn effective_image_dir(&self) -> PathBuf {
        self.image_dir.clone().unwrap_or_else(Self::default_image_dir)
    }

    /// Returns the `host:port` listen address.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config: None,
            name: default_name(),
            host: default_host(),
            port: default_port(),
            cache_size: default_cache_size(),
            image_dir: None,
            log_level: LogLevel::Info,
            log_path: None,
            server: ServerConfig::default(),
            fetch: FetchConfig::default(),
            resize: ResizeConfig::default(),
        }
    }
}
