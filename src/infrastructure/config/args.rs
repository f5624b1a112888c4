use super::app_config::{LogLevel, ResizeFilter};
use clap::Parser;
use std::path::PathBuf;

/// Command line arguments; each flag falls back to an environment variable.
#[derive(Debug, Default, Parser)]
#[command(
    name = "fillproxy",
    version,
    about = "An image-resizing reverse proxy with a bounded LRU cache",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH", env = "FILLPROXY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Service name, used in logs.
    #[arg(long, env = "NAME")]
    pub name: Option<String>,

    /// Listen address.
    #[arg(long, env = "FILLPROXY_HOST")]
    pub host: Option<String>,

    /// Listen port.
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Maximum number of cached entries. Zero disables caching.
    #[arg(long, env = "CACHE_SIZE")]
    pub cache_size: Option<usize>,

    /// Directory for resized artifacts.
    #[arg(long, value_name = "PATH", env = "IMAGE_DIR")]
    pub image_dir: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum, env = "LOG_LEVEL", ignore_case = true)]
    pub log_level: Option<LogLevel>,

    /// Log file path.
    #[arg(long, value_name = "PATH", env = "LOG_PATH")]
    pub log_path: Option<PathBuf>,

    /// Deadline for a single resize request, in seconds.
    #[arg(long, value_name = "SECS", env = "REQUEST_TIMEOUT")]
    pub request_timeout: Option<u64>,

    /// Upstream fetch timeout, in seconds.
    #[arg(long, value_name = "SECS", env = "FETCH_TIMEOUT")]
    pub fetch_timeout: Option<u64>,

    /// Upstream fetches allowed at once.
    #[arg(long, env = "MAX_CONCURRENT_FETCHES")]
    pub max_concurrent_fetches: Option<usize>,

    /// Resampling filter.
    #[arg(long, value_enum, env = "RESIZE_FILTER")]
    pub filter: Option<ResizeFilter>,

    /// JPEG output quality, 1 to 100.
    #[arg(long, env = "JPEG_QUALITY")]
    pub jpeg_quality: Option<u8>,
}
