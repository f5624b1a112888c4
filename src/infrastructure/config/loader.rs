use super::app_config::AppConfig;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Resolves and reads the TOML configuration file.
pub struct ConfigLoader {
    default_path: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader that falls back to the platform config directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_path: AppConfig::default_config_path(),
        }
    }

    /// Creates a loader with a specific fallback path (useful for testing).
    #[must_use]
    pub fn with_default_path(path: Option<PathBuf>) -> Self {
        Self { default_path: path }
    }

    /// Loads the configuration.
    ///
    /// An explicit path must exist. The default path is optional and
    /// yields `AppConfig::default()` when absent.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an explicit file is missing, or any file
    /// cannot be read or parsed.
    pub fn load(&self, explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            return Self::read(path);
        }

        match &self.default_path {
            Some(path) if path.exists() => Self::read(path),
            Some(path) => {
                debug!(path = %path.display(), "No config file, using defaults");
                Ok(AppConfig::default())
            }
            None => Ok(AppConfig::default()),
        }
    }

    fn read(path: &Path) -> Result<AppConfig, ConfigError> {
        let content = fs::read_to_string(path)?;
        let mut config: AppConfig = toml::from_str(&content)?;
        config.config = Some(path.to_path_buf());
        info!(path = %path.display(), "Loaded config file");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_default_path_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_default_path(Some(temp_dir.path().join("config.toml")));

        let config = loader.load(None).unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.config.is_none());
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_default_path(None);

        let result = loader.load(Some(&temp_dir.path().join("nope.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_reads_explicit_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fillproxy.toml");
        fs::write(&path, "port = 9100\nname = \"edge\"\n").unwrap();
        let loader = ConfigLoader::with_default_path(None);

        let config = loader.load(Some(&path)).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.name, "edge");
        assert_eq!(config.config.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_reads_default_file_when_present() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "cache_size = 7\n").unwrap();
        let loader = ConfigLoader::with_default_path(Some(path));

        assert_eq!(loader.load(None).unwrap().cache_size, 7);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "port = \"not a number\"\n").unwrap();
        let loader = ConfigLoader::with_default_path(Some(path));

        assert!(matches!(loader.load(None), Err(ConfigError::TomlDe(_))));
    }
}
