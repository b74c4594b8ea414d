//! Application configuration management
//!
//! Values are layered: built-in defaults, then an optional JSON file, then
//! `OYV_`-prefixed environment variables (`OYV_SERVER__PORT=9000`).

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "OYV_CONFIG";

/// Main application configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub tools: ToolsConfig,
    pub client: ClientConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origin allowed by CORS, normally the UI dev server
    pub cors_origin: String,
}

/// On-disk locations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for relative paths below
    pub data_dir: PathBuf,
    pub database_file: PathBuf,
    /// Initial value of the `download_directory` setting
    pub download_dir: PathBuf,
    pub cookies_file: PathBuf,
}

/// External tool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    pub yt_dlp_path: String,
    pub ffmpeg_path: String,
    /// `--playlist-end` used when listing a channel
    pub channel_fetch_limit: u32,
}

/// Settings used by the client library and the `oyv` binary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub poll_interval_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_origin: "http://localhost:3000".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            database_file: PathBuf::from("youtube_viewer.db"),
            download_dir: PathBuf::from("downloads"),
            cookies_file: PathBuf::from("cookies.txt"),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            channel_fetch_limit: 30,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            poll_interval_ms: 1000,
            request_timeout_secs: 30,
        }
    }
}

impl StorageConfig {
    /// Resolve `path` against `data_dir` unless it is already absolute.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.resolve(&self.database_file)
    }

    pub fn cookies_path(&self) -> PathBuf {
        self.resolve(&self.cookies_file)
    }
}

impl AppConfig {
    /// Load configuration from the default file location plus environment overrides
    pub fn load() -> Result<Self> {
        let path = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => PathBuf::from(path),
            None => Self::get_config_path()?,
        };
        Self::load_from(&path)
    }

    /// Load configuration from `path` (missing files are fine) plus environment overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        let settings = Config::builder()
            .add_source(
                File::from(path.to_path_buf())
                    .format(FileFormat::Json)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix("OYV")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration: {:?}", path))?;

        let config: AppConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to parse configuration")?;

        config.validate()?;

        if path.exists() {
            tracing::info!("Loaded configuration from: {:?}", path);
        } else {
            tracing::debug!("No configuration file at {:?}, using defaults", path);
        }
        Ok(config)
    }

    /// Save configuration to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        tracing::info!("Saved configuration to: {:?}", path);
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn get_config_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("com", "offline-yt-viewer", "oyv")
            .with_context(|| "Failed to get project directories")?;

        Ok(project_dirs.config_dir().join("config.json"))
    }

    /// Address the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            anyhow::bail!("Server host must not be empty");
        }

        if self.storage.database_file.as_os_str().is_empty() {
            anyhow::bail!("Database file must not be empty");
        }

        if self.tools.yt_dlp_path.trim().is_empty() {
            anyhow::bail!("yt-dlp path must not be empty");
        }

        if self.tools.channel_fetch_limit == 0 || self.tools.channel_fetch_limit > 500 {
            anyhow::bail!("Channel fetch limit should be between 1 and 500");
        }

        if url::Url::parse(&self.client.base_url).is_err() {
            anyhow::bail!("Invalid client base URL: {}", self.client.base_url);
        }

        if self.client.poll_interval_ms < 50 || self.client.poll_interval_ms > 60_000 {
            anyhow::bail!("Poll interval should be between 50ms and 60s");
        }

        if self.client.request_timeout_secs == 0 {
            anyhow::bail!("Request timeout must be greater than 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_address(), "127.0.0.1:8000");
        assert_eq!(config.client.poll_interval_ms, 1000);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.server.port = 9123;
        config.tools.channel_fetch_limit = 50;
        config.save(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.server.port, 9123);
        assert_eq!(loaded.tools.channel_fetch_limit, 50);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "storage": { "data_dir": "/srv/oyv" } }"#).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.storage.data_dir, PathBuf::from("/srv/oyv"));
        assert_eq!(loaded.storage.database_file, PathBuf::from("youtube_viewer.db"));
        assert_eq!(loaded.server, ServerConfig::default());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let loaded = AppConfig::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded.tools, ToolsConfig::default());
    }

    #[test]
    fn test_invalid_config_validation() {
        let mut config = AppConfig::default();
        config.tools.channel_fetch_limit = 0;
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.client.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.client.poll_interval_ms = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_storage_paths_resolve_against_data_dir() {
        let storage = StorageConfig {
            data_dir: PathBuf::from("/var/lib/oyv"),
            ..Default::default()
        };
        assert_eq!(
            storage.database_path(),
            PathBuf::from("/var/lib/oyv/youtube_viewer.db")
        );
        assert_eq!(storage.resolve("/abs/dl"), PathBuf::from("/abs/dl"));
    }
}
