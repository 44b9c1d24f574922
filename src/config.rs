use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use directories::ProjectDirs;
use oc_auth::config::DEFAULT_BASE_URL;
use oc_auth::{ClientConfig, FileStore, HttpTimeouts};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Settings read from `config.toml` in the platform config directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub storage_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "orchid-client")
            .context("Project directories are unavailable")?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Load `path`, falling back to defaults when the file does not exist
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            debug!("No config file at {}", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Build the client config; `base_url_override` wins over the file
    pub fn client_config(&self, base_url_override: Option<&str>) -> anyhow::Result<ClientConfig> {
        let base_url = base_url_override
            .or(self.base_url.as_deref())
            .unwrap_or(DEFAULT_BASE_URL);

        let defaults = HttpTimeouts::default();
        let timeouts = HttpTimeouts {
            connect: self
                .connect_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect),
            request: self
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request),
        };

        Ok(ClientConfig::from_base_url(base_url)
            .with_context(|| format!("Invalid base URL '{}'", base_url))?
            .with_timeouts(timeouts))
    }

    pub fn storage_dir(&self) -> anyhow::Result<PathBuf> {
        match &self.storage_dir {
            Some(dir) => Ok(dir.clone()),
            None => FileStore::default_storage_dir().context("No storage directory available"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("config.toml")).await.unwrap();
        assert_eq!(config, AppConfig::default());

        let client = config.client_config(None).unwrap();
        assert_eq!(client.base_url.as_str(), "http://127.0.0.1:5000/");
        assert_eq!(client.http_timeouts.request, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_file_values_and_override() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "base_url = \"https://orchids.example.org\"\nrequest_timeout_secs = 3\n",
        )
        .unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        let client = config.client_config(None).unwrap();
        assert_eq!(client.base_url.as_str(), "https://orchids.example.org/");
        assert_eq!(client.http_timeouts.request, Duration::from_secs(3));

        let client = config.client_config(Some("http://localhost:9000")).unwrap();
        assert_eq!(client.base_url.as_str(), "http://localhost:9000/");
    }

    #[tokio::test]
    async fn test_invalid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "base_url = {{{").unwrap();
        assert!(AppConfig::load(&path).await.is_err());
    }
}
