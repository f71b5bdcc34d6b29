use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

pub const URL_ENV: &str = "BETTERSPACE_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    /// Username of the administrator account every admin conversation goes through.
    pub admin_username: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            admin_username: "admin".to_string(),
        }
    }
}

impl AppConfig {
    fn toml_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        Some(base.config_dir().join("betterspace.toml"))
    }

    /// Reads the user's config file, then applies `BETTERSPACE_URL`.
    /// Never fails; anything unreadable falls back to defaults.
    pub fn load() -> Self {
        let from_file = match Self::toml_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        };
        from_file.with_url_override(std::env::var(URL_ENV).ok())
    }

    pub fn load_from(path: &Path) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(_) => {
                info!("no config at {}, using defaults", path.display());
                return Self::default();
            }
        };
        match toml::from_str::<AppConfig>(&text) {
            Ok(config) => config,
            Err(e) => {
                warn!("ignoring malformed config {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn with_url_override(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.base_url = crate::utils::normalize_url(&url);
        }
        self
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::toml_path().ok_or_else(|| ClientError::Config("no config dir".into()))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ClientError::Config(e.to_string()))?;
        }
        let toml = toml::to_string_pretty(self).map_err(|e| ClientError::Config(e.to_string()))?;
        fs::write(path, toml).map_err(|e| ClientError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.toml"));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("betterspace.toml");
        fs::write(&path, "base_url = \"http://10.0.0.2:8000\"\n").unwrap();
        let config = AppConfig::load_from(&path);
        assert_eq!(config.base_url, "http://10.0.0.2:8000");
        assert_eq!(config.admin_username, "admin");
    }

    #[test]
    fn malformed_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("betterspace.toml");
        fs::write(&path, "base_url = [").unwrap();
        assert_eq!(AppConfig::load_from(&path), AppConfig::default());
    }

    #[test]
    fn saved_config_is_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("betterspace.toml");
        let config = AppConfig {
            base_url: "https://counsel.example.org".into(),
            admin_username: "root".into(),
        };
        config.save_to(&path).unwrap();
        assert_eq!(AppConfig::load_from(&path), config);
    }

    #[test]
    fn url_override_is_normalized() {
        let config = AppConfig::default().with_url_override(Some("localhost:9000".into()));
        assert_eq!(config.base_url, "http://localhost:9000");
        let untouched = AppConfig::default().with_url_override(Some("  ".into()));
        assert_eq!(untouched, AppConfig::default());
    }
}
