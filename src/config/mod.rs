use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_backend_url() -> String {
    "http://127.0.0.1:5005".to_string()
}

/// Local settings of the panel itself (the backend keeps its own config).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the bot-manager backend.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Show desktop notifications for task control and save results
    #[serde(default)]
    pub notifications: bool,

    /// Path to the backend's config.json, for the initial read. The backend
    /// exposes no read endpoint; writes always go through /save_config.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_config_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            notifications: false,
            backend_config_path: None,
        }
    }
}

impl AppConfig {
    /// Get the config file path
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("kendali");

        if let Err(e) = std::fs::create_dir_all(&config_dir) {
            tracing::warn!("Could not create config directory: {}", e);
        }

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from file, or create default
    pub fn load() -> Result<Self> {
        let path = match Self::config_path() {
            Ok(p) => p,
            Err(_) => return Ok(AppConfig::default()),
        };

        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return Ok(config),
                    Err(e) => tracing::warn!("Failed to parse config: {}", e),
                },
                Err(e) => tracing::warn!("Failed to read config: {}", e),
            }
        }

        let config = AppConfig::default();
        let _ = config.save();
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serialization() {
        let config = AppConfig {
            backend_url: "http://10.0.0.2:5005".to_string(),
            notifications: true,
            backend_config_path: Some(PathBuf::from("/srv/bot/config.json")),
        };

        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&serialized).unwrap();

        assert_eq!(config.backend_url, deserialized.backend_url);
        assert_eq!(config.notifications, deserialized.notifications);
        assert_eq!(config.backend_config_path, deserialized.backend_config_path);
    }

    #[test]
    fn test_empty_file_falls_back_to_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.backend_url, "http://127.0.0.1:5005");
        assert!(!config.notifications);
    }
}
