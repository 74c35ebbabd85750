use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::domain::{EntityTag, SortField, SortOrder};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub api: ApiConfig,

    pub catalog: CatalogConfig,

    pub cache: CacheConfig,

    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,

    /// "text" or "json"
    pub log_format: String,

    /// Number of tokio worker threads (default: 1)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    #[serde(default)]
    pub suppress_connection_errors: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            worker_threads: 1,
            suppress_connection_errors: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,

    /// Request timeout in seconds (default: 30)
    pub request_timeout_seconds: u64,

    /// Accept self-signed certificates, for development backends on https://localhost
    pub accept_invalid_certs: bool,

    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:7290/api".to_string(),
            request_timeout_seconds: 30,
            accept_invalid_certs: false,
            user_agent: "Libris/1.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Entity tag of the listing; keys of different entities never collide.
    pub entity: String,

    pub page_sizes: Vec<u32>,

    pub default_page_size: u32,

    pub default_sort_field: SortField,

    pub default_sort_order: SortOrder,
}

impl CatalogConfig {
    #[must_use]
    pub fn entity_tag(&self) -> EntityTag {
        EntityTag::new(self.entity.clone())
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            entity: "books".to_string(),
            page_sizes: vec![3, 6, 9],
            default_page_size: 3,
            default_sort_field: SortField::Id,
            default_sort_order: SortOrder::Ascending,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Upper bound on cached keys (default: 0 = unbounded)
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Event bus buffer size (default: 100)
    pub event_bus_buffer_size: usize,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            event_bus_buffer_size: 100,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("libris").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".libris").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.general.log_format.as_str(), "text" | "json") {
            anyhow::bail!(
                "Unknown log format '{}', expected text or json",
                self.general.log_format
            );
        }

        url::Url::parse(&self.api.base_url)
            .with_context(|| format!("Invalid API base URL: {}", self.api.base_url))?;

        if self.api.request_timeout_seconds == 0 {
            anyhow::bail!("API request timeout must be > 0");
        }

        if self.catalog.entity.trim().is_empty() {
            anyhow::bail!("Catalog entity cannot be empty");
        }

        if self.catalog.page_sizes.is_empty() {
            anyhow::bail!("At least one page size must be configured");
        }

        if self.catalog.page_sizes.contains(&0) {
            anyhow::bail!("Page sizes must be > 0");
        }

        if !self
            .catalog
            .page_sizes
            .contains(&self.catalog.default_page_size)
        {
            anyhow::bail!(
                "Default page size {} is not one of {:?}",
                self.catalog.default_page_size,
                self.catalog.page_sizes
            );
        }

        if self.notifications.event_bus_buffer_size == 0 {
            anyhow::bail!("Event bus buffer size must be > 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "https://localhost:7290/api");
        assert_eq!(config.catalog.page_sizes, vec![3, 6, 9]);
        assert_eq!(config.catalog.default_page_size, 3);
        assert_eq!(config.catalog.default_sort_field, SortField::Id);
        assert_eq!(config.cache.max_entries, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[api]"));
        assert!(toml_str.contains("[catalog]"));
        assert!(toml_str.contains("default_sort_order = \"asc\""));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [catalog]
            page_sizes = [5, 10]
            default_page_size = 10
            default_sort_field = "title"
            default_sort_order = "desc"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.catalog.default_page_size, 10);
        assert_eq!(config.catalog.default_sort_field, SortField::Title);
        assert_eq!(config.catalog.default_sort_order, SortOrder::Descending);

        assert_eq!(config.api.request_timeout_seconds, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_sort_field_is_rejected() {
        let toml_str = r#"
            [catalog]
            default_sort_field = "isbn"
        "#;
        assert!(toml::from_str::<Config>(toml_str).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.catalog.default_page_size = 4;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.catalog.page_sizes = vec![];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.api.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.general.log_format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = std::env::temp_dir().join(format!("libris-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.toml");

        let mut config = Config::default();
        config.cache.max_entries = 64;
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.cache.max_entries, 64);

        std::fs::remove_dir_all(dir).unwrap();
    }
}
