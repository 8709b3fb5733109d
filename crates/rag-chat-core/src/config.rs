use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const HOST_URL_ENV: &str = "LANGFLOW_HOST_URL";
pub const FLOW_ID_ENV: &str = "LANGFLOW_FLOW_ID";
pub const API_KEY_ENV: &str = "LANGFLOW_API_KEY";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing {0}: set it in the config file, the environment, or on the command line")]
    Missing(&'static str),
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub host_url: Option<String>,
    pub flow_id: Option<String>,
    pub api_key: Option<String>,
    pub reply_char_delay_ms: Option<u64>,
    pub particle_count: Option<usize>,
    pub link_distance: Option<f64>,
}

/// Connection settings that every flow run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSettings {
    pub host_url: String,
    pub flow_id: String,
    pub api_key: String,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Fill connection fields from the environment. `VITE_`-prefixed names
    /// from web deployments are accepted as a fallback.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let read = |key: &str| {
            lookup(key)
                .or_else(|| lookup(&format!("VITE_{}", key)))
                .filter(|value| !value.trim().is_empty())
        };

        if let Some(host_url) = read(HOST_URL_ENV) {
            self.host_url = Some(host_url);
        }
        if let Some(flow_id) = read(FLOW_ID_ENV) {
            self.flow_id = Some(flow_id);
        }
        if let Some(api_key) = read(API_KEY_ENV) {
            self.api_key = Some(api_key);
        }
    }

    pub fn flow_settings(&self) -> Result<FlowSettings, ConfigError> {
        fn required(value: &Option<String>, name: &'static str) -> Result<String, ConfigError> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or(ConfigError::Missing(name))
        }

        Ok(FlowSettings {
            host_url: required(&self.host_url, "host URL")?,
            flow_id: required(&self.flow_id, "flow id")?,
            api_key: required(&self.api_key, "API key")?,
        })
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("rag-chat").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn complete() -> Config {
        Config {
            host_url: Some("http://localhost:7860".to_string()),
            flow_id: Some("flow".to_string()),
            api_key: Some("key".to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = complete();
        config.particle_count = Some(40);

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"flow_id": "abc"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.flow_id.as_deref(), Some("abc"));
        assert_eq!(config.host_url, None);
    }

    #[test]
    fn test_env_overrides_and_vite_fallback() {
        let env: HashMap<&str, &str> = [
            ("LANGFLOW_HOST_URL", "http://env:7860"),
            ("VITE_LANGFLOW_FLOW_ID", "vite-flow"),
            ("LANGFLOW_API_KEY", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = complete();
        config.apply_env_with(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.host_url.as_deref(), Some("http://env:7860"));
        assert_eq!(config.flow_id.as_deref(), Some("vite-flow"));
        // Blank values do not clobber configured ones
        assert_eq!(config.api_key.as_deref(), Some("key"));
    }

    #[test]
    fn test_flow_settings_requires_all_fields() {
        assert!(complete().flow_settings().is_ok());

        let mut config = complete();
        config.api_key = Some(String::new());
        assert_eq!(config.flow_settings(), Err(ConfigError::Missing("API key")));

        config.host_url = None;
        assert_eq!(config.flow_settings(), Err(ConfigError::Missing("host URL")));
    }
}
