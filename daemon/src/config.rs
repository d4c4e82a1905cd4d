//! Configuration loading and management

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::vision::{DEFAULT_ENDPOINT, DEFAULT_MODEL};

/// Hotkey used when none is configured
pub const DEFAULT_HOTKEY: &str = "Alt+Shift+S";

/// Daemon configuration
#[derive(Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Chord spec registered at startup
    pub hotkey: String,

    /// Vision service chat-completions endpoint
    pub vision_endpoint: String,

    /// Vision model name
    pub vision_model: String,

    /// API key for the vision service
    pub api_key: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("socket_path", &self.socket_path)
            .field("data_dir", &self.data_dir)
            .field("hotkey", &self.hotkey)
            .field("vision_endpoint", &self.vision_endpoint)
            .field("vision_model", &self.vision_model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let home = non_empty("HOME").context("HOME is not set")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("snaplytics");

        let socket_path = data_dir.join("snaplytics.sock");

        Ok(Self {
            socket_path,
            data_dir,
            hotkey: non_empty("SNAPLYTICS_HOTKEY").unwrap_or_else(|| DEFAULT_HOTKEY.to_string()),
            vision_endpoint: non_empty("SNAPLYTICS_API_URL")
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            vision_model: non_empty("SNAPLYTICS_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key: non_empty("OPENAI_API_KEY"),
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_config_defaults() {
        let config = load(&[("HOME", "/home/ada")]).unwrap();
        assert_eq!(
            config.socket_path,
            PathBuf::from("/home/ada/.local/share/snaplytics/snaplytics.sock")
        );
        assert_eq!(config.hotkey, DEFAULT_HOTKEY);
        assert_eq!(config.vision_model, DEFAULT_MODEL);
        assert_eq!(config.vision_endpoint, DEFAULT_ENDPOINT);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_config_overrides() {
        let config = load(&[
            ("HOME", "/home/ada"),
            ("SNAPLYTICS_HOTKEY", "Alt+Shift+D"),
            ("SNAPLYTICS_MODEL", "gpt-4o"),
            ("SNAPLYTICS_API_URL", "http://127.0.0.1:8080/v1/chat/completions"),
            ("OPENAI_API_KEY", "sk-test"),
        ])
        .unwrap();
        assert_eq!(config.hotkey, "Alt+Shift+D");
        assert_eq!(config.vision_model, "gpt-4o");
        assert_eq!(config.vision_endpoint, "http://127.0.0.1:8080/v1/chat/completions");
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert!(!format!("{config:?}").contains("sk-test"));
    }

    #[test]
    fn test_blank_values_fall_back() {
        let config = load(&[("HOME", "/root"), ("SNAPLYTICS_HOTKEY", "  "), ("OPENAI_API_KEY", "")]).unwrap();
        assert_eq!(config.hotkey, DEFAULT_HOTKEY);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_missing_home_is_an_error() {
        assert!(load(&[]).is_err());
    }
}
