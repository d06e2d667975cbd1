//! Ragmate configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RagmateError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagmateConfig {
    /// API key for the remote vector-search service. Falls back to
    /// `OPENAI_API_KEY` when empty.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Logical name of the knowledge-base vector store.
    #[serde(default = "default_store_name")]
    pub store_name: String,
    /// Cached store id. Resolved lazily via the registry on a miss and
    /// persisted here so the next boot skips the list call.
    #[serde(default)]
    pub cached_store_id: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".into()
}
fn default_store_name() -> String {
    "Knowledge Base".into()
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for RagmateConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: default_api_base(),
            store_name: default_store_name(),
            cached_store_id: None,
            timeout_secs: default_timeout_secs(),
            search: SearchConfig::default(),
            retry: RetryConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl RagmateConfig {
    /// Load config from the default path (~/.ragmate/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RagmateError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| RagmateError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| RagmateError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Ragmate home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ragmate")
    }

    /// The API key to use, preferring the config value over the environment.
    pub fn resolved_api_key(&self) -> String {
        if !self.api_key.is_empty() {
            self.api_key.clone()
        } else {
            std::env::var("OPENAI_API_KEY").unwrap_or_default()
        }
    }
}

/// Retrieval defaults applied when the caller does not override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,
    /// Drop hits below the threshold. On by default.
    #[serde(default = "bool_true")]
    pub apply_threshold: bool,
}

fn default_max_results() -> u32 {
    5
}
fn default_score_threshold() -> f64 {
    0.7
}
fn bool_true() -> bool {
    true
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            score_threshold: default_score_threshold(),
            apply_threshold: true,
        }
    }
}

/// Backoff knobs for the explicit retry layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    250
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

/// Host-facing HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Optional bearer token required on every gateway request.
    #[serde(default)]
    pub auth_token: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8087
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            auth_token: None,
        }
    }
}
