//! Configuration management for Buildora
//!
//! Settings for the generation endpoint, the preview sandbox, archive export and
//! the local project store. Loaded from `.buildora/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{BuildoraError, Result};

/// Workspace-level Buildora configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildoraConfig {
    /// Remote generation settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Preview sandbox settings
    #[serde(default)]
    pub preview: PreviewConfig,

    /// Archive export settings
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Project persistence
    #[serde(default)]
    pub store: StoreConfig,
}

/// Generation request parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Chat-completions endpoint (OpenRouter compatible)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model identifier sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable containing the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_penalty")]
    pub frequency_penalty: f32,

    #[serde(default = "default_penalty")]
    pub presence_penalty: f32,

    /// Retries for rate limits and server errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Preview server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    /// How often the project file is checked for edits, in milliseconds
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
}

/// Archive export settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Deflate level, 0-9
    #[serde(default = "default_compression_level")]
    pub compression_level: i64,
}

/// Local project store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_dir")]
    pub directory: PathBuf,
}

// Default value providers
fn default_endpoint() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "google/gemini-2.0-flash-lite-preview-02-05:free".to_string()
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}

fn default_temperature() -> f32 {
    0.85
}

fn default_top_p() -> f32 {
    0.95
}

fn default_penalty() -> f32 {
    0.3
}

fn default_max_retries() -> u32 {
    3
}

fn default_bind() -> String {
    "127.0.0.1:4173".to_string()
}

fn default_poll_ms() -> u64 {
    1000
}

fn default_compression_level() -> i64 {
    6
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(".buildora/projects")
}

impl BuildoraConfig {
    /// Load configuration from `.buildora/config.toml` or use defaults
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let config_path = root.join(".buildora/config.toml");

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)
                .map_err(|e| BuildoraError::Config(format!("Failed to parse config file: {}", e)))
        } else {
            Ok(Self::default())
        }
    }

    /// Write default configuration to `.buildora/config.toml`
    pub fn write_default(root: &Path) -> Result<PathBuf> {
        let config_dir = root.join(".buildora");
        std::fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| BuildoraError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(&config_path, content)?;
        Ok(config_path)
    }
}

impl GenerationConfig {
    /// Resolve the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(BuildoraError::Auth(format!(
                "API key missing. Set {} to your OpenRouter API key.",
                self.api_key_env
            ))),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            frequency_penalty: default_penalty(),
            presence_penalty: default_penalty(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            poll_ms: default_poll_ms(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compression_level: default_compression_level(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: default_store_dir(),
        }
    }
}
