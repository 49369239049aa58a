//! Configuration loading, validation, and management for ragchat.
//!
//! Loads configuration from `~/.ragchat/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.ragchat/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Model used when a request names none
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Temperature used when a request sets none
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Max tokens per LLM response (unset = provider default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_max_tokens: Option<u32>,

    /// Chat pipeline defaults
    #[serde(default)]
    pub chat: ChatConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Knowledge stores addressable by id
    #[serde(default)]
    pub datastores: Vec<DatastoreConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-3.5-turbo-0613".into()
}
fn default_temperature() -> f32 {
    0.0
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("chat", &self.chat)
            .field("gateway", &self.gateway)
            .field("providers", &self.providers)
            .field("datastores", &self.datastores)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl std::fmt::Debug for DatastoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatastoreConfig")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("url", &self.url)
            .field("api_key", &redact(&self.api_key))
            .field("documents", &self.documents.len())
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Strategy used when a request names none: "customer_support" or "raw"
    #[serde(default = "default_strategy")]
    pub default_strategy: String,

    /// Chunks retrieved for the customer-support strategy when topK is unset
    #[serde(default = "default_top_k")]
    pub customer_support_top_k: usize,

    /// Chunks retrieved for the raw strategy when topK is unset
    #[serde(default = "default_top_k")]
    pub raw_top_k: usize,

    /// Persona for the customer-support strategy when a request carries no prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_support_prompt: Option<String>,

    /// `{query}` / `{context}` template for the raw strategy when a request carries no prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_prompt: Option<String>,
}

fn default_strategy() -> String {
    "customer_support".into()
}
fn default_top_k() -> usize {
    5
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_strategy: default_strategy(),
            customer_support_top_k: default_top_k(),
            raw_top_k: default_top_k(),
            customer_support_prompt: None,
            raw_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Request body limit in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Origins allowed to call the API from a browser (chat widgets)
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    42618
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_body_bytes: default_max_body_bytes(),
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

/// Backend behind a datastore id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatastoreKind {
    /// JSONL documents loaded from `path`
    File,
    /// Remote query endpoint at `url`
    Http,
    /// In-process store seeded from `documents`
    Memory,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DatastoreConfig {
    /// Identifier callers use to reference the store
    pub id: String,

    pub kind: DatastoreKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Inline documents for a `memory` datastore
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<SeedDocument>,
}

/// One `[[datastores.documents]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedDocument {
    pub text: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.ragchat/config.toml).
    ///
    /// Also checks environment variables:
    /// - `RAGCHAT_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `RAGCHAT_PROVIDER`, `RAGCHAT_MODEL`
    /// - `OPENAI_API_BASE` for the `openai` provider's base URL
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("RAGCHAT_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(provider) = lookup("RAGCHAT_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("RAGCHAT_MODEL") {
            self.default_model = model;
        }

        if let Some(base) = lookup("OPENAI_API_BASE") {
            self.providers
                .entry("openai".into())
                .or_insert(ProviderConfig {
                    api_key: None,
                    api_url: None,
                })
                .api_url = Some(base);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ragchat")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.chat.customer_support_top_k == 0 || self.chat.raw_top_k == 0 {
            return Err(ConfigError::ValidationError(
                "chat top_k defaults must be > 0".into(),
            ));
        }

        if !matches!(self.chat.default_strategy.as_str(), "customer_support" | "raw") {
            return Err(ConfigError::ValidationError(format!(
                "chat.default_strategy '{}' is not 'customer_support' or 'raw'",
                self.chat.default_strategy
            )));
        }

        let mut seen = HashSet::new();
        for store in &self.datastores {
            if !seen.insert(store.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate datastore id '{}'",
                    store.id
                )));
            }
            match store.kind {
                DatastoreKind::File if store.path.is_none() => {
                    return Err(ConfigError::ValidationError(format!(
                        "datastore '{}' of kind file needs a path",
                        store.id
                    )));
                }
                DatastoreKind::Http if store.url.is_none() => {
                    return Err(ConfigError::ValidationError(format!(
                        "datastore '{}' of kind http needs a url",
                        store.id
                    )));
                }
                DatastoreKind::File | DatastoreKind::Http if !store.documents.is_empty() => {
                    return Err(ConfigError::ValidationError(format!(
                        "datastore '{}': inline documents are only read by kind memory",
                        store.id
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: None,
            chat: ChatConfig::default(),
            gateway: GatewayConfig::default(),
            providers: HashMap::new(),
            datastores: vec![],
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for ragchat_core::Error {
    fn from(e: ConfigError) -> Self {
        ragchat_core::Error::Config {
            message: e.to_string(),
        }
    }
}
