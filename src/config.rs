//! Run configuration loaded from YAML.
//!
//! The file lists the providers to import from, how to reach each API
//! through the HTTP gateway, which AI provider rewrites content, and the
//! knobs for timeouts, trending keywords and affiliate links. See
//! [`AppConfig`] for the full shape.

use crate::error::ConfigError;
use crate::models::ContentType;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, instrument, warn};

/// Built-in trending keywords used when the config does not list any.
pub const DEFAULT_TRENDING: &[&str] = &[
    "ai",
    "bitcoin",
    "elon musk",
    "meta",
    "gpt",
    "openai",
    "climate change",
    "apple",
    "nvidia",
    "tesla",
];

/// A validated provider entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub api_id: String,
    pub endpoint_id: String,
    pub content_type: ContentType,
    pub rewrite_enabled: bool,
}

impl ProviderConfig {
    /// Key used in per-provider summaries and logs.
    pub fn key(&self) -> String {
        format!("{}/{}", self.api_id, self.endpoint_id)
    }
}

/// A provider entry as written in the config file, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEntry {
    #[serde(default)]
    pub api: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default, rename = "type")]
    pub content_type: ContentType,
    #[serde(default = "default_true", deserialize_with = "loose_bool")]
    pub rewrite: bool,
}

impl TryFrom<&ProviderEntry> for ProviderConfig {
    type Error = ConfigError;

    fn try_from(entry: &ProviderEntry) -> Result<Self, Self::Error> {
        let api_id = entry.api.trim();
        let endpoint_id = entry.endpoint.trim();
        if api_id.is_empty() {
            return Err(ConfigError::MissingField("api"));
        }
        if endpoint_id.is_empty() {
            return Err(ConfigError::MissingField("endpoint"));
        }
        Ok(ProviderConfig {
            api_id: api_id.to_string(),
            endpoint_id: endpoint_id.to_string(),
            content_type: entry.content_type,
            rewrite_enabled: entry.rewrite,
        })
    }
}

/// How to reach one API through the HTTP gateway.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    /// Endpoint id → path appended to `base_url`.
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
    /// Total pages fetched per provider, the first one included.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default)]
    pub apis: BTreeMap<String, ApiConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            max_pages: default_max_pages(),
            apis: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// `openai`, `huggingface`, `local` or `none`.
    #[serde(default = "default_ai_provider")]
    pub provider: String,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub openai_model: Option<String>,
    #[serde(default)]
    pub huggingface_api_key: Option<String>,
    #[serde(default)]
    pub huggingface_model: Option<String>,
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_backoff")]
    pub backoff_secs: u64,
    #[serde(default = "default_attempts")]
    pub max_attempts: u32,
    /// Expand content locally when the selected provider has no usable key.
    #[serde(default)]
    pub local_fallback: bool,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_ai_provider(),
            openai_api_key: None,
            openai_model: None,
            huggingface_api_key: None,
            huggingface_model: None,
            timeout_secs: default_ai_timeout(),
            backoff_secs: default_backoff(),
            max_attempts: default_attempts(),
            local_fallback: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_image_timeout")]
    pub timeout_secs: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_image_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AffiliateConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub images: ImageConfig,
    #[serde(default = "default_trending")]
    pub trending: Vec<String>,
    #[serde(default)]
    pub affiliate: AffiliateConfig,
    #[serde(default = "default_store_path")]
    pub store_path: String,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl AppConfig {
    /// Parse a configuration document.
    pub fn from_yaml(text: &str, origin: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    /// Read and parse the configuration file at `path`.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let origin = path.display().to_string();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: origin.clone(),
                source,
            })?;
        let config = Self::from_yaml(&text, &origin)?;
        info!(
            providers = config.providers.len(),
            apis = config.gateway.apis.len(),
            ai_provider = %config.ai.provider,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Validated provider list. Invalid entries are logged and skipped.
    pub fn valid_providers(&self) -> Vec<ProviderConfig> {
        self.providers
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| match ProviderConfig::try_from(entry) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!(
                        index,
                        api_id = %entry.api,
                        endpoint_id = %entry.endpoint,
                        error = %e,
                        "Skipping provider"
                    );
                    None
                }
            })
            .collect()
    }
}

/// Accept real booleans plus the usual string/number spellings.
fn loose_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Bool(bool),
        Int(i64),
        Str(String),
    }

    Ok(match Loose::deserialize(deserializer)? {
        Loose::Bool(b) => b,
        Loose::Int(n) => n != 0,
        Loose::Str(s) => match s.trim().to_lowercase().as_str() {
            "false" | "0" | "off" | "no" => false,
            "true" | "1" | "on" | "yes" => true,
            _ => default_true(),
        },
    })
}

fn default_true() -> bool {
    true
}
fn default_fetch_timeout() -> u64 {
    20
}
fn default_max_pages() -> usize {
    2
}
fn default_ai_provider() -> String {
    "openai".to_string()
}
fn default_ai_timeout() -> u64 {
    20
}
fn default_backoff() -> u64 {
    1
}
fn default_attempts() -> u32 {
    3
}
fn default_image_timeout() -> u64 {
    10
}
fn default_trending() -> Vec<String> {
    DEFAULT_TRENDING.iter().map(|s| s.to_string()).collect()
}
fn default_store_path() -> String {
    "booster-store.json".to_string()
}
fn default_concurrency() -> usize {
    4
}
