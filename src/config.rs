//! TOML configuration.
//!
//! Every section except `[db]` is optional and falls back to defaults.
//! [`load_config`] parses and validates; [`Config::minimal`] builds an
//! in-code default used by tests and `portal init` without a file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Environment variable holding the API key. Without a key the model
    /// is disabled and every step runs on the local heuristics.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: default_base_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_temperature() -> f64 {
    0.3
}
fn default_max_tokens() -> u32 {
    1500
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,
    #[serde(default = "default_rerank_limit")]
    pub rerank_limit: usize,
    #[serde(default = "default_true")]
    pub use_terminology: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            result_limit: default_result_limit(),
            rerank_limit: default_rerank_limit(),
            use_terminology: true,
        }
    }
}

fn default_result_limit() -> usize {
    100
}
fn default_rerank_limit() -> usize {
    50
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    /// Environment variable holding the shared signing secret. Signature
    /// checks are skipped when the variable is unset or empty.
    #[serde(default = "default_secret_env")]
    pub secret_env: String,
    /// Prefix joined with an item's slug when the payload has no URL.
    #[serde(default = "default_link_base")]
    pub link_base: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret_env: default_secret_env(),
            link_base: default_link_base(),
        }
    }
}

fn default_secret_env() -> String {
    "CMS_WEBHOOK_SECRET".to_string()
}
fn default_link_base() -> String {
    "https://www.schoolinks.com/resources".to_string()
}

impl WebhookConfig {
    pub fn secret(&self) -> Option<String> {
        std::env::var(&self.secret_env)
            .ok()
            .filter(|s| !s.is_empty())
    }
}

impl Config {
    /// Defaults with the database at `db_path` and the LLM disabled.
    pub fn minimal(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
            server: ServerConfig::default(),
            webhook: WebhookConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.search.result_limit < 1 {
            bail!("search.result_limit must be >= 1");
        }
        if !(1..=50).contains(&self.search.rerank_limit) {
            bail!("search.rerank_limit must be in [1, 50]");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            bail!("llm.temperature must be in [0.0, 2.0]");
        }
        match self.llm.provider.as_str() {
            "disabled" => {}
            "openai" => {
                if self.llm.model.as_deref().map_or(true, |m| m.trim().is_empty()) {
                    bail!("llm.model must be specified when provider is 'openai'");
                }
            }
            other => bail!(
                "Unknown llm provider: '{}'. Must be disabled or openai.",
                other
            ),
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}
