/// Configuration module for medicalbot.
///
/// Two halves: [`Credentials`] holds the required API keys read from the
/// environment, [`Config`] holds the non-secret settings read from an
/// optional JSON file. Both are built once at startup and passed explicitly
/// to the pipeline assembler.
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Environment variable holding the Pinecone API key.
pub const PINECONE_API_KEY: &str = "PINECONE_API_KEY";
/// Environment variable holding the OpenAI API key.
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

// ── Default value functions ──────────────────────────────────────────

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_index_name() -> String {
    "medicalbot".to_string()
}

fn default_controller_url() -> String {
    "https://api.pinecone.io".to_string()
}

fn default_api_version() -> String {
    "2024-07".to_string()
}

fn default_text_key() -> String {
    "text".to_string()
}

fn default_llm_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_llm_model() -> String {
    "gpt-3.5-turbo-instruct".to_string()
}

fn default_model_name() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_model_dir() -> String {
    "models/all-MiniLM-L6-v2".to_string()
}

fn default_dimensions() -> usize {
    384
}

// ── Credentials ──────────────────────────────────────────────────────

/// Errors raised while reading credentials from the environment.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingEnv(&'static str),
}

/// API keys for the two hosted services.
#[derive(Clone)]
pub struct Credentials {
    pub pinecone_api_key: String,
    pub openai_api_key: String,
}

impl Credentials {
    /// Read credentials from the process environment, loading `.env` first.
    ///
    /// A missing `.env` file is fine; a missing or blank variable is not.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => info!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!("Failed to read .env: {e}"),
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingEnv(name))
        };

        Ok(Self {
            pinecone_api_key: require(PINECONE_API_KEY)?,
            openai_api_key: require(OPENAI_API_KEY)?,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("pinecone_api_key", &"<redacted>")
            .field("openai_api_key", &"<redacted>")
            .finish()
    }
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Name of the pre-populated vector index.
    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// Directory holding an override `chat.html`; the built-in page is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<String>,

    #[serde(default)]
    pub pinecone: PineconeConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PineconeConfig {
    #[serde(default = "default_controller_url")]
    pub controller_url: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default)]
    pub namespace: String,

    /// Metadata key the indexer stored passage text under.
    #[serde(default = "default_text_key")]
    pub text_key: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_model_name")]
    pub model_name: String,

    #[serde(default = "default_model_dir")]
    pub model_dir: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            index_name: default_index_name(),
            template_dir: None,
            pinecone: PineconeConfig::default(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            controller_url: default_controller_url(),
            api_version: default_api_version(),
            namespace: String::new(),
            text_key: default_text_key(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            timeout_secs: None,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            model_dir: default_model_dir(),
            dimensions: default_dimensions(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// A missing file yields the defaults. Unlike a missing file, a file
    /// that exists but does not parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("{} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let cfg: Config = serde_json::from_str(&data)
            .with_context(|| format!("invalid JSON in {}", path.display()))?;

        info!("Loaded configuration from {}", path.display());
        Ok(cfg)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.port > 0, "port must be positive");
        anyhow::ensure!(
            !self.index_name.trim().is_empty(),
            "index_name must not be empty"
        );
        anyhow::ensure!(!self.llm.model.is_empty(), "llm.model must not be empty");
        anyhow::ensure!(
            !self.embedding.model_name.trim().is_empty(),
            "embedding.model_name must not be empty"
        );
        anyhow::ensure!(
            self.embedding.dimensions > 0,
            "embedding.dimensions must be positive"
        );
        Ok(())
    }

    /// `host:port` string for the listener.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
