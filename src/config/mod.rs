#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::chunking::ChunkingConfig;

pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    /// Model used to embed portfolio chunks and retrieval queries
    pub embedding_model: String,
    /// Model used for job-info extraction and email synthesis
    pub generation_model: String,
    pub batch_size: u32,
    pub embedding_dimension: u32,
}

impl Default for OllamaConfig {
    #[inline]
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            embedding_model: "nomic-embed-text:latest".to_string(),
            generation_model: "llama3.1:8b".to_string(),
            batch_size: 16,
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    /// Identifying client label sent with every page fetch
    pub user_agent: String,
    pub timeout_seconds: u64,
    /// Fetched job pages are truncated to this many characters before
    /// extraction, to respect model context limits
    pub max_page_chars: usize,
}

impl Default for FetchConfig {
    #[inline]
    fn default() -> Self {
        Self {
            user_agent: format!(
                "coldreach/{} (Cold Email Generator)",
                env!("CARGO_PKG_VERSION")
            ),
            timeout_seconds: 30,
            max_page_chars: 3000,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Data directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid chunk size: {0} (must be between 1 and 100000)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    ChunkOverlapTooLarge(usize, usize),
    #[error("Invalid fetch timeout: {0} (must be between 1 and 300 seconds)")]
    InvalidFetchTimeout(u64),
    #[error("Invalid page limit: {0} (must be at least 100 characters)")]
    InvalidPageLimit(usize),
    #[error("Invalid user agent (cannot be empty)")]
    InvalidUserAgent,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    #[inline]
    pub fn load<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let config_path = base_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                ollama: OllamaConfig::default(),
                chunking: ChunkingConfig::default(),
                fetch: FetchConfig::default(),
                base_dir: base_dir.as_ref().to_path_buf(),
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = base_dir.as_ref().to_path_buf();

        config
            .validate()
            .context("Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!("Failed to create data directory: {}", self.base_dir.display())
        })?;

        let config_path = self.base_dir.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ollama.protocol != "http" && self.ollama.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.ollama.protocol.clone()));
        }
        if self.ollama.port == 0 {
            return Err(ConfigError::InvalidPort(self.ollama.port));
        }
        if self.ollama.batch_size == 0 || self.ollama.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.ollama.batch_size));
        }
        if self.ollama.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(
                self.ollama.embedding_model.clone(),
            ));
        }
        if self.ollama.generation_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(
                self.ollama.generation_model.clone(),
            ));
        }
        if self.ollama.embedding_dimension < 64 || self.ollama.embedding_dimension > 4096 {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.ollama.embedding_dimension,
            ));
        }
        if self.chunking.chunk_size == 0 || self.chunking.chunk_size > 100_000 {
            return Err(ConfigError::InvalidChunkSize(self.chunking.chunk_size));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(ConfigError::ChunkOverlapTooLarge(
                self.chunking.chunk_overlap,
                self.chunking.chunk_size,
            ));
        }
        if self.fetch.timeout_seconds == 0 || self.fetch.timeout_seconds > 300 {
            return Err(ConfigError::InvalidFetchTimeout(self.fetch.timeout_seconds));
        }
        if self.fetch.max_page_chars < 100 {
            return Err(ConfigError::InvalidPageLimit(self.fetch.max_page_chars));
        }
        if self.fetch.user_agent.trim().is_empty() {
            return Err(ConfigError::InvalidUserAgent);
        }
        Ok(())
    }

    /// Base URL of the Ollama server shared by embedding and generation calls
    #[inline]
    pub fn ollama_url(&self) -> Result<Url> {
        let url = format!(
            "{}://{}:{}/",
            self.ollama.protocol, self.ollama.host, self.ollama.port
        );
        Url::parse(&url).with_context(|| format!("Invalid Ollama URL: {}", url))
    }

    /// Directory holding one vector store per session
    #[inline]
    pub fn stores_dir(&self) -> PathBuf {
        self.base_dir.join("stores")
    }

    /// Directory for transient staging files created during text ingestion
    #[inline]
    pub fn staging_dir(&self) -> PathBuf {
        self.base_dir.join("staging")
    }
}

/// Resolve the default data directory for config and session stores
#[inline]
pub fn default_base_dir() -> Result<PathBuf, ConfigError> {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .map(|dir| dir.join("coldreach"))
        .ok_or(ConfigError::DirectoryError)
}
