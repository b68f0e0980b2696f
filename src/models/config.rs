use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::index::{Metric, Placement};
use super::search::OutputFormat;
use crate::error::ConfigError;

pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_POSTGRES_URL: &str = "postgres://localhost:5432/retrieval";
pub const DEFAULT_INDEX_NAME: &str = "documents";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 384;

const ENV_INDEX_URL: &str = "RCORE_INDEX_URL";
const ENV_INDEX_API_KEY: &str = "RCORE_INDEX_API_KEY";
const ENV_INDEX_DRIVER: &str = "RCORE_INDEX_DRIVER";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub encoder: EncoderConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("retrieval-core").join("config.toml"))
    }

    /// Load from the default location, falling back to defaults, then apply
    /// environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::resolve(None)
    }

    /// Like [`Config::load`], but an explicit `path` must exist.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::load_from(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            ConfigError::PathError("could not determine config directory".to_string())
        })?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_INDEX_URL) {
            self.index.url = url;
        }
        if let Ok(key) = std::env::var(ENV_INDEX_API_KEY) {
            self.index.api_key = Some(key);
        }
        if let Ok(driver) = std::env::var(ENV_INDEX_DRIVER) {
            match driver.parse() {
                Ok(driver) => self.index.driver = driver,
                Err(e) => tracing::warn!("ignoring {ENV_INDEX_DRIVER}: {e}"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.encoder.dimension == 0 {
            return Err(ConfigError::ValidationError(
                "encoder.dimension must be greater than zero".to_string(),
            ));
        }
        if self.encoder.batch_size == 0 || self.index.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "batch sizes must be greater than zero".to_string(),
            ));
        }
        if self.encoder.max_chars == 0 || self.encoder.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "encoder truncation budgets must be greater than zero".to_string(),
            ));
        }
        if self.chunking.strategy == ChunkStrategy::Window
            && self.chunking.chunk_overlap >= self.chunking.chunk_size
        {
            return Err(ConfigError::ValidationError(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.index.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "index.timeout_secs must be greater than zero".to_string(),
            ));
        }
        crate::models::validate_index_name(&self.index.name)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderKind {
    /// Feature-hashing encoder, needs no model files
    #[default]
    Hashing,
    /// ONNX model + tokenizer loaded from `model_dir`
    Onnx,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    #[serde(default)]
    pub kind: EncoderKind,

    #[serde(default = "default_dimension")]
    pub dimension: u32,

    /// Character budget for hashing encoders; longer inputs are truncated.
    #[serde(default = "default_max_chars")]
    pub max_chars: u32,

    /// Token budget for tokenizer-based encoders.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_encoder_batch_size")]
    pub batch_size: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_dir: Option<PathBuf>,

    /// Prefix prepended to queries by instruction-tuned models.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_instruction: Option<String>,

    #[serde(default)]
    pub reranker: RerankerConfig,
}

fn default_dimension() -> u32 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_max_chars() -> u32 {
    8192
}

fn default_max_tokens() -> u32 {
    512
}

fn default_encoder_batch_size() -> u32 {
    8
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            kind: EncoderKind::default(),
            dimension: default_dimension(),
            max_chars: default_max_chars(),
            max_tokens: default_max_tokens(),
            batch_size: default_encoder_batch_size(),
            model_dir: None,
            query_instruction: None,
            reranker: RerankerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RerankerKind {
    #[default]
    None,
    Hashing,
    Onnx,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    #[serde(default)]
    pub kind: RerankerKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_dir: Option<PathBuf>,

    /// How many first-stage candidates are re-scored per query.
    #[serde(default = "default_rerank_candidates")]
    pub candidates: u32,
}

fn default_rerank_candidates() -> u32 {
    20
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            kind: RerankerKind::default(),
            model_dir: None,
            candidates: default_rerank_candidates(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorDriver {
    /// In-process index, lost when the process exits
    #[default]
    Memory,
    Qdrant,
    #[serde(alias = "postgres", alias = "pgvector")]
    PostgreSQL,
}

impl std::str::FromStr for VectorDriver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(VectorDriver::Memory),
            "qdrant" => Ok(VectorDriver::Qdrant),
            "postgresql" | "postgres" | "pgvector" => Ok(VectorDriver::PostgreSQL),
            _ => Err(format!("unknown vector driver: {s}")),
        }
    }
}

impl std::fmt::Display for VectorDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorDriver::Memory => write!(f, "memory"),
            VectorDriver::Qdrant => write!(f, "qdrant"),
            VectorDriver::PostgreSQL => write!(f, "postgresql"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub driver: VectorDriver,

    #[serde(default = "default_index_url")]
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_index_name")]
    pub name: String,

    #[serde(default)]
    pub metric: Metric,

    #[serde(default)]
    pub placement: Placement,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_index_batch_size")]
    pub batch_size: u32,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_true")]
    pub retry_queries: bool,

    #[serde(default = "default_pool_max")]
    pub pool_max: u32,

    #[serde(default = "default_pool_acquire_timeout")]
    pub pool_acquire_timeout: u32,

    /// PostgreSQL schema for index tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

fn default_index_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_index_name() -> String {
    DEFAULT_INDEX_NAME.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_index_batch_size() -> u32 {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_pool_max() -> u32 {
    5
}

fn default_pool_acquire_timeout() -> u32 {
    10
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            driver: VectorDriver::default(),
            url: default_index_url(),
            api_key: None,
            name: default_index_name(),
            metric: Metric::default(),
            placement: Placement::default(),
            timeout_secs: default_timeout_secs(),
            batch_size: default_index_batch_size(),
            max_retries: default_max_retries(),
            retry_queries: true,
            pool_max: default_pool_max(),
            pool_acquire_timeout: default_pool_acquire_timeout(),
            schema: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    #[default]
    Sentence,
    Window,
}

impl std::str::FromStr for ChunkStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sentence" => Ok(ChunkStrategy::Sentence),
            "window" => Ok(ChunkStrategy::Window),
            _ => Err(format!("unknown chunk strategy: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default)]
    pub strategy: ChunkStrategy,

    /// Window size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Window overlap in characters.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,

    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_chunk_size() -> u32 {
    2000
}

fn default_chunk_overlap() -> u32 {
    200
}

fn default_exclude_patterns() -> Vec<String> {
    vec![
        "**/node_modules/**".to_string(),
        "**/target/**".to_string(),
        "**/.git/**".to_string(),
        "**/dist/**".to_string(),
        "**/build/**".to_string(),
        "**/__pycache__/**".to_string(),
        "**/.venv/**".to_string(),
        "**/*.min.js".to_string(),
        "**/*.lock".to_string(),
    ]
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkStrategy::default(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            exclude_patterns: default_exclude_patterns(),
            max_file_size: default_max_file_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: u32,

    #[serde(default)]
    pub default_format: OutputFormat,

    #[serde(default)]
    pub rerank: bool,
}

fn default_top_k() -> u32 {
    10
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            default_format: OutputFormat::Text,
            rerank: false,
        }
    }
}
