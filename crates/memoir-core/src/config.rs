use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{MemoirError, Result};

/// Top-level configuration for the Memoir system.
///
/// Loaded from `~/.memoir/config.toml` by default. Each section corresponds
/// to one subsystem; every field has a default so a partial file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoirConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

impl MemoirConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MemoirConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file is missing
    /// or does not parse.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.query_num == 0 {
            return Err(MemoirError::Config(
                "retrieval.query_num must be at least 1".to_string(),
            ));
        }
        if self.retrieval.topk == 0 {
            return Err(MemoirError::Config(
                "retrieval.topk must be at least 1".to_string(),
            ));
        }
        if self.ingest.max_workers == 0 {
            return Err(MemoirError::Config(
                "ingest.max_workers must be at least 1".to_string(),
            ));
        }
        if self.ingest.retry.max_attempts == 0 {
            return Err(MemoirError::Config(
                "ingest.retry.max_attempts must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("resolver.face_threshold", self.resolver.face_threshold),
            ("resolver.voice_threshold", self.resolver.voice_threshold),
            ("resolver.refresh_threshold", self.resolver.refresh_threshold),
            ("retrieval.min_relevance", self.retrieval.min_relevance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(MemoirError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory for graph snapshots and logs.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.memoir/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Streaming ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Upper bound on parallel per-video ingestion workers. Each worker
    /// owns a private graph; clips within one video are always sequential.
    pub max_workers: usize,
    /// Retry behavior for transient collaborator failures.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_workers: 1,
            retry: RetryConfig::default(),
        }
    }
}

/// Bounded exponential backoff for collaborator calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first (so 3 means up to 2 retries).
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
        }
    }
}

/// Identity resolution thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum cosine similarity for two face embeddings to co-cluster.
    pub face_threshold: f64,
    /// Minimum cosine similarity for two voice embeddings to co-cluster.
    pub voice_threshold: f64,
    /// Minimum cross-identity similarity used by the refresh pass.
    pub refresh_threshold: f64,
    /// Cap on representative embeddings kept per identity and modality.
    pub max_representatives: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            face_threshold: 0.75,
            voice_threshold: 0.70,
            refresh_threshold: 0.80,
            max_representatives: 8,
        }
    }
}

/// Retrieval engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of candidate query reformulations per question.
    pub query_num: usize,
    /// Evidence set size bound.
    pub topk: usize,
    /// Aggregation mode: "argmax", "union", or "vote".
    pub mode: String,
    /// Per-query relevance floor; candidates below it are discarded.
    pub min_relevance: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            query_num: 3,
            topk: 5,
            mode: "argmax".to_string(),
            min_relevance: 0.05,
        }
    }
}
