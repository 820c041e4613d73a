use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detection::DetectionRule;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// SQLite database location. Falls back to `~/.orderdesk/data/orderdesk.db`.
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub companies: Vec<CompanyConfig>,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    /// Rules seeded into an empty rule table on startup.
    #[serde(default)]
    pub rules: Vec<DetectionRule>,
}

impl Config {
    /// Resolves the configured database path, or the platform default.
    pub fn database_path(&self) -> Option<PathBuf> {
        match &self.database_path {
            Some(path) => Some(PathBuf::from(path)),
            None => crate::db::default_database_path(),
        }
    }
}

/// Connection settings for the AI text-generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// API key given inline. Prefer `api_key_file` or `api_key_env`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_api_key_env() -> Option<String> {
    Some("GEMINI_API_KEY".to_string())
}

fn default_ai_timeout() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            api_key_file: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_ai_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// A client organization that may issue order documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Literals only this company prints (legal entity name, registration number).
    #[serde(default)]
    pub unique_identifiers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Extract text only when the AI classification is not conclusive.
    #[default]
    Lazy,
    /// Run extraction alongside classification.
    Parallel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    #[serde(default = "default_short_circuit")]
    pub short_circuit_confidence: f64,
    #[serde(default = "default_score_normalization")]
    pub score_normalization: f64,
    #[serde(default = "default_max_rule_confidence")]
    pub max_rule_confidence: f64,
    #[serde(default)]
    pub extraction: ExtractionMode,
    #[serde(default = "default_true")]
    pub record_history: bool,
}

fn default_short_circuit() -> f64 {
    0.85
}

fn default_score_normalization() -> f64 {
    200.0
}

fn default_max_rule_confidence() -> f64 {
    0.95
}

fn default_true() -> bool {
    true
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            short_circuit_confidence: default_short_circuit(),
            score_normalization: default_score_normalization(),
            max_rule_confidence: default_max_rule_confidence(),
            extraction: ExtractionMode::Lazy,
            record_history: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Files accepted in one batch. Never above 50.
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    /// Upper bound on files processed at once. Never above 3.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_pause_poll_ms")]
    pub pause_poll_ms: u64,
    /// Batches above this size get a delay between chunks.
    #[serde(default = "default_large_batch_threshold")]
    pub large_batch_threshold: usize,
    #[serde(default = "default_inter_chunk_delay_ms")]
    pub inter_chunk_delay_ms: u64,
}

fn default_max_files() -> usize {
    50
}

fn default_max_concurrency() -> usize {
    3
}

fn default_pause_poll_ms() -> u64 {
    100
}

fn default_large_batch_threshold() -> usize {
    10
}

fn default_inter_chunk_delay_ms() -> u64 {
    500
}

impl BatchConfig {
    pub fn pause_poll_interval(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms)
    }

    pub fn inter_chunk_delay(&self) -> Duration {
        Duration::from_millis(self.inter_chunk_delay_ms)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_concurrency: default_max_concurrency(),
            pause_poll_ms: default_pause_poll_ms(),
            large_batch_threshold: default_large_batch_threshold(),
            inter_chunk_delay_ms: default_inter_chunk_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Minimum time a file stays visibly in `document_creating`.
    #[serde(default = "default_min_document_creating_ms")]
    pub min_document_creating_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_min_document_creating_ms() -> u64 {
    2000
}

impl TrackerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn min_document_creating(&self) -> Duration {
        Duration::from_millis(self.min_document_creating_ms)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            min_document_creating_ms: default_min_document_creating_ms(),
        }
    }
}
