use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrderdeskError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("AI service error: {0}")]
    Ai(#[from] crate::ai::AiError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid pattern in rule '{rule_id}': {reason}")]
    InvalidPattern { rule_id: String, reason: String },
}

/// Rejections raised before a batch starts. None of these have side effects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No files were selected")]
    EmptyBatch,

    #[error("Batch of {count} files exceeds the limit of {max}; split it into smaller batches")]
    BatchTooLarge { count: usize, max: usize },

    #[error("A company must be selected when auto-detection is disabled")]
    MissingCompany,

    #[error("File '{0}' appears more than once in the batch")]
    DuplicateFileName(String),

    #[error("A batch is already running")]
    AlreadyRunning,
}

pub type Result<T> = std::result::Result<T, OrderdeskError>;
