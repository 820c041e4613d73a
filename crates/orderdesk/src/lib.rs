//! Batch processing of scanned order documents.
//!
//! Each document is attributed to a client company ([`CompanyDetector`]) and
//! turned into a work order by an AI text-generation service
//! ([`SingleFileProcessor`]). [`BatchOrchestrator`] runs many documents with
//! bounded concurrency and pause/resume/cancel, while a
//! [`ProcessStatusTracker`] per file exposes its progress.

pub mod ai;
pub mod batch;
pub mod config;
pub mod db;
pub mod detection;
pub mod error;
pub mod pipeline;
pub mod secrets;
pub mod store;
pub mod tracker;

pub use ai::{AiClient, AiError, AiResponse, DocumentPart, GeminiClient, Usage};
pub use batch::{
    BatchControl, BatchEvent, BatchHandle, BatchJob, BatchOptions, BatchOrchestrator,
    BatchReporter, BatchSnapshot, BatchStatus, BatchSummary, FileStatus, FileTask, PauseReason,
    MAX_BATCH_FILES, MAX_CONCURRENT_FILES,
};
pub use config::{load_config, load_config_from_str, Config};
pub use detection::{
    pick_better, CompanyDetector, CompanyDirectory, DetectionMethod, DetectionResult,
    DetectionRule, RuleSet, RuleType,
};
pub use error::{ConfigError, OrderdeskError, Result, ValidationError};
pub use pipeline::{
    DocumentPipeline, GeneratedWorkOrder, PipelineError, SingleFileProcessor, SourceFile,
    StagePlan,
};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use store::{MemoryStore, SqliteStore, Store, StoreError, WorkOrderRecord};
pub use tracker::{ProcessState, ProcessStatus, ProcessStatusTracker, TrackerError};
