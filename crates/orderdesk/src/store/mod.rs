//! Persistent store seam.
//!
//! Every operation is async and may fail independently of the pipeline.
//! Callers log store failures and keep the outcome they already know.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::batch::{BatchJob, FileTask};
use crate::db::DatabaseError;
use crate::detection::{DetectionHistoryEntry, DetectionRule};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Store task failed: {0}")]
    Task(String),

    #[error("Failed to (de)serialize stored value: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Raw status vocabulary of persisted work orders.
pub mod work_order_status {
    pub const UPLOADED: &str = "uploaded";
    pub const PROCESSING: &str = "processing";
    pub const GENERATING: &str = "generating";
    pub const COMPLETED: &str = "completed";
    pub const FAILED: &str = "failed";
    pub const CANCELLED: &str = "cancelled";
}

/// The persisted record of one generated work order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrderRecord {
    pub id: String,
    pub file_name: String,
    pub company_id: String,
    /// One of [`work_order_status`].
    pub status: String,
    pub content: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkOrderRecord {
    pub fn new(
        id: impl Into<String>,
        file_name: impl Into<String>,
        company_id: impl Into<String>,
        status: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            file_name: file_name.into(),
            company_id: company_id.into(),
            status: status.to_string(),
            content: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Persists a new batch job and returns the id the store assigned.
    async fn create_batch_job(&self, job: &BatchJob) -> Result<String, StoreError>;

    /// Updates status, end time and counts of an existing job.
    async fn update_batch_job(&self, job: &BatchJob) -> Result<(), StoreError>;

    async fn find_batch_job(&self, id: &str) -> Result<Option<BatchJob>, StoreError>;

    /// Inserts or replaces the task with the same file name in the batch.
    async fn upsert_file_task(&self, batch_id: &str, task: &FileTask) -> Result<(), StoreError>;

    async fn list_file_tasks(&self, batch_id: &str) -> Result<Vec<FileTask>, StoreError>;

    async fn create_work_order(&self, record: &WorkOrderRecord) -> Result<(), StoreError>;

    /// Sets a work order's raw status. `content` and `error` are kept when `None`.
    async fn update_work_order_status(
        &self,
        id: &str,
        status: &str,
        content: Option<&str>,
        error: Option<&str>,
    ) -> Result<(), StoreError>;

    async fn find_work_order(&self, id: &str) -> Result<Option<WorkOrderRecord>, StoreError>;

    /// Most recent work order for a file name.
    async fn find_work_order_by_file(
        &self,
        file_name: &str,
    ) -> Result<Option<WorkOrderRecord>, StoreError>;

    /// Active rules ordered by priority, highest first.
    async fn list_active_rules(&self) -> Result<Vec<DetectionRule>, StoreError>;

    /// Inserts a rule or replaces the one with the same id.
    async fn save_rule(&self, rule: &DetectionRule) -> Result<(), StoreError>;

    /// Returns false if no rule had this id.
    async fn delete_rule(&self, id: &str) -> Result<bool, StoreError>;

    async fn record_detection(&self, entry: &DetectionHistoryEntry) -> Result<(), StoreError>;

    /// Records the company a reviewer assigned to a past detection.
    async fn correct_detection(&self, history_id: &str, company_id: &str)
        -> Result<(), StoreError>;

    async fn list_detection_history(
        &self,
        document_id: &str,
    ) -> Result<Vec<DetectionHistoryEntry>, StoreError>;
}
