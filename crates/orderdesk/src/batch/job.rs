//! Batch job and per-file task records, as reported to callers and persisted
//! by the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::options::BatchOptions;
use crate::detection::DetectionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Processing,
    Completed,
    Error,
    Cancelled,
}

impl BatchStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BatchStatus::Processing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Error => "error",
            BatchStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "processing" => BatchStatus::Processing,
            "completed" => BatchStatus::Completed,
            "error" => BatchStatus::Error,
            "cancelled" => BatchStatus::Cancelled,
            other => {
                log::warn!("Unknown batch status '{}', treating as error", other);
                BatchStatus::Error
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Processing,
    Success,
    Error,
    Cancelled,
}

impl FileStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FileStatus::Success | FileStatus::Error | FileStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Pending => "pending",
            FileStatus::Processing => "processing",
            FileStatus::Success => "success",
            FileStatus::Error => "error",
            FileStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => FileStatus::Pending,
            "processing" => FileStatus::Processing,
            "success" => FileStatus::Success,
            "error" => FileStatus::Error,
            "cancelled" => FileStatus::Cancelled,
            other => {
                log::warn!("Unknown file status '{}', treating as error", other);
                FileStatus::Error
            }
        }
    }
}

/// One batch run. Mutated only by the orchestrator; frozen once terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchJob {
    pub id: String,
    pub total_files: usize,
    pub options: BatchOptions,
    pub status: BatchStatus,
    pub start_time: DateTime<Utc>,
    /// Set exactly when the status is terminal.
    pub end_time: Option<DateTime<Utc>>,
    pub processed_files: usize,
    pub failed_files: usize,
    pub cancelled_files: usize,
    /// The run ended held at the pause gate after a failed file.
    #[serde(default)]
    pub paused_on_error: bool,
}

impl BatchJob {
    pub fn new(total_files: usize, options: BatchOptions) -> Self {
        Self {
            id: String::new(),
            total_files,
            options,
            status: BatchStatus::Processing,
            start_time: Utc::now(),
            end_time: None,
            processed_files: 0,
            failed_files: 0,
            cancelled_files: 0,
            paused_on_error: false,
        }
    }

    /// Moves the job to a terminal status with final counts.
    pub fn finish(&mut self, status: BatchStatus, success: usize, failed: usize, cancelled: usize) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.end_time = Some(Utc::now());
        self.processed_files = success;
        self.failed_files = failed;
        self.cancelled_files = cancelled;
    }
}

/// One file's passage through the pipeline within a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileTask {
    pub file_name: String,
    pub file_size: u64,
    pub status: FileStatus,
    pub company_id: Option<String>,
    /// Set whenever the status is `Success`.
    pub work_order_id: Option<String>,
    pub detection_result: Option<DetectionResult>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub processing_time_ms: Option<u64>,
    pub error_message: Option<String>,
    pub attempts: u32,
}

impl FileTask {
    pub fn pending(file_name: impl Into<String>, file_size: u64) -> Self {
        Self {
            file_name: file_name.into(),
            file_size,
            status: FileStatus::Pending,
            company_id: None,
            work_order_id: None,
            detection_result: None,
            started_at: None,
            completed_at: None,
            processing_time_ms: None,
            error_message: None,
            attempts: 1,
        }
    }

    pub fn start(&mut self) {
        self.status = FileStatus::Processing;
        self.started_at = Some(Utc::now());
    }

    pub fn succeed(&mut self, company_id: String, work_order_id: String) {
        self.status = FileStatus::Success;
        self.company_id = Some(company_id);
        self.work_order_id = Some(work_order_id);
        self.error_message = None;
        self.complete();
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = FileStatus::Error;
        self.error_message = Some(message.into());
        self.complete();
    }

    pub fn cancel(&mut self) {
        self.status = FileStatus::Cancelled;
        self.error_message = Some("Cancelled".to_string());
        self.complete();
    }

    fn complete(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        self.processing_time_ms = self
            .started_at
            .map(|start| (now - start).num_milliseconds().max(0) as u64);
    }
}

/// Outcome of a finished batch, handed to the completion callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub batch_id: String,
    pub status: BatchStatus,
    pub total_files: usize,
    pub success: usize,
    pub error: usize,
    pub cancelled: usize,
    /// Files never started, e.g. after cancellation.
    pub not_started: usize,
    /// The run ended while paused because of a failed file.
    pub paused_on_error: bool,
    pub results: Vec<FileTask>,
    pub elapsed_ms: u64,
}

impl BatchSummary {
    pub fn result(&self, file_name: &str) -> Option<&FileTask> {
        self.results.iter().find(|r| r.file_name == file_name)
    }
}
