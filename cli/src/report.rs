use orderdesk::{BatchStatus, BatchSummary};
use serde::Serialize;

/// Totals over every batch of one `run`.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub total_files: usize,
    pub success: usize,
    pub error: usize,
    pub cancelled: usize,
    /// Includes files of batches never started after a cancel.
    pub not_started: usize,
    pub batches: Vec<BatchSummary>,
}

impl RunReport {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            ..Default::default()
        }
    }

    pub fn add(&mut self, summary: BatchSummary) {
        self.success += summary.success;
        self.error += summary.error;
        self.cancelled += summary.cancelled;
        self.batches.push(summary);
        self.not_started = self
            .total_files
            .saturating_sub(self.success + self.error + self.cancelled);
    }

    pub fn was_cancelled(&self) -> bool {
        self.batches
            .iter()
            .any(|b| b.status == BatchStatus::Cancelled)
    }
}
