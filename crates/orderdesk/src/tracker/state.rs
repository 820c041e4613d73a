use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::work_order_status;

/// UI-facing status of one file.
///
/// Progression is `Waiting → OcrProcessing → DocumentCreating → Completed`.
/// `Error` and `Cancelled` are reachable from any non-terminal state; the only
/// way back is a retry from `Error` to `Waiting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Waiting,
    OcrProcessing,
    DocumentCreating,
    Completed,
    Error,
    Cancelled,
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProcessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Waiting => "waiting",
            ProcessStatus::OcrProcessing => "ocr_processing",
            ProcessStatus::DocumentCreating => "document_creating",
            ProcessStatus::Completed => "completed",
            ProcessStatus::Error => "error",
            ProcessStatus::Cancelled => "cancelled",
        }
    }

    /// Human-readable step label.
    pub fn label(&self) -> &'static str {
        match self {
            ProcessStatus::Waiting => "Waiting to start",
            ProcessStatus::OcrProcessing => "Reading document",
            ProcessStatus::DocumentCreating => "Creating work order",
            ProcessStatus::Completed => "Work order created",
            ProcessStatus::Error => "Failed",
            ProcessStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessStatus::Completed | ProcessStatus::Error | ProcessStatus::Cancelled
        )
    }

    fn rank(&self) -> Option<u8> {
        match self {
            ProcessStatus::Waiting => Some(0),
            ProcessStatus::OcrProcessing => Some(1),
            ProcessStatus::DocumentCreating => Some(2),
            ProcessStatus::Completed => Some(3),
            ProcessStatus::Error | ProcessStatus::Cancelled => None,
        }
    }

    pub fn can_transition_to(&self, next: ProcessStatus) -> bool {
        if *self == ProcessStatus::Error && next == ProcessStatus::Waiting {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(from), Some(to)) => to > from,
            (None, Some(_)) => false,
        }
    }

    /// Maps a persisted work-order status onto the UI state machine.
    pub fn from_remote(status: &str) -> Option<Self> {
        let mapped = match status.trim().to_ascii_lowercase().as_str() {
            "pending" | "waiting" => ProcessStatus::Waiting,
            work_order_status::UPLOADED | work_order_status::PROCESSING => {
                ProcessStatus::OcrProcessing
            }
            work_order_status::GENERATING => ProcessStatus::DocumentCreating,
            work_order_status::COMPLETED | "success" => ProcessStatus::Completed,
            work_order_status::FAILED | "error" => ProcessStatus::Error,
            work_order_status::CANCELLED => ProcessStatus::Cancelled,
            other => {
                log::warn!("Unknown remote status '{}'", other);
                return None;
            }
        };
        Some(mapped)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessState {
    pub status: ProcessStatus,
    pub current_step: String,
    pub start_time: Option<DateTime<Utc>>,
    pub can_cancel: bool,
    pub error_detail: Option<String>,
    pub work_order_id: Option<String>,
}

impl Default for ProcessState {
    fn default() -> Self {
        Self {
            status: ProcessStatus::Waiting,
            current_step: ProcessStatus::Waiting.label().to_string(),
            start_time: None,
            can_cancel: true,
            error_detail: None,
            work_order_id: None,
        }
    }
}

impl ProcessState {
    pub(crate) fn enter(&mut self, status: ProcessStatus) {
        self.status = status;
        self.current_step = status.label().to_string();
        self.can_cancel = !status.is_terminal();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProcessStatus::*;

    #[test]
    fn test_forward_only_transitions() {
        assert!(Waiting.can_transition_to(OcrProcessing));
        assert!(OcrProcessing.can_transition_to(DocumentCreating));
        assert!(DocumentCreating.can_transition_to(Completed));
        assert!(Waiting.can_transition_to(DocumentCreating));

        assert!(!DocumentCreating.can_transition_to(OcrProcessing));
        assert!(!OcrProcessing.can_transition_to(Waiting));
        assert!(!Waiting.can_transition_to(Waiting));
    }

    #[test]
    fn test_error_and_cancel_from_any_non_terminal() {
        for from in [Waiting, OcrProcessing, DocumentCreating] {
            assert!(from.can_transition_to(Error));
            assert!(from.can_transition_to(Cancelled));
        }
        for from in [Completed, Error, Cancelled] {
            assert!(!from.can_transition_to(Cancelled));
        }
        assert!(!Completed.can_transition_to(Error));
    }

    #[test]
    fn test_retry_only_from_error() {
        assert!(Error.can_transition_to(Waiting));
        assert!(!Cancelled.can_transition_to(Waiting));
        assert!(!Completed.can_transition_to(Waiting));
    }

    #[test]
    fn test_remote_status_table() {
        let table = [
            ("pending", Some(Waiting)),
            ("uploaded", Some(OcrProcessing)),
            ("processing", Some(OcrProcessing)),
            ("generating", Some(DocumentCreating)),
            ("completed", Some(Completed)),
            ("SUCCESS", Some(Completed)),
            ("failed", Some(Error)),
            ("cancelled", Some(Cancelled)),
            ("archived", None),
        ];
        for (raw, expected) in table {
            assert_eq!(ProcessStatus::from_remote(raw), expected, "status {}", raw);
        }
    }
}
