use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::control::PauseReason;
use super::job::{BatchSummary, FileTask};

/// Batch lifecycle events for UI subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchEvent {
    Started {
        batch_id: String,
        total_files: usize,
    },
    FileStarted {
        batch_id: String,
        file_name: String,
        index: usize,
    },
    FileCompleted {
        batch_id: String,
        result: FileTask,
    },
    Paused {
        batch_id: String,
        reason: PauseReason,
    },
    Resumed {
        batch_id: String,
    },
    Cancelled {
        batch_id: String,
    },
    Completed {
        summary: BatchSummary,
    },
}

/// Per-file and completion callbacks. All methods default to no-ops.
pub trait BatchReporter: Send + Sync {
    /// Called once per file result, whatever the outcome.
    fn on_file_complete(&self, _result: &FileTask) {}

    fn on_paused(&self, _reason: PauseReason) {}

    /// Called exactly once per batch with every result.
    fn on_batch_complete(&self, _summary: &BatchSummary) {}
}

pub struct NoopReporter;

impl BatchReporter for NoopReporter {}

/// Fans batch events out to any number of subscribers.
#[derive(Clone)]
pub struct BatchEventBroadcaster {
    sender: Arc<broadcast::Sender<BatchEvent>>,
}

impl BatchEventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: BatchEvent) {
        // No receivers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.sender.subscribe()
    }
}

impl Default for BatchEventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_reaches_every_subscriber() {
        let broadcaster = BatchEventBroadcaster::default();
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();

        broadcaster.send(BatchEvent::Resumed {
            batch_id: "b1".to_string(),
        });

        for rx in [&mut first, &mut second] {
            match rx.recv().await.unwrap() {
                BatchEvent::Resumed { batch_id } => assert_eq!(batch_id, "b1"),
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[test]
    fn test_send_without_subscribers_is_ignored() {
        BatchEventBroadcaster::new(4).send(BatchEvent::Cancelled {
            batch_id: "b1".to_string(),
        });
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(BatchEvent::Paused {
            batch_id: "b1".to_string(),
            reason: PauseReason::Error,
        })
        .unwrap();
        assert_eq!(json["type"], "paused");
        assert_eq!(json["reason"], "error");
    }
}
