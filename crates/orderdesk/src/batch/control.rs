use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Why a batch is paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PauseReason {
    User,
    /// A file failed and the batch runs with pause-on-error.
    Error,
}

/// Outcome of waiting at the pause gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Proceed,
    Cancelled,
}

#[derive(Debug, Default)]
struct ControlInner {
    paused: AtomicBool,
    cancelled: AtomicBool,
    pause_reason: Mutex<Option<PauseReason>>,
}

/// Pause and cancel flags shared by every in-flight file of a batch.
///
/// Cancellation is cooperative: tasks check it at the pause gate and after
/// each pipeline call.
#[derive(Debug, Clone, Default)]
pub struct BatchControl {
    inner: Arc<ControlInner>,
}

impl BatchControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pauses the batch. Returns false if it was already paused or cancelled.
    pub fn pause(&self, reason: PauseReason) -> bool {
        if self.is_cancelled() {
            return false;
        }
        let was_paused = self.inner.paused.swap(true, Ordering::SeqCst);
        if !was_paused {
            *self.reason_lock() = Some(reason);
        }
        !was_paused
    }

    /// Returns false if the batch was not paused.
    pub fn resume(&self) -> bool {
        let was_paused = self.inner.paused.swap(false, Ordering::SeqCst);
        if was_paused {
            *self.reason_lock() = None;
        }
        was_paused
    }

    /// Returns false if already cancelled.
    pub fn cancel(&self) -> bool {
        let was_cancelled = self.inner.cancelled.swap(true, Ordering::SeqCst);
        // Paused tasks must see the cancel to leave the gate.
        self.inner.paused.store(false, Ordering::SeqCst);
        !was_cancelled
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    pub fn pause_reason(&self) -> Option<PauseReason> {
        if self.is_paused() {
            *self.reason_lock()
        } else {
            None
        }
    }

    /// Clears both flags for the next run.
    pub fn reset(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
        self.inner.cancelled.store(false, Ordering::SeqCst);
        *self.reason_lock() = None;
    }

    /// Sleeps in `interval` steps while paused.
    pub async fn wait_while_paused(&self, interval: Duration) -> GateOutcome {
        loop {
            if self.is_cancelled() {
                return GateOutcome::Cancelled;
            }
            if !self.is_paused() {
                return GateOutcome::Proceed;
            }
            tokio::time::sleep(interval).await;
        }
    }

    fn reason_lock(&self) -> std::sync::MutexGuard<'_, Option<PauseReason>> {
        match self.inner.pause_reason.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
