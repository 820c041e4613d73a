use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{info, warn};
use orderdesk::{BatchHandle, BatchReporter, FileStatus, FileTask, PauseReason};

/// Two interrupts closer than this cancel the run.
pub const DOUBLE_PRESS_WINDOW: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    Resume,
    Cancel,
}

/// Ctrl-C resumes a paused batch and cancels a running one. A second press
/// inside [`DOUBLE_PRESS_WINDOW`] always cancels.
pub fn interrupt_action(paused: bool, since_last: Option<Duration>) -> InterruptAction {
    match since_last {
        Some(gap) if gap < DOUBLE_PRESS_WINDOW => InterruptAction::Cancel,
        _ if paused => InterruptAction::Resume,
        _ => InterruptAction::Cancel,
    }
}

/// Installs the Ctrl-C handler. The returned flag is set once the user asks
/// to stop, so no further batches are started.
pub fn install(handle: BatchHandle) -> Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    let mut last: Option<Instant> = None;

    ctrlc::set_handler(move || {
        let now = Instant::now();
        let action = interrupt_action(handle.is_paused(), last.map(|t| now - t));
        last = Some(now);
        match action {
            InterruptAction::Resume => {
                if handle.resume() {
                    info!("Resuming batch; press Ctrl-C twice to cancel");
                }
            }
            InterruptAction::Cancel => {
                flag.store(true, Ordering::SeqCst);
                // Between batches there is nothing running to cancel.
                let _ = handle.cancel();
                handle.resume();
                warn!("Interrupted, cancelling");
            }
        }
    })
    .context("Failed to install Ctrl-C handler")?;

    Ok(stop)
}

/// Logs file results and tells the user how to leave a pause.
pub struct ConsoleReporter;

impl BatchReporter for ConsoleReporter {
    fn on_file_complete(&self, result: &FileTask) {
        match result.status {
            FileStatus::Success => info!(
                "{}: work order {}",
                result.file_name,
                result.work_order_id.as_deref().unwrap_or("-")
            ),
            FileStatus::Error => warn!(
                "{}: {}",
                result.file_name,
                result.error_message.as_deref().unwrap_or("failed")
            ),
            _ => info!("{}: {:?}", result.file_name, result.status),
        }
    }

    fn on_paused(&self, reason: PauseReason) {
        match reason {
            PauseReason::Error => warn!(
                "Batch paused after a failed file. Press Ctrl-C to resume, twice to cancel"
            ),
            PauseReason::User => info!("Batch paused. Press Ctrl-C to resume, twice to cancel"),
        }
    }
}
