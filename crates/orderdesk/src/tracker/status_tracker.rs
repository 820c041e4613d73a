use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Instant;

use chrono::Utc;
use log::{debug, warn};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::state::{ProcessState, ProcessStatus};
use crate::config::TrackerConfig;
use crate::store::{work_order_status, Store, WorkOrderRecord};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackerError {
    #[error("Invalid process transition from {from} to {to}")]
    InvalidTransition {
        from: ProcessStatus,
        to: ProcessStatus,
    },

    #[error("Polling requires a store")]
    NoStore,
}

/// Called once when polling observes `completed`.
pub type CompletionCallback = Box<dyn FnOnce(ProcessState) + Send + 'static>;
/// Called once when polling observes `error` or `cancelled`.
pub type ErrorCallback = Box<dyn FnOnce(String) + Send + 'static>;

#[derive(Debug, Default)]
struct TrackerState {
    process: ProcessState,
    document_creating_since: Option<Instant>,
}

struct TrackerInner {
    state: Mutex<TrackerState>,
    config: TrackerConfig,
    store: Option<Arc<dyn Store>>,
    poller: Mutex<Option<JoinHandle<()>>>,
    polling: AtomicBool,
    events: broadcast::Sender<ProcessState>,
}

impl TrackerInner {
    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn poller(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.poller.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn stop_polling(&self) {
        self.polling.store(false, Ordering::SeqCst);
        if let Some(handle) = self.poller().take() {
            handle.abort();
        }
    }

    /// Applies `f` to the state and publishes the result.
    fn update<F>(&self, f: F) -> ProcessState
    where
        F: FnOnce(&mut TrackerState),
    {
        let snapshot = {
            let mut state = self.lock();
            f(&mut state);
            state.process.clone()
        };
        let _ = self.events.send(snapshot.clone());
        snapshot
    }

    fn transition(&self, to: ProcessStatus) -> Result<ProcessState, TrackerError> {
        let snapshot = {
            let mut state = self.lock();
            let from = state.process.status;
            if !from.can_transition_to(to) {
                return Err(TrackerError::InvalidTransition { from, to });
            }
            state.process.enter(to);
            if to == ProcessStatus::DocumentCreating {
                state.document_creating_since = Some(Instant::now());
            }
            state.process.clone()
        };
        debug!("Process state -> {}", to);
        let _ = self.events.send(snapshot.clone());
        Ok(snapshot)
    }

    /// Mirrors a polled record. Stale (backward) remote states are ignored.
    /// Returns the new state when it is terminal.
    fn apply_remote(&self, status: ProcessStatus, record: &WorkOrderRecord) -> Option<ProcessState> {
        let snapshot = {
            let mut state = self.lock();
            if state.process.work_order_id.is_none() {
                state.process.work_order_id = Some(record.id.clone());
            }
            let from = state.process.status;
            if from == status || !from.can_transition_to(status) {
                return None;
            }
            state.process.enter(status);
            match status {
                ProcessStatus::DocumentCreating => {
                    state.document_creating_since = Some(Instant::now());
                }
                ProcessStatus::Error => {
                    state.process.error_detail = Some(
                        record
                            .error_message
                            .clone()
                            .unwrap_or_else(|| "Processing failed".to_string()),
                    );
                }
                ProcessStatus::Cancelled => {
                    state.process.error_detail = Some("Cancelled".to_string());
                }
                _ => {}
            }
            state.process.clone()
        };
        let _ = self.events.send(snapshot.clone());
        status.is_terminal().then_some(snapshot)
    }
}

/// State machine for one file, driven either locally by the orchestrator or
/// by polling the persisted work-order record.
///
/// The polling task holds only a weak reference and is aborted on any
/// terminal transition, on [`dispose`](Self::dispose) and on drop.
pub struct ProcessStatusTracker {
    inner: Arc<TrackerInner>,
}

impl ProcessStatusTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self::build(config, None)
    }

    pub fn with_store(config: TrackerConfig, store: Arc<dyn Store>) -> Self {
        Self::build(config, Some(store))
    }

    fn build(config: TrackerConfig, store: Option<Arc<dyn Store>>) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            inner: Arc::new(TrackerInner {
                state: Mutex::new(TrackerState::default()),
                config,
                store,
                poller: Mutex::new(None),
                polling: AtomicBool::new(false),
                events,
            }),
        }
    }

    pub fn snapshot(&self) -> ProcessState {
        self.inner.lock().process.clone()
    }

    pub fn status(&self) -> ProcessStatus {
        self.inner.lock().process.status
    }

    pub fn is_polling(&self) -> bool {
        self.inner.polling.load(Ordering::SeqCst)
    }

    /// Every state change, in order.
    pub fn subscribe(&self) -> broadcast::Receiver<ProcessState> {
        self.inner.events.subscribe()
    }

    /// Starts work on a file that has no persisted record yet.
    pub fn start_process_without_id(&self) -> Result<ProcessState, TrackerError> {
        self.inner.transition(ProcessStatus::OcrProcessing)?;
        Ok(self.inner.update(|s| {
            s.process.start_time = Some(Utc::now());
            s.process.error_detail = None;
        }))
    }

    pub fn update_work_order_id(&self, work_order_id: impl Into<String>) -> ProcessState {
        let id = work_order_id.into();
        self.inner.update(|s| s.process.work_order_id = Some(id))
    }

    pub fn set_document_creating(&self) -> Result<ProcessState, TrackerError> {
        self.inner.transition(ProcessStatus::DocumentCreating)
    }

    /// Moves to `completed`, first holding `document_creating` for at least the
    /// configured dwell time.
    pub async fn complete_process(&self) -> Result<ProcessState, TrackerError> {
        let since = {
            let state = self.inner.lock();
            state.document_creating_since
        };
        let since = match since {
            Some(since) if self.status() == ProcessStatus::DocumentCreating => since,
            _ => {
                self.set_document_creating()?;
                Instant::now()
            }
        };

        let floor = self.inner.config.min_document_creating();
        let elapsed = since.elapsed();
        if elapsed < floor {
            tokio::time::sleep(floor - elapsed).await;
        }

        let state = self.inner.transition(ProcessStatus::Completed)?;
        self.inner.stop_polling();
        Ok(state)
    }

    pub fn set_error_state(&self, detail: impl Into<String>) -> Result<ProcessState, TrackerError> {
        let detail = detail.into();
        self.inner.transition(ProcessStatus::Error)?;
        self.inner.stop_polling();
        Ok(self.inner.update(|s| s.process.error_detail = Some(detail)))
    }

    /// `error → waiting`.
    pub fn retry(&self) -> Result<ProcessState, TrackerError> {
        self.inner.transition(ProcessStatus::Waiting)?;
        Ok(self.inner.update(|s| {
            s.process.error_detail = None;
            s.process.start_time = None;
            s.document_creating_since = None;
        }))
    }

    /// Cancels the process. Returns false, doing nothing, if it already
    /// reached a terminal state.
    ///
    /// Polling stops before the local transition; the remote record is then
    /// marked cancelled on a best-effort basis.
    pub async fn cancel_process(&self) -> bool {
        let work_order_id = {
            let state = self.inner.lock();
            if state.process.status.is_terminal() {
                return false;
            }
            state.process.work_order_id.clone()
        };

        self.inner.stop_polling();
        if self.inner.transition(ProcessStatus::Cancelled).is_err() {
            return false;
        }
        self.inner
            .update(|s| s.process.error_detail = Some("Cancelled".to_string()));

        if let (Some(store), Some(id)) = (&self.inner.store, work_order_id) {
            if let Err(e) = store
                .update_work_order_status(&id, work_order_status::CANCELLED, None, None)
                .await
            {
                warn!("Failed to mark work order {} cancelled: {}", id, e);
            }
        }
        true
    }

    /// Polls the record `record_id` until it reaches a terminal state, then
    /// calls exactly one of the callbacks and stops.
    pub fn start_polling(
        &self,
        record_id: impl Into<String>,
        on_complete: CompletionCallback,
        on_error: ErrorCallback,
    ) -> Result<(), TrackerError> {
        let store = self.inner.store.clone().ok_or(TrackerError::NoStore)?;
        let record_id = record_id.into();
        self.inner.stop_polling();
        self.inner.polling.store(true, Ordering::SeqCst);

        let weak: Weak<TrackerInner> = Arc::downgrade(&self.inner);
        let interval = self.inner.config.poll_interval();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let record = match store.find_work_order(&record_id).await {
                    Ok(Some(record)) => record,
                    Ok(None) => {
                        debug!("Work order {} not found yet", record_id);
                        continue;
                    }
                    Err(e) => {
                        warn!("Failed to poll work order {}: {}", record_id, e);
                        continue;
                    }
                };
                let Some(status) = ProcessStatus::from_remote(&record.status) else {
                    continue;
                };

                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if let Some(terminal) = inner.apply_remote(status, &record) {
                    inner.polling.store(false, Ordering::SeqCst);
                    drop(inner);
                    match terminal.status {
                        ProcessStatus::Completed => on_complete(terminal),
                        _ => on_error(
                            terminal
                                .error_detail
                                .unwrap_or_else(|| terminal.status.label().to_string()),
                        ),
                    }
                    break;
                }
            }
        });
        *self.inner.poller() = Some(handle);
        Ok(())
    }

    /// Stops polling. The state is left as is.
    pub fn dispose(&self) {
        self.inner.stop_polling();
    }
}

impl Drop for ProcessStatusTracker {
    fn drop(&mut self) {
        self.inner.stop_polling();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fast_config() -> TrackerConfig {
        TrackerConfig {
            poll_interval_ms: 5,
            min_document_creating_ms: 30,
        }
    }

    #[tokio::test]
    async fn test_local_happy_path() {
        let tracker = ProcessStatusTracker::new(fast_config());
        let mut events = tracker.subscribe();

        tracker.start_process_without_id().unwrap();
        tracker.update_work_order_id("wo-1");
        tracker.set_document_creating().unwrap();
        let done = tracker.complete_process().await.unwrap();

        assert_eq!(done.status, ProcessStatus::Completed);
        assert!(!done.can_cancel);
        assert_eq!(done.work_order_id.as_deref(), Some("wo-1"));

        let mut seen = Vec::new();
        while let Ok(state) = events.try_recv() {
            if seen.last() != Some(&state.status) {
                seen.push(state.status);
            }
        }
        assert_eq!(
            seen,
            vec![
                ProcessStatus::OcrProcessing,
                ProcessStatus::DocumentCreating,
                ProcessStatus::Completed
            ]
        );
    }

    #[tokio::test]
    async fn test_complete_enforces_dwell_floor() {
        let tracker = ProcessStatusTracker::new(fast_config());
        tracker.start_process_without_id().unwrap();

        let started = Instant::now();
        tracker.complete_process().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_cannot_go_backwards() {
        let tracker = ProcessStatusTracker::new(fast_config());
        tracker.start_process_without_id().unwrap();
        tracker.set_document_creating().unwrap();
        assert_eq!(
            tracker.start_process_without_id(),
            Err(TrackerError::InvalidTransition {
                from: ProcessStatus::DocumentCreating,
                to: ProcessStatus::OcrProcessing,
            })
        );
    }

    #[tokio::test]
    async fn test_error_then_retry() {
        let tracker = ProcessStatusTracker::new(fast_config());
        tracker.start_process_without_id().unwrap();
        let failed = tracker.set_error_state("quota exceeded").unwrap();
        assert_eq!(failed.error_detail.as_deref(), Some("quota exceeded"));
        assert!(!failed.can_cancel);

        let waiting = tracker.retry().unwrap();
        assert_eq!(waiting.status, ProcessStatus::Waiting);
        assert!(waiting.error_detail.is_none());
        assert!(tracker.start_process_without_id().is_ok());
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let tracker = ProcessStatusTracker::new(fast_config());
        tracker.start_process_without_id().unwrap();
        let mut events = tracker.subscribe();

        assert!(tracker.cancel_process().await);
        while events.try_recv().is_ok() {}

        assert!(!tracker.cancel_process().await);
        assert!(events.try_recv().is_err());

        let state = tracker.snapshot();
        assert_eq!(state.status, ProcessStatus::Cancelled);
        assert!(!state.can_cancel);
        assert!(!tracker.is_polling());
    }

    #[tokio::test]
    async fn test_polling_without_store_fails() {
        let tracker = ProcessStatusTracker::new(fast_config());
        let result = tracker.start_polling("wo-1", Box::new(|_| {}), Box::new(|_| {}));
        assert_eq!(result, Err(TrackerError::NoStore));
    }
}
