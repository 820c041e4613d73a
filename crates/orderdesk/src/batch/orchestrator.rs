use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::Instrument;

use super::control::{BatchControl, GateOutcome, PauseReason};
use super::job::{BatchJob, BatchStatus, BatchSummary, FileStatus, FileTask};
use super::options::{validate_batch, BatchOptions};
use super::progress::{BatchEvent, BatchEventBroadcaster, BatchReporter, NoopReporter};
use crate::config::{BatchConfig, TrackerConfig};
use crate::error::ValidationError;
use crate::pipeline::{run_stages, DocumentPipeline, PipelineError, SourceFile, StagePlan};
use crate::store::Store;
use crate::tracker::{ProcessState, ProcessStatusTracker};

/// Observable job state for the UI.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSnapshot {
    pub batch_id: Option<String>,
    pub is_processing: bool,
    pub is_paused: bool,
    pub pause_reason: Option<PauseReason>,
    pub current_file_index: usize,
    pub total_files: usize,
    pub results: Vec<FileTask>,
}

#[derive(Default)]
struct BatchState {
    batch_id: Option<String>,
    is_processing: bool,
    current_file_index: usize,
    total_files: usize,
    /// One entry per file name, in completion order.
    results: Vec<FileTask>,
    trackers: HashMap<String, Arc<ProcessStatusTracker>>,
    started_at: Option<Instant>,
    finished_after: Option<Duration>,
}

#[derive(Clone, Default)]
struct SharedState(Arc<RwLock<BatchState>>);

impl SharedState {
    fn read(&self) -> RwLockReadGuard<'_, BatchState> {
        match self.0.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, BatchState> {
        match self.0.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Cloneable controls and read access to a running (or finished) batch.
#[derive(Clone)]
pub struct BatchHandle {
    control: BatchControl,
    state: SharedState,
    events: BatchEventBroadcaster,
    reporter: Arc<dyn BatchReporter>,
}

impl BatchHandle {
    /// Pauses before the next file starts. In-flight files run to completion.
    pub fn pause(&self) -> bool {
        if !self.state.read().is_processing || !self.control.pause(PauseReason::User) {
            return false;
        }
        info!("Batch paused by user");
        self.reporter.on_paused(PauseReason::User);
        self.events.send(BatchEvent::Paused {
            batch_id: self.batch_id(),
            reason: PauseReason::User,
        });
        true
    }

    pub fn resume(&self) -> bool {
        if !self.control.resume() {
            return false;
        }
        info!("Batch resumed");
        self.events.send(BatchEvent::Resumed {
            batch_id: self.batch_id(),
        });
        true
    }

    /// Signals every file of the batch to stop. Results of calls already in
    /// flight are discarded as cancelled.
    pub fn cancel(&self) -> bool {
        if !self.state.read().is_processing || !self.control.cancel() {
            return false;
        }
        info!("Batch cancellation requested");
        self.events.send(BatchEvent::Cancelled {
            batch_id: self.batch_id(),
        });
        true
    }

    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }

    pub fn is_cancelled(&self) -> bool {
        self.control.is_cancelled()
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        let state = self.state.read();
        BatchSnapshot {
            batch_id: state.batch_id.clone(),
            is_processing: state.is_processing,
            is_paused: self.control.is_paused(),
            pause_reason: self.control.pause_reason(),
            current_file_index: state.current_file_index,
            total_files: state.total_files,
            results: state.results.clone(),
        }
    }

    /// `results / total_files` as a percentage.
    pub fn progress_percent(&self) -> f64 {
        let state = self.state.read();
        if state.total_files == 0 {
            return 0.0;
        }
        state.results.len() as f64 * 100.0 / state.total_files as f64
    }

    pub fn elapsed(&self) -> Duration {
        let state = self.state.read();
        match (state.finished_after, state.started_at) {
            (Some(done), _) => done,
            (None, Some(start)) => start.elapsed(),
            (None, None) => Duration::ZERO,
        }
    }

    /// Current process state of one file of the batch.
    pub fn process_state(&self, file_name: &str) -> Option<ProcessState> {
        self.state
            .read()
            .trackers
            .get(file_name)
            .map(|t| t.snapshot())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.events.subscribe()
    }

    fn batch_id(&self) -> String {
        self.state.read().batch_id.clone().unwrap_or_default()
    }
}

struct RunContext {
    batch_id: String,
    options: BatchOptions,
    plan: StagePlan,
}

/// Runs batches of files through a [`DocumentPipeline`].
///
/// One batch runs at a time. Files start in queue order; with a concurrency
/// limit above one they run in chunks of at most
/// [`MAX_CONCURRENT_FILES`](super::MAX_CONCURRENT_FILES), awaited together.
pub struct BatchOrchestrator {
    pipeline: Arc<dyn DocumentPipeline>,
    store: Arc<dyn Store>,
    config: BatchConfig,
    tracker_config: TrackerConfig,
    handle: BatchHandle,
}

impl BatchOrchestrator {
    pub fn new(
        pipeline: Arc<dyn DocumentPipeline>,
        store: Arc<dyn Store>,
        config: BatchConfig,
        tracker_config: TrackerConfig,
    ) -> Self {
        Self {
            pipeline,
            store,
            config,
            tracker_config,
            handle: BatchHandle {
                control: BatchControl::new(),
                state: SharedState::default(),
                events: BatchEventBroadcaster::default(),
                reporter: Arc::new(NoopReporter),
            },
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn BatchReporter>) -> Self {
        self.handle.reporter = reporter;
        self
    }

    pub fn handle(&self) -> BatchHandle {
        self.handle.clone()
    }

    /// Runs a batch to completion and returns its summary.
    ///
    /// Validation happens before anything else; a rejected batch has no side
    /// effects. Per-file failures never fail the batch.
    pub async fn start_batch(
        &self,
        files: Vec<SourceFile>,
        options: BatchOptions,
    ) -> Result<BatchSummary, ValidationError> {
        validate_batch(
            files.iter().map(|f| f.file_name.as_str()),
            &options,
            &self.config,
        )?;
        self.begin(&files)?;

        let mut job = BatchJob::new(files.len(), options.clone());
        job.id = match self.store.create_batch_job(&job).await {
            Ok(id) => id,
            Err(e) => {
                let id = uuid::Uuid::new_v4().to_string();
                warn!("Failed to persist batch job, continuing as {}: {}", id, e);
                id
            }
        };
        self.handle.state.write().batch_id = Some(job.id.clone());

        let span = tracing::info_span!("batch", batch_id = %job.id, total_files = files.len());
        let summary = self.run(job, files, options).instrument(span).await;
        Ok(summary)
    }

    /// Claims the orchestrator for a new batch and resets its state.
    fn begin(&self, files: &[SourceFile]) -> Result<(), ValidationError> {
        let mut state = self.handle.state.write();
        if state.is_processing {
            return Err(ValidationError::AlreadyRunning);
        }
        self.handle.control.reset();
        *state = BatchState {
            is_processing: true,
            total_files: files.len(),
            started_at: Some(Instant::now()),
            trackers: files
                .iter()
                .map(|f| {
                    let tracker = ProcessStatusTracker::with_store(
                        self.tracker_config.clone(),
                        Arc::clone(&self.store),
                    );
                    (f.file_name.clone(), Arc::new(tracker))
                })
                .collect(),
            ..Default::default()
        };
        Ok(())
    }

    async fn run(&self, mut job: BatchJob, files: Vec<SourceFile>, options: BatchOptions) -> BatchSummary {
        let control = &self.handle.control;
        let ctx = RunContext {
            batch_id: job.id.clone(),
            plan: StagePlan {
                auto_detect: options.auto_detect_enabled,
                company_id: options.selected_company().map(str::to_string),
            },
            options,
        };
        let limit = ctx.options.effective_concurrency(&self.config);
        info!(
            "Starting batch {} with {} files (concurrency {})",
            ctx.batch_id,
            files.len(),
            limit
        );
        self.handle.events.send(BatchEvent::Started {
            batch_id: ctx.batch_id.clone(),
            total_files: files.len(),
        });

        if limit <= 1 {
            for (index, file) in files.iter().enumerate() {
                if control.is_cancelled() {
                    break;
                }
                self.process_file_with_result(&ctx, index, file, 1).await;
            }
        } else {
            let large = files.len() > self.config.large_batch_threshold;
            for (chunk_index, chunk) in files.chunks(limit).enumerate() {
                if control.is_cancelled() {
                    break;
                }
                if chunk_index > 0 && large {
                    tokio::time::sleep(self.config.inter_chunk_delay()).await;
                }
                let offset = chunk_index * limit;
                join_all(chunk.iter().enumerate().map(|(i, file)| {
                    self.process_file_with_result(&ctx, offset + i, file, 1)
                }))
                .await;
            }
        }

        if ctx.options.retry_failed_files && !control.is_cancelled() {
            self.retry_failed(&ctx, &files).await;
        }

        self.finish(&mut job).await
    }

    /// Re-runs every failed file once. Each retry replaces its own entry.
    async fn retry_failed(&self, ctx: &RunContext, files: &[SourceFile]) {
        let failed: Vec<String> = self
            .handle
            .state
            .read()
            .results
            .iter()
            .filter(|r| r.status == FileStatus::Error)
            .map(|r| r.file_name.clone())
            .collect();
        if failed.is_empty() {
            return;
        }
        info!("Retrying {} failed files", failed.len());

        for name in failed {
            if self.handle.control.is_cancelled() {
                break;
            }
            if let Some((index, file)) = files
                .iter()
                .enumerate()
                .find(|(_, f)| f.file_name == name)
            {
                self.process_file_with_result(ctx, index, file, 2).await;
            }
        }
    }

    /// Runs one file through the pipeline and records its result.
    ///
    /// Waits at the pause gate first; a cancel seen there or after the
    /// pipeline returns yields a `cancelled` result.
    async fn process_file_with_result(
        &self,
        ctx: &RunContext,
        index: usize,
        file: &SourceFile,
        attempt: u32,
    ) -> FileTask {
        let span = tracing::info_span!("file", file_name = %file.file_name, index, attempt);
        async {
            let control = &self.handle.control;
            let tracker = self.tracker_for(&file.file_name);
            if attempt > 1 {
                if let Err(e) = tracker.retry() {
                    debug!("Tracker for {}: {}", file.file_name, e);
                }
            }

            let mut task = FileTask::pending(&file.file_name, file.size());
            task.attempts = attempt;

            if control
                .wait_while_paused(self.config.pause_poll_interval())
                .await
                == GateOutcome::Cancelled
            {
                tracker.cancel_process().await;
                task.cancel();
                self.record(ctx, &task).await;
                return task;
            }

            task.start();
            self.advance_index(index);
            self.handle.events.send(BatchEvent::FileStarted {
                batch_id: ctx.batch_id.clone(),
                file_name: file.file_name.clone(),
                index,
            });
            if let Err(e) = self.store.upsert_file_task(&ctx.batch_id, &task).await {
                warn!("Failed to persist start of {}: {}", file.file_name, e);
            }

            let outcome = run_stages(self.pipeline.as_ref(), file, &ctx.plan, Some(&tracker)).await;
            task.company_id = outcome.company_id;
            task.detection_result = outcome.detection;

            if control.is_cancelled() {
                debug!("Discarding result of {} after cancel", file.file_name);
                tracker.cancel_process().await;
                task.cancel();
            } else {
                match outcome.result {
                    Ok(order) => {
                        task.succeed(order.company_id, order.work_order_id);
                        if let Err(e) = tracker.complete_process().await {
                            debug!("Tracker for {}: {}", file.file_name, e);
                        }
                    }
                    Err(PipelineError::Cancelled) => {
                        tracker.cancel_process().await;
                        task.cancel();
                    }
                    Err(e) => {
                        let message = e.to_string();
                        warn!("File {} failed: {}", file.file_name, message);
                        if let Err(e) = tracker.set_error_state(&message) {
                            debug!("Tracker for {}: {}", file.file_name, e);
                        }
                        task.fail(message);
                        if ctx.options.pause_on_error && control.pause(PauseReason::Error) {
                            info!("Batch paused after failure of {}", file.file_name);
                            self.handle.reporter.on_paused(PauseReason::Error);
                            self.handle.events.send(BatchEvent::Paused {
                                batch_id: ctx.batch_id.clone(),
                                reason: PauseReason::Error,
                            });
                        }
                    }
                }
            }

            self.record(ctx, &task).await;
            task
        }
        .instrument(span)
        .await
    }

    fn tracker_for(&self, file_name: &str) -> Arc<ProcessStatusTracker> {
        let mut state = self.handle.state.write();
        let tracker = state
            .trackers
            .entry(file_name.to_string())
            .or_insert_with(|| {
                Arc::new(ProcessStatusTracker::with_store(
                    self.tracker_config.clone(),
                    Arc::clone(&self.store),
                ))
            });
        Arc::clone(tracker)
    }

    fn advance_index(&self, index: usize) {
        let mut state = self.handle.state.write();
        state.current_file_index = state.current_file_index.max(index);
    }

    /// Stores the result under its file name, then persists and reports it.
    async fn record(&self, ctx: &RunContext, task: &FileTask) {
        {
            let mut state = self.handle.state.write();
            match state
                .results
                .iter_mut()
                .find(|r| r.file_name == task.file_name)
            {
                Some(existing) => *existing = task.clone(),
                None => state.results.push(task.clone()),
            }
        }

        if let Err(e) = self.store.upsert_file_task(&ctx.batch_id, task).await {
            warn!("Failed to persist result of {}: {}", task.file_name, e);
        }
        self.handle.reporter.on_file_complete(task);
        self.handle.events.send(BatchEvent::FileCompleted {
            batch_id: ctx.batch_id.clone(),
            result: task.clone(),
        });
    }

    async fn finish(&self, job: &mut BatchJob) -> BatchSummary {
        let control = &self.handle.control;
        // An error pause stays on the handle until resumed or the next batch.
        let paused_on_error = control.pause_reason() == Some(PauseReason::Error);
        if !paused_on_error {
            control.resume();
        }

        let (results, elapsed) = {
            let mut state = self.handle.state.write();
            let elapsed = state.started_at.map(|s| s.elapsed()).unwrap_or_default();
            state.finished_after = Some(elapsed);
            (state.results.clone(), elapsed)
        };

        let count = |status: FileStatus| results.iter().filter(|r| r.status == status).count();
        let success = count(FileStatus::Success);
        let error = count(FileStatus::Error);
        let cancelled = count(FileStatus::Cancelled);

        let status = if cancelled > 0 || control.is_cancelled() {
            BatchStatus::Cancelled
        } else if error == job.total_files {
            BatchStatus::Error
        } else {
            BatchStatus::Completed
        };
        job.finish(status, success, error, cancelled);
        job.paused_on_error = paused_on_error;

        if let Err(e) = self.store.update_batch_job(job).await {
            warn!("Failed to persist final state of batch {}: {}", job.id, e);
        }

        let summary = BatchSummary {
            batch_id: job.id.clone(),
            status,
            total_files: job.total_files,
            success,
            error,
            cancelled,
            not_started: job.total_files.saturating_sub(results.len()),
            paused_on_error,
            results,
            elapsed_ms: elapsed.as_millis() as u64,
        };
        info!(
            "Batch {} finished as {}: {} succeeded, {} failed, {} cancelled",
            summary.batch_id,
            status.as_str(),
            success,
            error,
            cancelled
        );

        self.handle.state.write().is_processing = false;
        self.handle.reporter.on_batch_complete(&summary);
        self.handle.events.send(BatchEvent::Completed {
            summary: summary.clone(),
        });
        summary
    }
}
