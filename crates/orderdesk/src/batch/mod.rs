//! Batch orchestration: queueing, throttling, pause/resume/cancel and
//! aggregation of per-file results.

pub mod control;
pub mod job;
pub mod options;
pub mod orchestrator;
pub mod progress;

pub use control::{BatchControl, GateOutcome, PauseReason};
pub use job::{BatchJob, BatchStatus, BatchSummary, FileStatus, FileTask};
pub use options::{validate_batch, BatchOptions, MAX_BATCH_FILES, MAX_CONCURRENT_FILES};
pub use orchestrator::{BatchHandle, BatchOrchestrator, BatchSnapshot};
pub use progress::{BatchEvent, BatchEventBroadcaster, BatchReporter, NoopReporter};
