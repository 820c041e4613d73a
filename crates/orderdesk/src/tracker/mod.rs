//! Per-file process state machine shown to the UI.

pub mod state;
pub mod status_tracker;

pub use state::{ProcessState, ProcessStatus};
pub use status_tracker::{CompletionCallback, ErrorCallback, ProcessStatusTracker, TrackerError};
