//! Error types for job execution.

use thiserror::Error;

/// Errors reported by the queue driver.
///
/// Per-job failures never surface here: a job that cannot spawn or exits
/// non-zero is marked Failed with its stderr captured, and its siblings
/// keep running.
#[derive(Debug, Error)]
pub enum QueueError {
    /// A queue run was requested while one is already in flight.
    #[error("the job queue is already running")]
    AlreadyRunning,
}
