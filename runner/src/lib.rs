//! Command compilation and scheduled execution of transcode jobs.
//!
//! Two halves, kept strictly apart:
//!
//! - [`compile`] — a pure mapping from a declared
//!   [`Job`](ffqueue_core::Job) plus the capability cache to the tool's
//!   argument vector. Identical inputs always produce byte-identical
//!   output, which keeps logging reproducible and the compiler testable
//!   without a tool binary.
//! - [`queue`] — the scheduler: runs compiled jobs as external processes,
//!   honoring parallel groups, decoding the live progress stream, and
//!   implementing two-phase (graceful, then forced) cancellation over a
//!   shared live-process registry.
//!
//! Progress and lifecycle notifications are published on an mpsc channel of
//! [`QueueEvent`]s; any consumer — a UI, a logger, a test harness — drains
//! the receiving end.

pub mod compile;
mod error;
pub mod progress;
pub mod queue;

pub use compile::compile_command;
pub use error::QueueError;
pub use progress::{ProgressDecoder, ProgressUpdate, format_eta};
pub use queue::{GRACEFUL_STOP_TIMEOUT, QueueEvent, Scheduler};
