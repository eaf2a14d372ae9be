//! FFmpeg capability discovery.
//!
//! This crate turns the external tool's free-text introspection output into
//! the typed [`CapabilityCache`](ffqueue_core::CapabilityCache):
//!
//! - [`avoptions`] — the shared line grammar for the tool's generic
//!   key/value option help (parameters, enumerable choices, ranges,
//!   defaults, capability flag runs).
//! - [`codec`], [`filter`], [`format`], [`globals`], [`pixfmt`] — five
//!   domain extractors, each pairing pure listing parsers (testable on
//!   captured fixture text) with a probe-driven driver that deep-probes
//!   per-entity help output.
//! - [`probe`] — tool resolution and invocation behind the [`ToolRunner`]
//!   trait.
//! - [`snapshot`] — cache assembly, gzip persistence, and the
//!   validate-or-rebuild entry point.
//!
//! The grammar is best-effort by design: the help text belongs to an
//! external project and drifts between versions, so lines matching no known
//! pattern are skipped rather than failing the extraction.
//!
//! # Example
//!
//! ```
//! use ffqueue_introspect::avoptions::parse_av_options;
//!
//! let help = "\
//! libx264 AVOptions:
//!   -preset <string> E..V....... Set the encoding preset (default \"medium\")
//!   -crf <float> E..V....... Select the quality (from -1 to 51) (default -1)
//! ";
//!
//! let params = parse_av_options(help);
//! assert!(params.contains_key("preset"));
//! assert_eq!(params["crf"].param_type, "float");
//! ```

pub mod avoptions;
pub mod codec;
mod error;
pub mod filter;
pub mod format;
pub mod globals;
pub mod pixfmt;
pub mod probe;
pub mod snapshot;

pub use error::{IntrospectError, Result};
pub use probe::{FfmpegProbe, ProgressFn, ToolRunner, resolve_tool};
