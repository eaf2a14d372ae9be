//! Core data model for driving an external FFmpeg-compatible toolchain.
//!
//! This crate defines the foundational types shared by the introspection and
//! execution crates:
//!
//! - [`CapabilityCache`] — versioned aggregate of everything the tool can do
//!   (codecs, formats, filters, pixel formats, global options), built by the
//!   `ffqueue-introspect` crate and consumed read-only afterwards.
//! - [`Parameter`] / [`Choice`] / [`Context`] — one configurable option on a
//!   codec, filter, format or global, its enumerable choices, and the
//!   capability mask describing where it applies.
//! - [`ParamValue`] — the closed Int/Float/Text value union that every
//!   numeric literal, named limit, hex literal and rational in the tool's
//!   help text normalizes into.
//! - [`Job`] — a user-declared transcode unit (sources, streams, encoder
//!   settings, trims, output resolution hints) compiled and executed by the
//!   `ffqueue-runner` crate.
//!
//! Merging ([`merge_parameter`]) combines parameters discovered by separate
//! probes of the same entity; all merge logic is explicit and OR-based, so
//! repeated merges are idempotent.
//!
//! # Example
//!
//! ```
//! use ffqueue_core::{CapabilityCache, Codec, CodecFlags, CACHE_VERSION};
//!
//! let mut cache = CapabilityCache::new("ffmpeg version 7.1".to_string());
//! cache.codecs.insert(
//!     "libx264".to_string(),
//!     Codec {
//!         description: "H.264 encoder".to_string(),
//!         flags: CodecFlags { encoder: true, video: true, lossy: true, ..Default::default() },
//!         parameters: Default::default(),
//!     },
//! );
//!
//! assert_eq!(cache.cache_version, CACHE_VERSION);
//! assert!(cache.is_valid_for("ffmpeg version 7.1"));
//! assert!(!cache.is_valid_for("ffmpeg version 8.0"));
//! ```

mod job;
mod merge;
pub mod time;
mod types;
mod value;

pub use job::{
    EncoderSettings, FilterSpec, FilterValue, Job, JobStatus, Source, Stream, StreamKind, Trim,
};
pub use merge::{merge_parameter, merge_parameters};
pub use types::{
    CACHE_VERSION, CacheValidityError, CapabilityCache, Choice, Codec, CodecFlags, Context,
    Filter, FilterFlags, Format, GlobalParameters, Parameter, PixelFormat,
};
pub use value::ParamValue;
