//! Capability schema types built from the tool's introspection output.
//!
//! Shapes mirror what the tool's help text actually describes: a parameter
//! carries a free-form type tag, a capability mask, optional range/default
//! annotations and enumerable choices. All maps are [`BTreeMap`] so that
//! serialization and downstream command compilation are deterministic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::value::ParamValue;

/// Revision of the persisted capability-cache layout.
///
/// Embedded in every [`CapabilityCache`]; a persisted cache with a different
/// revision is discarded wholesale and rebuilt.
pub const CACHE_VERSION: u32 = 1;

/// Capability mask for a parameter or choice.
///
/// Derived from the tool's fixed flag-letter alphabet (`E`, `D`, `F`, `V`,
/// `A`, `S`, `T`, `R`); each letter maps to one boolean by presence, not by
/// column position. A parameter may apply to any combination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Context {
    pub encoding: bool,
    pub decoding: bool,
    pub filtering: bool,
    pub video: bool,
    pub audio: bool,
    pub subtitle: bool,
    pub timeline: bool,
    pub runtime: bool,
}

impl Context {
    /// ORs another context into this one. A capability seen once stays set,
    /// so repeated merges are idempotent.
    pub fn merge_from(&mut self, other: &Context) {
        self.encoding |= other.encoding;
        self.decoding |= other.decoding;
        self.filtering |= other.filtering;
        self.video |= other.video;
        self.audio |= other.audio;
        self.subtitle |= other.subtitle;
        self.timeline |= other.timeline;
        self.runtime |= other.runtime;
    }

    /// True if no capability bit is set.
    pub fn is_empty(&self) -> bool {
        *self == Context::default()
    }
}

/// One enumerable choice belonging to a [`Parameter`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub value: Option<ParamValue>,
    pub description: String,
    pub context: Context,
}

/// One configurable option on a codec, filter, format or global.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Free-form type tag from the help text: `int`, `float`, `flags`,
    /// `rational`, `string`, `binary`, ...
    pub param_type: String,
    pub description: String,
    pub context: Context,
    pub min: Option<ParamValue>,
    pub max: Option<ParamValue>,
    pub default: Option<ParamValue>,
    pub options: BTreeMap<String, Choice>,
}

/// Capability bits of a codec listing entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecFlags {
    pub encoder: bool,
    pub decoder: bool,
    pub video: bool,
    pub audio: bool,
    pub subtitle: bool,
    pub lossy: bool,
}

impl CodecFlags {
    /// ORs another flag set into this one.
    pub fn merge_from(&mut self, other: &CodecFlags) {
        self.encoder |= other.encoder;
        self.decoder |= other.decoder;
        self.video |= other.video;
        self.audio |= other.audio;
        self.subtitle |= other.subtitle;
        self.lossy |= other.lossy;
    }
}

/// A codec (or concrete encoder/decoder handler) and its deep-probed
/// parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Codec {
    pub description: String,
    pub flags: CodecFlags,
    pub parameters: BTreeMap<String, Parameter>,
}

/// Filter capability bits from the listing's three-letter code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterFlags {
    pub timeline: bool,
    pub slice_threading: bool,
    pub command_support: bool,
}

/// A filter, its I/O signature and deep-probed parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub description: String,
    /// Signature contained an `N` pad (dynamic number of inputs/outputs).
    pub is_dynamic: bool,
    /// More than one input or output, or dynamic.
    pub is_complex: bool,
    /// Input pad media kinds: "video", "audio" or "dynamic".
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub flags: FilterFlags,
    pub parameters: BTreeMap<String, Parameter>,
}

/// A container format (muxer and/or demuxer).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Format {
    /// Secondary names from the comma-separated listing entry.
    pub aliases: Vec<String>,
    /// Extensions from the "Common extensions:" help line, without dots.
    pub file_extensions: Vec<String>,
    pub description: String,
    pub is_muxer: bool,
    pub is_demuxer: bool,
    pub parameters: BTreeMap<String, Parameter>,
}

/// A pixel format from the `-pix_fmts` listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelFormat {
    pub num_components: u32,
    pub bits_per_pixel: u32,
    pub bits_per_component: Vec<u32>,
}

/// Global options split by the media kind they apply to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalParameters {
    pub video: BTreeMap<String, Parameter>,
    pub audio: BTreeMap<String, Parameter>,
    pub subtitle: BTreeMap<String, Parameter>,
    pub per_stream: BTreeMap<String, Parameter>,
}

/// Why a persisted cache cannot be used by the running program.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheValidityError {
    /// The cache was written by a different schema revision.
    #[error("cache schema revision {found} does not match expected {expected}")]
    SchemaRevision { expected: u32, found: u32 },

    /// The cache describes a different tool binary.
    #[error("cache was built for a different tool version")]
    ToolVersion,
}

/// Root aggregate of everything the external tool can do.
///
/// Built once by running the five introspection extractors, persisted as a
/// single blob, and consumed read-only afterwards. Validity is all-or-
/// nothing: a version or banner mismatch discards the whole cache.
///
/// # Examples
///
/// ```
/// use ffqueue_core::CapabilityCache;
///
/// let cache = CapabilityCache::new("ffmpeg version 7.1".to_string());
/// assert!(cache.ensure_valid("ffmpeg version 7.1").is_ok());
/// assert!(cache.ensure_valid("ffmpeg version 6.0").is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilityCache {
    /// Schema revision this cache was written with.
    pub cache_version: u32,
    /// Raw version banner of the introspected tool binary.
    pub tool_version_header: String,
    /// RFC 3339 timestamp of the introspection run.
    #[serde(default)]
    pub generated_at: String,
    pub globals: GlobalParameters,
    pub codecs: BTreeMap<String, Codec>,
    pub formats: BTreeMap<String, Format>,
    pub filters: BTreeMap<String, Filter>,
    pub pixel_formats: BTreeMap<String, PixelFormat>,
}

impl CapabilityCache {
    /// Creates an empty cache stamped with the current schema revision and
    /// the given tool version banner.
    pub fn new(tool_version_header: String) -> Self {
        Self {
            cache_version: CACHE_VERSION,
            tool_version_header,
            ..Default::default()
        }
    }

    /// True if this cache may be used against the given tool banner.
    pub fn is_valid_for(&self, banner: &str) -> bool {
        self.ensure_valid(banner).is_ok()
    }

    /// Checks the cache against the running schema revision and the current
    /// tool banner, reporting which of the two failed.
    pub fn ensure_valid(&self, banner: &str) -> Result<(), CacheValidityError> {
        if self.cache_version != CACHE_VERSION {
            return Err(CacheValidityError::SchemaRevision {
                expected: CACHE_VERSION,
                found: self.cache_version,
            });
        }
        if self.tool_version_header != banner {
            return Err(CacheValidityError::ToolVersion);
        }
        Ok(())
    }
}
