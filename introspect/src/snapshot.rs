//! Capability cache assembly, persistence, and the validate-or-rebuild
//! entry point.
//!
//! The cache is a single gzip-compressed JSON blob. Validity is
//! all-or-nothing: any load failure or version/banner mismatch is treated
//! as a full cache miss and triggers re-introspection of all five domains.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

use ffqueue_core::CapabilityCache;

use crate::error::Result;
use crate::probe::{FfmpegProbe, ProgressFn, ToolRunner};
use crate::{codec, filter, format, globals, pixfmt};

/// Runs all five extractors and assembles a freshly stamped cache.
///
/// Progress fractions are apportioned the way the introspection actually
/// costs: globals and pixel formats are single invocations, while filters,
/// formats and codecs each deep-probe hundreds of entries.
pub fn build_cache(
    runner: &dyn ToolRunner,
    banner: &str,
    progress: Option<ProgressFn>,
) -> Result<CapabilityCache> {
    let report = |name: &str, fraction: f64| {
        if let Some(callback) = progress {
            callback(name, fraction);
        }
    };

    let mut cache = CapabilityCache::new(banner.to_string());
    cache.generated_at = chrono::Utc::now().to_rfc3339();

    report("global options", 0.05);
    cache.globals = globals::extract_globals(runner, None)?;

    report("pixel formats", 0.01);
    cache.pixel_formats = pixfmt::extract_pixel_formats(runner, None)?;

    let filter_progress = |name: &str, p: f64| report(name, 0.01 + p * 0.33);
    cache.filters = filter::extract_filters(runner, Some(&filter_progress))?;

    let format_progress = |name: &str, p: f64| report(name, 0.34 + p * 0.33);
    cache.formats = format::extract_formats(runner, Some(&format_progress))?;

    let codec_progress = |name: &str, p: f64| report(name, 0.67 + p * 0.33);
    cache.codecs = codec::extract_codecs(runner, Some(&codec_progress))?;

    info!(
        codecs = cache.codecs.len(),
        formats = cache.formats.len(),
        filters = cache.filters.len(),
        pixel_formats = cache.pixel_formats.len(),
        "capability introspection complete"
    );
    Ok(cache)
}

/// Serializes the cache to a gzip-compressed JSON blob.
pub fn save_to_file(cache: &CapabilityCache, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    serde_json::to_writer(&mut encoder, cache)?;
    let mut inner = encoder.finish()?;
    inner.flush()?;
    Ok(())
}

/// Deserializes a cache blob. Any failure is a cache miss for the caller.
pub fn load_from_file(path: &Path) -> Result<CapabilityCache> {
    let file = File::open(path)?;
    let decoder = GzDecoder::new(BufReader::new(file));
    Ok(serde_json::from_reader(decoder)?)
}

/// Loads a valid persisted cache, or rebuilds it by re-running the full
/// introspection and persisting the result.
///
/// The persisted cache is only trusted when its schema revision matches the
/// running program and its banner matches the tool binary that is actually
/// resolved right now; `force` skips the load entirely.
pub fn load_or_rebuild(
    path: &Path,
    probe: &FfmpegProbe,
    force: bool,
    progress: Option<ProgressFn>,
) -> Result<CapabilityCache> {
    let banner = probe.version_banner()?;

    if !force {
        match load_from_file(path) {
            Ok(cache) => {
                if cache.is_valid_for(&banner) {
                    debug!(path = %path.display(), "using persisted capability cache");
                    return Ok(cache);
                }
                debug!(path = %path.display(), "persisted cache is stale, rebuilding");
            }
            Err(err) => {
                debug!(path = %path.display(), %err, "cache load failed, rebuilding");
            }
        }
    }

    let cache = build_cache(probe, &banner, progress)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    save_to_file(&cache, path)?;
    Ok(cache)
}
