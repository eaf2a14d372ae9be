//! Tool resolution and invocation.
//!
//! All introspection goes through the [`ToolRunner`] trait so extractor
//! merge logic can be exercised against captured help text in tests; the
//! production implementation is [`FfmpegProbe`].

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

use crate::error::{IntrospectError, Result};

/// Progress callback: `(current item name, fraction in [0, 1])`.
///
/// This is the only coupling point exposed to presentation layers during
/// long-running introspection.
pub type ProgressFn<'a> = &'a (dyn Fn(&str, f64) + Sync);

/// Something that can run the tool with introspection arguments and return
/// its textual output.
pub trait ToolRunner: Sync {
    fn run(&self, args: &[&str]) -> Result<String>;
}

/// Invokes a resolved FFmpeg-compatible binary.
#[derive(Debug, Clone)]
pub struct FfmpegProbe {
    path: PathBuf,
}

impl FfmpegProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolves the named binary and wraps it in a probe. Missing binaries
    /// are an error: there is no degraded mode without the tool.
    pub fn locate(name: &str, custom_dir: Option<&Path>) -> Result<Self> {
        resolve_tool(name, custom_dir)
            .map(Self::new)
            .ok_or_else(|| IntrospectError::ToolNotFound(name.to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs a bare `-version` invocation and returns the banner text used
    /// for cache validity checks.
    pub fn version_banner(&self) -> Result<String> {
        let output = Command::new(&self.path)
            .arg("-version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .trim_end()
            .to_string())
    }
}

impl ToolRunner for FfmpegProbe {
    fn run(&self, args: &[&str]) -> Result<String> {
        debug!(tool = %self.path.display(), ?args, "probing tool");
        let output = Command::new(&self.path)
            .arg("-hide_banner")
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        // Several introspection flags print to stderr; take whichever
        // stream carried the text.
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.is_empty() {
            Ok(String::from_utf8_lossy(&output.stderr).into_owned())
        } else {
            Ok(stdout)
        }
    }
}

/// Resolves a tool binary: an explicit directory first, then the PATH.
pub fn resolve_tool(name: &str, custom_dir: Option<&Path>) -> Option<PathBuf> {
    let file_name = if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_string()
    };

    if let Some(dir) = custom_dir {
        let candidate = dir.join(&file_name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    let path_env = std::env::var_os("PATH")?;
    std::env::split_paths(&path_env)
        .map(|dir| dir.join(&file_name))
        .find(|candidate| candidate.is_file())
}

/// Builds a rayon pool sized for process-spawn-heavy deep probing, with an
/// adaptive cap that avoids oversubscribing large probe sets.
pub(crate) fn probe_pool(item_count: usize) -> rayon::ThreadPool {
    let cpu_count = std::thread::available_parallelism()
        .map(|parallelism| parallelism.get())
        .unwrap_or(4);
    let adaptive_cap = if item_count >= 500 { 8 } else { 12 };
    let threads = cpu_count.min(adaptive_cap).max(1).min(item_count.max(1));
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .expect("failed to build rayon thread pool")
}
