//! Container format extraction: the `-formats` listing plus muxer/demuxer
//! deep probes.

use rayon::prelude::*;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use ffqueue_core::Format;

use crate::avoptions::{is_probe_usable, parse_av_options};
use crate::error::Result;
use crate::probe::{ProgressFn, ToolRunner, probe_pool};

static FORMAT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    // Demuxer flag, muxer flag, comma-separated name list, description.
    Regex::new(r"^\s([D\s])([E\s])\s+([\w,]+)\s+(.*)$").expect("static regex must compile")
});

static EXTENSIONS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Common extensions:\s+([\w,.]+)").expect("static regex must compile")
});

/// Parses the `-formats` listing. The first name of a comma-separated entry
/// is the primary key; the rest become aliases. A primary name appearing on
/// several lines OR-merges its muxer/demuxer capabilities.
pub fn parse_format_listing(output: &str) -> BTreeMap<String, Format> {
    let mut formats: BTreeMap<String, Format> = BTreeMap::new();

    for line in output.lines() {
        let Some(caps) = FORMAT_LINE.captures(line) else {
            continue;
        };
        let is_demuxer = &caps[1] == "D";
        let is_muxer = &caps[2] == "E";
        let names: Vec<&str> = caps[3].split(',').collect();
        let description = caps[4].trim().to_string();
        let Some(primary) = names.first() else {
            continue;
        };

        match formats.get_mut(*primary) {
            Some(existing) => {
                existing.is_demuxer |= is_demuxer;
                existing.is_muxer |= is_muxer;
            }
            None => {
                formats.insert(
                    (*primary).to_string(),
                    Format {
                        aliases: names[1..].iter().map(|s| (*s).to_string()).collect(),
                        file_extensions: Vec::new(),
                        description,
                        is_muxer,
                        is_demuxer,
                        parameters: BTreeMap::new(),
                    },
                );
            }
        }
    }

    formats
}

/// Pulls the "Common extensions" list out of deep-probe help text,
/// stripping a trailing dot per extension.
pub fn parse_extensions(help: &str) -> Vec<String> {
    EXTENSIONS
        .captures(help)
        .map(|caps| {
            caps[1]
                .split(',')
                .filter(|e| !e.is_empty())
                .map(|e| e.trim().trim_end_matches('.').to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Runs the format extractor: listing pass, then a parallel deep probe of
/// muxer and/or demuxer help per format, depending on which capability the
/// listing reported.
pub fn extract_formats(
    runner: &dyn ToolRunner,
    progress: Option<ProgressFn>,
) -> Result<BTreeMap<String, Format>> {
    let listing = runner.run(&["-formats"])?;
    let mut formats = parse_format_listing(&listing);

    let entries: Vec<(String, bool, bool)> = formats
        .iter()
        .map(|(name, fmt)| (name.clone(), fmt.is_muxer, fmt.is_demuxer))
        .collect();
    let total = entries.len().max(1);
    let completed = AtomicUsize::new(0);
    let pool = probe_pool(entries.len());

    let probed: Vec<(String, String)> = pool.install(|| {
        entries
            .par_iter()
            .map(|(name, is_muxer, is_demuxer)| {
                let mut combined = String::new();
                if *is_muxer {
                    combined.push_str(&run_help(runner, "muxer", name));
                }
                if *is_demuxer {
                    combined.push('\n');
                    combined.push_str(&run_help(runner, "demuxer", name));
                }
                let done = completed.fetch_add(1, Ordering::Relaxed);
                if let Some(report) = progress {
                    report(name, done as f64 / total as f64);
                }
                (name.clone(), combined)
            })
            .collect()
    });

    for (name, combined) in probed {
        if !is_probe_usable(&combined) {
            continue;
        }
        if let Some(format) = formats.get_mut(&name) {
            format.parameters = parse_av_options(&combined);
            format.file_extensions = parse_extensions(&combined);
        }
    }

    Ok(formats)
}

fn run_help(runner: &dyn ToolRunner, side: &str, name: &str) -> String {
    let selector = format!("{side}={name}");
    match runner.run(&["-h", &selector]) {
        Ok(help) => help,
        Err(err) => {
            debug!(format = %name, side, %err, "deep probe failed");
            String::new()
        }
    }
}
