//! Filter extraction: the `-filters` listing plus per-filter deep probes.

use rayon::prelude::*;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use ffqueue_core::{Filter, FilterFlags, Parameter};

use crate::avoptions::{is_probe_usable, parse_av_options};
use crate::error::Result;
use crate::probe::{ProgressFn, ToolRunner, probe_pool};

static FILTER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    // Three-letter capability code, name, I/O signature like `VV->V`.
    Regex::new(r"^\s([T.][S.][C.]?)\s+([\w-]+)\s+([AVN|]*->[AVN|]*)\s+(.*)$")
        .expect("static regex must compile")
});

/// Parses the `-filters` listing. Parameters are filled in later by the
/// deep probe.
pub fn parse_filter_listing(output: &str) -> BTreeMap<String, Filter> {
    let mut filters = BTreeMap::new();

    for line in output.lines() {
        let Some(caps) = FILTER_LINE.captures(line) else {
            continue;
        };
        let flag_code = &caps[1];
        let name = &caps[2];
        let signature = &caps[3];
        let description = caps[4].trim().to_string();

        let (raw_inputs, raw_outputs) = signature.split_once("->").unwrap_or((signature, ""));
        let inputs = map_io_kinds(raw_inputs);
        let outputs = map_io_kinds(raw_outputs);

        let is_dynamic = signature.contains('N');
        let is_complex = inputs.len() > 1 || outputs.len() > 1 || is_dynamic;

        filters.insert(
            name.to_string(),
            Filter {
                description,
                is_dynamic,
                is_complex,
                inputs,
                outputs,
                flags: FilterFlags {
                    timeline: flag_code.contains('T'),
                    slice_threading: flag_code.contains('S'),
                    command_support: flag_code.contains('C'),
                },
                parameters: BTreeMap::new(),
            },
        );
    }

    filters
}

fn map_io_kinds(raw: &str) -> Vec<String> {
    raw.chars()
        .filter_map(|c| match c {
            'V' => Some("video".to_string()),
            'A' => Some("audio".to_string()),
            'N' => Some("dynamic".to_string()),
            _ => None,
        })
        .collect()
}

/// The tool exposes the same semantic switch under both `flags` and
/// `sws_flags` for the scale filter only; the choice set is folded into
/// `flags` and the alias dropped.
pub fn apply_scale_alias_quirk(name: &str, parameters: &mut BTreeMap<String, Parameter>) {
    if name != "scale" {
        return;
    }
    if !parameters.contains_key("flags") {
        return;
    }
    if let Some(sws_flags) = parameters.remove("sws_flags") {
        if let Some(flags) = parameters.get_mut("flags") {
            flags.options = sws_flags.options;
            flags.param_type = "flags".to_string();
        }
    }
}

/// Runs the filter extractor: listing pass, then a parallel deep probe of
/// every filter's help text.
pub fn extract_filters(
    runner: &dyn ToolRunner,
    progress: Option<ProgressFn>,
) -> Result<BTreeMap<String, Filter>> {
    let listing = runner.run(&["-filters"])?;
    let mut filters = parse_filter_listing(&listing);

    let names: Vec<String> = filters.keys().cloned().collect();
    let total = names.len().max(1);
    let completed = AtomicUsize::new(0);
    let pool = probe_pool(names.len());

    let probed: Vec<(String, Option<BTreeMap<String, Parameter>>)> = pool.install(|| {
        names
            .par_iter()
            .map(|name| {
                let selector = format!("filter={name}");
                let params = match runner.run(&["-h", &selector]) {
                    Ok(help) if is_probe_usable(&help) => {
                        let mut params = parse_av_options(&help);
                        apply_scale_alias_quirk(name, &mut params);
                        Some(params)
                    }
                    Ok(_) => None,
                    Err(err) => {
                        debug!(filter = %name, %err, "deep probe failed");
                        None
                    }
                };
                let done = completed.fetch_add(1, Ordering::Relaxed);
                if let Some(report) = progress {
                    report(name, done as f64 / total as f64);
                }
                (name.clone(), params)
            })
            .collect()
    });

    for (name, params) in probed {
        if let (Some(filter), Some(params)) = (filters.get_mut(&name), params) {
            filter.parameters = params;
        }
    }

    Ok(filters)
}
