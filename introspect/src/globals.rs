//! Global option extraction from the tool's full help dump.
//!
//! `-h full` is one large blob mixing plain option sections ("Video
//! options:", "Advanced Audio options:", ...) with the generic AVOptions
//! grammar. Section headers drive a small state machine; AVOptions
//! parameters are routed to the video/audio/subtitle buckets by their own
//! capability flags, falling back to the per-stream bucket when none apply.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use ffqueue_core::{Context, GlobalParameters, Parameter};

use crate::avoptions;
use crate::error::Result;
use crate::probe::{ProgressFn, ToolRunner};

static STD_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    // Loose single-line pattern for non-AVOptions sections: dash name,
    // optional <type>, free description.
    Regex::new(r"^\s*-([\w:\[\]<>+-]+)(?:\s+(<[^>]*>))?\s+(.*)$")
        .expect("static regex must compile")
});

static STREAM_SPECIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[.*\]").expect("static regex must compile"));

static PARAM_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s{1,4}-?([\w:-]+)\s+<([^>]+)>\s+([EDVASFTR.]{5,})\s*(.*)$")
        .expect("static regex must compile")
});

static CHOICE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s{3,20}([\w_-]+)(?:\s+([-?\w.]+))?\s+([EDVASFTR.]{5,})\s*(.*)$")
        .expect("static regex must compile")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Video,
    Audio,
    Subtitle,
    PerStream,
    AvOptions,
}

fn header_section(header: &str) -> Option<Section> {
    match header {
        "Advanced per-stream options" => Some(Section::PerStream),
        "Video options" | "Advanced Video options" => Some(Section::Video),
        "Audio options" | "Advanced Audio options" => Some(Section::Audio),
        "Subtitle options" | "Advanced Subtitle options" => Some(Section::Subtitle),
        "AVCodecContext AVOptions" => Some(Section::AvOptions),
        _ => None,
    }
}

/// Parses the `-h full` dump into the four global parameter buckets.
pub fn parse_globals(output: &str) -> GlobalParameters {
    let mut globals = GlobalParameters::default();
    let mut section: Option<Section> = None;
    // The AVOptions grammar spreads one parameter over several lines, and
    // routing depends on flags that arrive on the first of them; finished
    // parameters are routed when the next one (or a header) begins.
    let mut pending: Option<(String, Parameter)> = None;

    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        if line.trim_end().ends_with(':') || line.contains("AVOptions") {
            flush_pending(&mut globals, &mut pending);
            let header = line.trim().trim_end_matches(':');
            section = header_section(header);
            continue;
        }

        let Some(current) = section else {
            continue;
        };

        match current {
            Section::AvOptions => {
                if let Some(caps) = PARAM_LINE.captures(line) {
                    flush_pending(&mut globals, &mut pending);
                    let name = STREAM_SPECIFIER.replace_all(&caps[1], "").to_string();
                    let descriptor = avoptions::parse_descriptor(&caps[4]);
                    pending = Some((
                        name,
                        Parameter {
                            param_type: caps[2].to_string(),
                            description: descriptor.description,
                            context: avoptions::parse_context(&caps[3]),
                            min: descriptor.min,
                            max: descriptor.max,
                            default: descriptor.default,
                            options: BTreeMap::new(),
                        },
                    ));
                    continue;
                }
                if line.trim_start().starts_with('-') {
                    continue;
                }
                if let Some((_, parameter)) = pending.as_mut() {
                    if let Some(caps) = CHOICE_LINE.captures(line) {
                        let choice_name = caps[1].to_string();
                        let value_token =
                            caps.get(2).map(|m| m.as_str()).unwrap_or(&choice_name);
                        parameter.options.insert(
                            choice_name.clone(),
                            ffqueue_core::Choice {
                                value: avoptions::coerce_value(value_token),
                                description: caps[4].trim().to_string(),
                                context: avoptions::parse_context(&caps[3]),
                            },
                        );
                    }
                }
            }
            _ => {
                let Some(caps) = STD_PARAM.captures(line) else {
                    continue;
                };
                let name = STREAM_SPECIFIER.replace_all(&caps[1], "").to_string();
                let param_type = caps
                    .get(2)
                    .map(|m| m.as_str().trim_matches(['<', '>']).to_string())
                    .unwrap_or_default();
                let parameter = Parameter {
                    param_type,
                    description: caps[3].trim().to_string(),
                    context: Context::default(),
                    ..Default::default()
                };
                let bucket = match current {
                    Section::Video => &mut globals.video,
                    Section::Audio => &mut globals.audio,
                    Section::Subtitle => &mut globals.subtitle,
                    _ => &mut globals.per_stream,
                };
                disambiguating_insert(bucket, &name, parameter);
            }
        }
    }

    flush_pending(&mut globals, &mut pending);
    globals
}

/// Routes a finished AVOptions parameter into every bucket its capability
/// flags name, or into the per-stream bucket when none apply.
fn flush_pending(globals: &mut GlobalParameters, pending: &mut Option<(String, Parameter)>) {
    let Some((name, parameter)) = pending.take() else {
        return;
    };

    let mut routed = false;
    if parameter.context.video {
        disambiguating_insert(&mut globals.video, &name, parameter.clone());
        routed = true;
    }
    if parameter.context.audio {
        disambiguating_insert(&mut globals.audio, &name, parameter.clone());
        routed = true;
    }
    if parameter.context.subtitle {
        disambiguating_insert(&mut globals.subtitle, &name, parameter.clone());
        routed = true;
    }
    if !routed {
        disambiguating_insert(&mut globals.per_stream, &name, parameter);
    }
}

/// Inserts under `name`, resolving collisions: a same-description, same-type
/// entry is a true duplicate and is dropped; anything else gets a
/// disambiguated key so both versions stay visible.
fn disambiguating_insert(bucket: &mut BTreeMap<String, Parameter>, name: &str, parameter: Parameter) {
    match bucket.get(name) {
        None => {
            bucket.insert(name.to_string(), parameter);
        }
        Some(existing) => {
            if existing.description == parameter.description
                && existing.param_type == parameter.param_type
            {
                return;
            }
            let mut unique = format!("{name} (AV)");
            let mut counter = 1;
            while bucket.contains_key(&unique) {
                unique = format!("{name} (AV-{counter})");
                counter += 1;
            }
            bucket.insert(unique, parameter);
        }
    }
}

/// Runs the globals extractor over one `-h full` invocation.
pub fn extract_globals(
    runner: &dyn ToolRunner,
    progress: Option<ProgressFn>,
) -> Result<GlobalParameters> {
    if let Some(report) = progress {
        report("global options", 0.0);
    }
    let output = runner.run(&["-h", "full"])?;
    Ok(parse_globals(&output))
}
