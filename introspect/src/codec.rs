//! Codec extraction: the `-codecs` listing plus per-codec deep probes.
//!
//! The listing is the tricky part: one line may describe a family label
//! whose concrete handlers are hidden in bracketed `(decoders: ...)` /
//! `(encoders: ...)` groups. Each named handler becomes its own entry; the
//! family label keeps only its media flags and is deleted after the listing
//! if no encode or decode capability ever landed on it.

use rayon::prelude::*;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use ffqueue_core::{Codec, CodecFlags, Parameter, merge_parameters};

use crate::avoptions::{is_probe_usable, parse_av_options};
use crate::error::Result;
use crate::probe::{ProgressFn, ToolRunner, probe_pool};

static CODEC_LINE: LazyLock<Regex> = LazyLock::new(|| {
    // Six-character capability code, name, free-text description.
    Regex::new(r"^\s([DEVASTIL.]{6})\s+([\w-]+)\s+(.*)$").expect("static regex must compile")
});

static HANDLER_GROUPS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\((decoders|encoders):\s*([^)]+)\)").expect("static regex must compile")
});

struct HandlerRef {
    name: String,
    is_decoder: bool,
    is_encoder: bool,
}

/// Parses the `-codecs` listing into a codec map, splitting bracketed
/// handler groups into their own entries and eliminating rogue family
/// labels that end up with neither encode nor decode capability.
pub fn parse_codec_listing(output: &str) -> BTreeMap<String, Codec> {
    let mut codecs = BTreeMap::new();
    let mut rogue_candidates = BTreeSet::new();

    for line in output.lines() {
        let Some(caps) = CODEC_LINE.captures(line) else {
            continue;
        };
        let flag_code = &caps[1];
        let name = &caps[2];
        let full_description = &caps[3];

        let decoder = flag_code.as_bytes()[0] == b'D';
        let encoder = flag_code.as_bytes()[1] == b'E';
        let description = full_description
            .split('(')
            .next()
            .unwrap_or("")
            .trim()
            .to_string();

        let handlers = parse_handler_groups(full_description);
        if handlers.is_empty() {
            upsert_codec(
                &mut codecs,
                name,
                &description,
                listing_flags(flag_code, decoder, encoder),
            );
        } else {
            // The nominal name keeps its media flags but earns encode or
            // decode capability only by appearing among the handlers.
            upsert_codec(
                &mut codecs,
                name,
                &description,
                listing_flags(flag_code, false, false),
            );
            for handler in &handlers {
                upsert_codec(
                    &mut codecs,
                    &handler.name,
                    &description,
                    listing_flags(flag_code, handler.is_decoder, handler.is_encoder),
                );
            }
            if !handlers.iter().any(|h| h.name == name) {
                rogue_candidates.insert(name.to_string());
            }
        }
    }

    for name in rogue_candidates {
        let has_capability = codecs
            .get(&name)
            .map(|codec| codec.flags.encoder || codec.flags.decoder)
            .unwrap_or(false);
        if !has_capability {
            debug!(codec = %name, "removing rogue codec entry");
            codecs.remove(&name);
        }
    }

    codecs
}

fn listing_flags(flag_code: &str, decoder: bool, encoder: bool) -> CodecFlags {
    let media = flag_code.as_bytes()[2];
    CodecFlags {
        encoder,
        decoder,
        video: media == b'V',
        audio: media == b'A',
        subtitle: media == b'S',
        lossy: flag_code.as_bytes()[4] == b'L',
    }
}

fn upsert_codec(map: &mut BTreeMap<String, Codec>, name: &str, description: &str, flags: CodecFlags) {
    match map.get_mut(name) {
        Some(existing) => existing.flags.merge_from(&flags),
        None => {
            map.insert(
                name.to_string(),
                Codec {
                    description: description.to_string(),
                    flags,
                    parameters: BTreeMap::new(),
                },
            );
        }
    }
}

fn parse_handler_groups(description: &str) -> Vec<HandlerRef> {
    let mut handlers = Vec::new();
    for caps in HANDLER_GROUPS.captures_iter(description) {
        let is_decoder = &caps[1] == "decoders";
        let is_encoder = &caps[1] == "encoders";
        for name in caps[2].split_whitespace() {
            handlers.push(HandlerRef {
                name: name.to_string(),
                is_decoder,
                is_encoder,
            });
        }
    }
    handlers
}

fn probe_side(
    runner: &dyn ToolRunner,
    name: &str,
    side: &str,
) -> Option<BTreeMap<String, Parameter>> {
    let selector = format!("{side}={name}");
    let help = match runner.run(&["-h", &selector]) {
        Ok(text) => text,
        Err(err) => {
            debug!(codec = name, side, %err, "deep probe failed");
            return None;
        }
    };
    if !is_probe_usable(&help) {
        return None;
    }
    Some(parse_av_options(&help))
}

/// Runs the codec extractor: listing pass, rogue elimination, then a
/// parallel deep probe of every surviving codec's encoder and decoder help.
pub fn extract_codecs(
    runner: &dyn ToolRunner,
    progress: Option<ProgressFn>,
) -> Result<BTreeMap<String, Codec>> {
    let listing = runner.run(&["-codecs"])?;
    let mut codecs = parse_codec_listing(&listing);

    let names: Vec<String> = codecs.keys().cloned().collect();
    let total = names.len().max(1);
    let completed = AtomicUsize::new(0);
    let pool = probe_pool(names.len());

    let probed: Vec<(String, Option<_>, Option<_>)> = pool.install(|| {
        names
            .par_iter()
            .map(|name| {
                let flags = codecs[name].flags;
                let encoder_params = flags
                    .encoder
                    .then(|| probe_side(runner, name, "encoder"))
                    .flatten();
                let decoder_params = flags
                    .decoder
                    .then(|| probe_side(runner, name, "decoder"))
                    .flatten();
                let done = completed.fetch_add(1, Ordering::Relaxed);
                if let Some(report) = progress {
                    report(name, done as f64 / total as f64);
                }
                (name.clone(), encoder_params, decoder_params)
            })
            .collect()
    });

    for (name, encoder_params, decoder_params) in probed {
        let Some(codec) = codecs.get_mut(&name) else {
            continue;
        };
        if let Some(params) = encoder_params {
            merge_parameters(&mut codec.parameters, params);
        }
        if let Some(params) = decoder_params {
            merge_parameters(&mut codec.parameters, params);
        }
    }

    Ok(codecs)
}
