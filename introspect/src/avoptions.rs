//! The shared line grammar for the tool's generic key/value option help.
//!
//! Codec, filter and format help all describe their options with the same
//! two line classes: a parameter line (leading dash, bracketed type token,
//! capability flag run, free-text descriptor) and an indented choice line
//! attached to the most recent parameter. Everything else — section
//! headers, usage notes, blank lines — is skipped; the text belongs to an
//! external project, so the grammar is best-effort against drift.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use ffqueue_core::{Choice, Context, Parameter, ParamValue};

static PATTERNS: LazyLock<AvOptionPatterns> = LazyLock::new(AvOptionPatterns::new);

struct AvOptionPatterns {
    /// 1-4 leading spaces, dash, name, `<type>`, flag run, descriptor.
    param_line: Regex,
    /// 3-20 leading spaces, no dash, name, optional value token, flag run.
    choice_line: Regex,
    /// `... AVOptions:` section banner.
    section_header: Regex,
    range_min: Regex,
    range_max: Regex,
    default_value: Regex,
    range_span: Regex,
    default_span: Regex,
    flag_echo: Regex,
}

impl AvOptionPatterns {
    fn new() -> Self {
        // All regexes here are compile-time constants. An expect() failure
        // indicates a programmer error in the pattern, not a runtime
        // condition.
        Self {
            param_line: Regex::new(r"^\s{1,4}-?([\w:-]+)\s+<([^>]+)>\s+([EDVASFTR.]{5,})\s*(.*)$")
                .expect("static regex must compile"),
            choice_line: Regex::new(
                r"^\s{3,20}([\w_-]+)(?:\s+([-?\w.]+))?\s+([EDVASFTR.]{5,})\s*(.*)$",
            )
            .expect("static regex must compile"),
            section_header: Regex::new(r"^([\w\s()2]+)\s+AVOptions:$")
                .expect("static regex must compile"),
            range_min: Regex::new(r"\(from\s+(-?[\w./]+)").expect("static regex must compile"),
            range_max: Regex::new(r"to\s+(-?[\w./]+)(?:\)|,)").expect("static regex must compile"),
            default_value: Regex::new(r"default\s+(-?[\w./]+)\)")
                .expect("static regex must compile"),
            range_span: Regex::new(r"\(from.*?to.*?\)").expect("static regex must compile"),
            default_span: Regex::new(r"\(default.*?\)").expect("static regex must compile"),
            flag_echo: Regex::new(r"^[EDVASFTR.]{5,}\s+").expect("static regex must compile"),
        }
    }
}

/// Range/default annotations and the cleaned description of a parameter
/// line's free-text remainder.
#[derive(Debug, Default, PartialEq)]
pub struct Descriptor {
    pub description: String,
    pub min: Option<ParamValue>,
    pub max: Option<ParamValue>,
    pub default: Option<ParamValue>,
}

/// Parses one help-text blob into a parameter map.
///
/// Stateful over one key: choice lines attach to the most recent parameter
/// line. A parameter line seen twice overwrites the earlier entry; a choice
/// line whose trimmed form starts with a dash is a failed parameter match
/// and is discarded rather than misfiled.
pub fn parse_av_options(output: &str) -> BTreeMap<String, Parameter> {
    let mut parameters = BTreeMap::new();
    let mut current_key: Option<String> = None;

    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        if PATTERNS.section_header.is_match(line) {
            continue;
        }

        if let Some(caps) = PATTERNS.param_line.captures(line) {
            let name = caps[1].to_string();
            let descriptor = parse_descriptor(&caps[4]);
            parameters.insert(
                name.clone(),
                Parameter {
                    param_type: caps[2].to_string(),
                    description: descriptor.description,
                    context: parse_context(&caps[3]),
                    min: descriptor.min,
                    max: descriptor.max,
                    default: descriptor.default,
                    options: BTreeMap::new(),
                },
            );
            current_key = Some(name);
            continue;
        }

        // A dash here means a parameter line the grammar rejected; filing
        // it as a choice would corrupt the schema.
        if line.trim_start().starts_with('-') {
            continue;
        }

        let Some(key) = current_key.as_deref() else {
            continue;
        };
        if let Some(caps) = PATTERNS.choice_line.captures(line) {
            let choice_name = caps[1].to_string();
            let value_token = caps.get(2).map(|m| m.as_str()).unwrap_or(&choice_name);
            let choice = Choice {
                value: coerce_value(value_token),
                description: caps[4].trim().to_string(),
                context: parse_context(&caps[3]),
            };
            if let Some(parent) = parameters.get_mut(key) {
                parent.options.insert(choice_name, choice);
            }
        }
    }

    parameters
}

/// Extracts `(from MIN to MAX)` / `(default DEF)` annotations and strips
/// them (plus any leading flag-run echo) from the description.
pub fn parse_descriptor(raw: &str) -> Descriptor {
    let min = PATTERNS
        .range_min
        .captures(raw)
        .and_then(|c| coerce_value(&c[1]));
    let max = PATTERNS
        .range_max
        .captures(raw)
        .and_then(|c| coerce_value(&c[1]));
    let default = PATTERNS
        .default_value
        .captures(raw)
        .and_then(|c| coerce_value(&c[1]));

    let clean = PATTERNS.range_span.replace_all(raw, "");
    let clean = PATTERNS.default_span.replace_all(&clean, "");
    let clean = PATTERNS.flag_echo.replace(clean.trim(), "");

    Descriptor {
        description: clean.trim().to_string(),
        min,
        max,
        default,
    }
}

/// Maps a capability flag run onto [`Context`] booleans by letter presence.
///
/// Presence, not column position: minor column drift between tool versions
/// does not change the result.
pub fn parse_context(flags: &str) -> Context {
    if flags.len() < 5 {
        return Context::default();
    }
    Context {
        encoding: flags.contains('E'),
        decoding: flags.contains('D'),
        filtering: flags.contains('F'),
        video: flags.contains('V'),
        audio: flags.contains('A'),
        subtitle: flags.contains('S'),
        timeline: flags.contains('T'),
        runtime: flags.contains('R'),
    }
}

/// Coerces a textual value into the closed [`ParamValue`] union.
///
/// Precedence: named limit table (case-insensitive) → hex literal →
/// rational → integer → float → fallback text. The order matters: a bare
/// `auto` must resolve through the limit table before falling through to
/// text.
pub fn coerce_value(raw: &str) -> Option<ParamValue> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Some(limit) = named_limit(value) {
        return Some(limit);
    }

    if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        if let Ok(parsed) = i64::from_str_radix(hex, 16) {
            return Some(ParamValue::Int(parsed));
        }
    }

    if value.contains('/') {
        let parts: Vec<&str> = value.split('/').collect();
        if let [numerator, denominator] = parts.as_slice() {
            if let (Ok(n), Ok(d)) = (numerator.parse::<f64>(), denominator.parse::<f64>()) {
                return Some(ParamValue::Float(if d != 0.0 { n / d } else { 0.0 }));
            }
        }
    }

    if let Ok(parsed) = value.parse::<i64>() {
        return Some(ParamValue::Int(parsed));
    }

    if let Ok(parsed) = value.parse::<f64>() {
        return Some(ParamValue::Float(parsed));
    }

    Some(ParamValue::Text(value.to_string()))
}

fn named_limit(value: &str) -> Option<ParamValue> {
    let limit = match value.to_ascii_lowercase().as_str() {
        "int_min" => ParamValue::Int(-2147483648),
        "int_max" => ParamValue::Int(2147483647),
        "uint32_max" => ParamValue::Int(4294967295),
        "i64_min" => ParamValue::Int(i64::MIN),
        "i64_max" => ParamValue::Int(i64::MAX),
        "flt_max" => ParamValue::Float(3.402823466e38),
        "dbl_max" => ParamValue::Float(f64::MAX),
        "auto" => ParamValue::Int(-1),
        "none" => ParamValue::Int(0),
        "disable" => ParamValue::Int(0),
        "false" => ParamValue::Int(0),
        "true" => ParamValue::Int(1),
        _ => return None,
    };
    Some(limit)
}

/// True if a deep-probe response carries usable option text.
///
/// Empty output and "Unknown ..." markers both mean the probe contributes
/// nothing, without failing the extractor.
pub fn is_probe_usable(text: &str) -> bool {
    !text.trim().is_empty() && !text.contains("Unknown")
}
