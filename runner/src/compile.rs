//! Pure compilation of a declared job into the tool's argument vector.
//!
//! Ordering constraints are the whole game here: time offsets must precede
//! their `-i`, map directives reference input ordinals assigned during the
//! input phase, and stream-scoped flags carry `:<kind>:<ordinal>` output
//! specifiers counted per media kind. Everything iterates ordered
//! collections, so compiling the same job against the same cache twice is
//! byte-identical.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ffqueue_core::time::parse_duration;
use ffqueue_core::{CapabilityCache, FilterSpec, FilterValue, Job, ParamValue, Stream, StreamKind};

/// Option keys that are global tool flags rather than stream-scoped ones;
/// they are emitted bare even when they arrive via encoder parameters.
const GLOBAL_OPTIONS: &[&str] = &[
    "y", "n", "stats", "loglevel", "threads", "f", "t", "to", "ss", "re", "discard", "benchmark",
];

/// One `-i` invocation: a (source, delay) pair and the streams it feeds.
struct InputGroup {
    source_idx: usize,
    delay: String,
    stream_indices: Vec<u32>,
}

/// Compiles a job against the capability cache.
///
/// In preview mode the output is a raw streaming container on stdout and
/// filtered streams are decoded to raw formats; in normal mode the job's
/// multiplexer, muxer parameters and collision-free output path are
/// appended along with machine-readable progress reporting.
pub fn compile_command(job: &Job, cache: &CapabilityCache, for_preview: bool) -> Vec<String> {
    let mut cmd: Vec<String> = vec!["-y".to_string(), "-hide_banner".to_string()];

    // Phase 1: inputs. Active streams of a source are partitioned by their
    // delay string; each distinct delay becomes one tool input whose
    // ordinal is the index every later map directive refers to.
    let mut input_groups: Vec<InputGroup> = Vec::new();
    for (source_idx, source) in job.sources.iter().enumerate() {
        let active: Vec<&Stream> = source.active_streams().collect();
        if active.is_empty() {
            continue;
        }

        let mut delays: Vec<String> = Vec::new();
        for stream in &active {
            let delay = normalized_delay(&stream.delay);
            if !delays.contains(&delay) {
                delays.push(delay);
            }
        }

        for delay in delays {
            if parse_duration(&delay).unwrap_or(0.0) > 0.0 {
                cmd.push("-itsoffset".to_string());
                cmd.push(delay.clone());
            }
            cmd.push("-i".to_string());
            cmd.push(source.file_name.clone());

            let stream_indices = active
                .iter()
                .filter(|s| normalized_delay(&s.delay) == delay)
                .map(|s| s.index)
                .collect();
            input_groups.push(InputGroup {
                source_idx,
                delay,
                stream_indices,
            });
        }
    }

    // Phase 2: per-stream mapping, in (source, stream) order.
    let mut kind_counters: BTreeMap<char, usize> = BTreeMap::new();
    for (source_idx, stream) in job.active_streams() {
        let letter = stream.kind.specifier_letter();
        let ordinal = kind_counters.entry(letter).or_insert(0);
        let specifier = format!(":{letter}:{ordinal}");
        *ordinal += 1;

        let input_idx = input_index(source_idx, stream, &input_groups);
        cmd.push("-map".to_string());
        cmd.push(format!("{input_idx}:{}", stream.index));

        if !stream.language.is_empty() {
            cmd.push(format!("-metadata:s{specifier}"));
            cmd.push(format!("language={}", stream.language));
        }
        for (key, value) in &stream.metadata {
            cmd.push(format!("-metadata:s{specifier}"));
            cmd.push(format!("{key}={value}"));
        }

        if !stream.trim.start.is_empty() {
            cmd.push(format!("-ss{specifier}"));
            cmd.push(stream.trim.start.clone());
        }
        if !stream.trim.length.is_empty() {
            cmd.push(format!("-t{specifier}"));
            cmd.push(stream.trim.length.clone());
        } else if !stream.trim.end.is_empty() {
            cmd.push(format!("-to{specifier}"));
            cmd.push(stream.trim.end.clone());
        }

        if for_preview {
            // A filtered stream cannot be copied; decode it to a raw format
            // the preview player accepts.
            let codec = if stream.encoder.filters.is_empty() {
                "copy"
            } else {
                match stream.kind {
                    StreamKind::Video => "rawvideo",
                    StreamKind::Audio => "pcm_s16le",
                    _ => "copy",
                }
            };
            cmd.push(format!("-c{specifier}"));
            cmd.push(codec.to_string());
        } else {
            cmd.push(format!("-c{specifier}"));
            cmd.push(if stream.encoder.encoder.is_empty() {
                "copy".to_string()
            } else {
                stream.encoder.encoder.clone()
            });

            for (key, value) in &stream.encoder.parameters {
                if GLOBAL_OPTIONS.contains(&key.as_str()) {
                    cmd.push(format!("-{key}"));
                } else {
                    cmd.push(format!("-{key}{specifier}"));
                }
                cmd.push(render_param_value(value));
            }
        }

        if !stream.encoder.filters.is_empty() {
            let chain = build_filter_chain(&stream.encoder.filters);
            if !chain.is_empty() {
                cmd.push(format!("-filter{specifier}"));
                cmd.push(chain);
            }
        }

        if !stream.disposition.is_empty() {
            cmd.push(format!("-disposition{specifier}"));
            cmd.push(stream.disposition.join("+"));
        }
    }

    // Phase 3: output.
    if for_preview {
        cmd.push("-f".to_string());
        cmd.push("nut".to_string());
        cmd.push("-".to_string());
    } else {
        cmd.push("-progress".to_string());
        cmd.push("pipe:1".to_string());

        let muxer = if job.multiplexer.is_empty() {
            job.sources
                .first()
                .map(|s| s.demuxer.clone())
                .unwrap_or_default()
        } else {
            job.multiplexer.clone()
        };
        if !muxer.is_empty() {
            cmd.push("-f".to_string());
            cmd.push(muxer.clone());
        }

        for (key, value) in &job.muxer_parameters {
            cmd.push(format!("-{key}"));
            cmd.push(render_param_value(value));
        }

        let resolved = resolve_output_path(job, cache, &muxer);
        if !resolved.is_empty() {
            cmd.push(resolved);
        }
    }

    cmd
}

fn normalized_delay(delay: &str) -> String {
    if delay.is_empty() {
        "0".to_string()
    } else {
        delay.to_string()
    }
}

fn input_index(source_idx: usize, stream: &Stream, groups: &[InputGroup]) -> usize {
    let delay = normalized_delay(&stream.delay);
    groups
        .iter()
        .position(|g| {
            g.source_idx == source_idx
                && g.delay == delay
                && g.stream_indices.contains(&stream.index)
        })
        .unwrap_or(0)
}

/// Renders a parameter value as an argument, normalizing boolean words to
/// the tool's "1"/"0" spelling.
fn render_param_value(value: &ParamValue) -> String {
    let rendered = value.to_string();
    if rendered.eq_ignore_ascii_case("true") {
        "1".to_string()
    } else if rendered.eq_ignore_ascii_case("false") {
        "0".to_string()
    } else {
        rendered
    }
}

/// Joins filter specs into one chain: `name` or `name=k=v:k=v`, filters
/// separated by commas.
fn build_filter_chain(filters: &[FilterSpec]) -> String {
    filters
        .iter()
        .map(|filter| {
            if filter.parameters.is_empty() {
                filter.name.clone()
            } else {
                let rendered: Vec<String> = filter
                    .parameters
                    .iter()
                    .map(|(key, value)| format!("{key}={}", render_filter_value(value)))
                    .collect();
                format!("{}={}", filter.name, rendered.join(":"))
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn render_filter_value(value: &FilterValue) -> String {
    match value {
        FilterValue::Text(text) => text.clone(),
        FilterValue::List(items) => items.join("|"),
        FilterValue::Map(map) => map
            .iter()
            .map(|(key, value)| format!("{key}={}", render_filter_value(value)))
            .collect::<Vec<_>>()
            .join(":"),
    }
}

/// Resolves the final output path: explicit name (with the extension
/// inferred from the chosen muxer when the name has none), else the first
/// source's stem, suffixed with an increasing number until a free file name
/// is found.
fn resolve_output_path(job: &Job, cache: &CapabilityCache, muxer: &str) -> String {
    let Some(first_source) = job.sources.first() else {
        return String::new();
    };
    let source_path = Path::new(&first_source.file_name);

    let dir: PathBuf = if job.output_directory.is_empty() {
        source_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    } else {
        PathBuf::from(&job.output_directory)
    };

    let mut extension = if muxer.is_empty() {
        String::new()
    } else {
        cache
            .formats
            .get(muxer)
            .and_then(|format| format.file_extensions.first())
            .cloned()
            .unwrap_or_default()
    };

    let mut file_name = job.output_file_name.clone();
    if file_name.is_empty() {
        file_name = source_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
    } else {
        let name_path = Path::new(&job.output_file_name);
        if let Some(explicit) = name_path.extension() {
            extension = explicit.to_string_lossy().into_owned();
            if let Some(stem) = name_path.file_stem() {
                file_name = stem.to_string_lossy().into_owned();
            }
        }
    }

    if !extension.is_empty() && !extension.starts_with('.') {
        extension = format!(".{extension}");
    }

    let stem = dir.join(&file_name);
    let mut candidate = PathBuf::from(format!("{}{extension}", stem.display()));
    let mut counter: u64 = 0;
    while candidate.exists() {
        counter += 1;
        candidate = PathBuf::from(format!("{}{counter}{extension}", stem.display()));
    }
    candidate.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ffqueue_core::{EncoderSettings, Format, Source, Trim};
    use std::collections::BTreeMap;

    fn stream(index: u32, kind: StreamKind) -> Stream {
        Stream {
            active: true,
            index,
            kind,
            duration: 60.0,
            ..Default::default()
        }
    }

    fn cache_with_mp4() -> CapabilityCache {
        let mut cache = CapabilityCache::new("test".to_string());
        cache.formats.insert(
            "mp4".to_string(),
            Format {
                file_extensions: vec!["mp4".to_string()],
                is_muxer: true,
                ..Default::default()
            },
        );
        cache
    }

    fn basic_job(dir: &str) -> Job {
        Job {
            sources: vec![Source {
                file_name: format!("{dir}/movie.mkv"),
                demuxer: "matroska".to_string(),
                streams: vec![stream(0, StreamKind::Video), stream(1, StreamKind::Audio)],
                ..Default::default()
            }],
            multiplexer: "mp4".to_string(),
            output_directory: dir.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn compilation_is_deterministic() {
        let cache = cache_with_mp4();
        let mut job = basic_job("/nonexistent");
        job.sources[0].streams[0].encoder = EncoderSettings {
            encoder: "libx264".to_string(),
            parameters: BTreeMap::from([
                ("crf".to_string(), ParamValue::Int(23)),
                ("preset".to_string(), ParamValue::Text("slow".to_string())),
            ]),
            ..Default::default()
        };

        let first = compile_command(&job, &cache, false);
        let second = compile_command(&job, &cache, false);
        assert_eq!(first, second);
    }

    #[test]
    fn unconditional_flags_come_first() {
        let cache = cache_with_mp4();
        let cmd = compile_command(&basic_job("/nonexistent"), &cache, false);
        assert_eq!(&cmd[..2], &["-y".to_string(), "-hide_banner".to_string()]);
    }

    #[test]
    fn streams_map_with_per_kind_ordinals() {
        let cache = cache_with_mp4();
        let mut job = basic_job("/nonexistent");
        job.sources[0]
            .streams
            .push(stream(2, StreamKind::Video));

        let cmd = compile_command(&job, &cache, false);
        // Second video stream gets ordinal 1 of kind v, not 2.
        assert!(cmd.contains(&"-c:v:0".to_string()));
        assert!(cmd.contains(&"-c:a:0".to_string()));
        assert!(cmd.contains(&"-c:v:1".to_string()));
    }

    #[test]
    fn distinct_delays_split_a_source_into_input_groups() {
        let cache = cache_with_mp4();
        let mut job = basic_job("/nonexistent");
        job.sources[0].streams[1].delay = "1.5".to_string();

        let cmd = compile_command(&job, &cache, false);
        let input_count = cmd.iter().filter(|a| *a == "-i").count();
        assert_eq!(input_count, 2);

        // The delayed group carries the offset immediately before its -i.
        let offset_pos = cmd.iter().position(|a| a == "-itsoffset").unwrap();
        assert_eq!(cmd[offset_pos + 1], "1.5");
        assert_eq!(cmd[offset_pos + 2], "-i");

        // The delayed audio stream maps through input ordinal 1.
        assert!(cmd.contains(&"1:1".to_string()));
        assert!(cmd.contains(&"0:0".to_string()));
    }

    #[test]
    fn zero_delay_emits_no_offset() {
        let cache = cache_with_mp4();
        let mut job = basic_job("/nonexistent");
        job.sources[0].streams[1].delay = "0".to_string();

        let cmd = compile_command(&job, &cache, false);
        assert!(!cmd.contains(&"-itsoffset".to_string()));
        assert_eq!(cmd.iter().filter(|a| *a == "-i").count(), 1);
    }

    #[test]
    fn trim_length_wins_over_end() {
        let cache = cache_with_mp4();
        let mut job = basic_job("/nonexistent");
        job.sources[0].streams[0].trim = Trim {
            start: "10".to_string(),
            length: "5".to_string(),
            end: "30".to_string(),
        };

        let cmd = compile_command(&job, &cache, false);
        assert!(cmd.contains(&"-ss:v:0".to_string()));
        assert!(cmd.contains(&"-t:v:0".to_string()));
        assert!(!cmd.contains(&"-to:v:0".to_string()));
    }

    #[test]
    fn empty_encoder_means_stream_copy() {
        let cache = cache_with_mp4();
        let cmd = compile_command(&basic_job("/nonexistent"), &cache, false);
        let pos = cmd.iter().position(|a| a == "-c:v:0").unwrap();
        assert_eq!(cmd[pos + 1], "copy");
    }

    #[test]
    fn booleans_normalize_and_global_keys_go_bare() {
        let cache = cache_with_mp4();
        let mut job = basic_job("/nonexistent");
        job.sources[0].streams[0].encoder = EncoderSettings {
            encoder: "libx264".to_string(),
            parameters: BTreeMap::from([
                ("fastdecode".to_string(), ParamValue::Text("true".to_string())),
                ("threads".to_string(), ParamValue::Int(4)),
            ]),
            ..Default::default()
        };

        let cmd = compile_command(&job, &cache, false);
        let flag_pos = cmd.iter().position(|a| a == "-fastdecode:v:0").unwrap();
        assert_eq!(cmd[flag_pos + 1], "1");
        // threads is in the global option set: no stream specifier.
        assert!(cmd.contains(&"-threads".to_string()));
        assert!(!cmd.contains(&"-threads:v:0".to_string()));
    }

    #[test]
    fn filter_chain_renders_nested_maps_and_lists() {
        let chain = build_filter_chain(&[
            FilterSpec {
                name: "scale".to_string(),
                parameters: BTreeMap::from([
                    ("h".to_string(), FilterValue::Text("720".to_string())),
                    ("w".to_string(), FilterValue::Text("1280".to_string())),
                ]),
            },
            FilterSpec {
                name: "hue".to_string(),
                parameters: BTreeMap::new(),
            },
            FilterSpec {
                name: "drawtext".to_string(),
                parameters: BTreeMap::from([(
                    "enable".to_string(),
                    FilterValue::List(vec!["a".to_string(), "b".to_string()]),
                )]),
            },
        ]);
        assert_eq!(chain, "scale=h=720:w=1280,hue,drawtext=enable=a|b");
    }

    #[test]
    fn filter_value_map_joins_with_colons() {
        let value = FilterValue::Map(BTreeMap::from([
            ("x".to_string(), FilterValue::Text("10".to_string())),
            ("y".to_string(), FilterValue::Text("20".to_string())),
        ]));
        assert_eq!(render_filter_value(&value), "x=10:y=20");
    }

    #[test]
    fn disposition_flags_join_with_plus() {
        let cache = cache_with_mp4();
        let mut job = basic_job("/nonexistent");
        job.sources[0].streams[0].disposition =
            vec!["default".to_string(), "forced".to_string()];

        let cmd = compile_command(&job, &cache, false);
        let pos = cmd.iter().position(|a| a == "-disposition:v:0").unwrap();
        assert_eq!(cmd[pos + 1], "default+forced");
    }

    #[test]
    fn preview_mode_streams_raw_nut_to_stdout() {
        let cache = cache_with_mp4();
        let mut job = basic_job("/nonexistent");
        job.sources[0].streams[0].encoder.filters = vec![FilterSpec {
            name: "hue".to_string(),
            parameters: BTreeMap::new(),
        }];

        let cmd = compile_command(&job, &cache, true);
        let tail: Vec<&String> = cmd.iter().rev().take(3).collect();
        assert_eq!(tail[0], "-");
        assert_eq!(tail[1], "nut");
        assert_eq!(tail[2], "-f");

        // Filtered video decodes to a raw codec; unfiltered audio copies.
        let video_pos = cmd.iter().position(|a| a == "-c:v:0").unwrap();
        assert_eq!(cmd[video_pos + 1], "rawvideo");
        let audio_pos = cmd.iter().position(|a| a == "-c:a:0").unwrap();
        assert_eq!(cmd[audio_pos + 1], "copy");
        assert!(!cmd.contains(&"-progress".to_string()));
    }

    #[test]
    fn normal_mode_appends_progress_and_muxer() {
        let cache = cache_with_mp4();
        let cmd = compile_command(&basic_job("/nonexistent"), &cache, false);
        let progress_pos = cmd.iter().position(|a| a == "-progress").unwrap();
        assert_eq!(cmd[progress_pos + 1], "pipe:1");
        let muxer_pos = cmd.iter().position(|a| a == "-f").unwrap();
        assert_eq!(cmd[muxer_pos + 1], "mp4");
    }

    #[test]
    fn multiplexer_falls_back_to_first_source_demuxer() {
        let cache = cache_with_mp4();
        let mut job = basic_job("/nonexistent");
        job.multiplexer = String::new();

        let cmd = compile_command(&job, &cache, false);
        let muxer_pos = cmd.iter().position(|a| a == "-f").unwrap();
        assert_eq!(cmd[muxer_pos + 1], "matroska");
    }

    #[test]
    fn output_name_defaults_to_source_stem_with_muxer_extension() {
        let cache = cache_with_mp4();
        let job = basic_job("/nonexistent");
        let cmd = compile_command(&job, &cache, false);
        assert_eq!(cmd.last().unwrap(), "/nonexistent/movie.mp4");
    }

    #[test]
    fn explicit_file_name_keeps_its_own_extension() {
        let cache = cache_with_mp4();
        let mut job = basic_job("/nonexistent");
        job.output_file_name = "final.mov".to_string();
        let cmd = compile_command(&job, &cache, false);
        assert_eq!(cmd.last().unwrap(), "/nonexistent/final.mov");
    }

    #[test]
    fn existing_outputs_get_numeric_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_string_lossy().into_owned();
        std::fs::write(dir.path().join("movie.mp4"), b"").unwrap();

        let cache = cache_with_mp4();
        let job = basic_job(&dir_str);
        let cmd = compile_command(&job, &cache, false);
        assert_eq!(
            cmd.last().unwrap(),
            &format!("{dir_str}/movie1.mp4")
        );

        std::fs::write(dir.path().join("movie1.mp4"), b"").unwrap();
        let cmd = compile_command(&job, &cache, false);
        assert_eq!(
            cmd.last().unwrap(),
            &format!("{dir_str}/movie2.mp4")
        );
    }

    #[test]
    fn language_and_metadata_use_stream_specifiers() {
        let cache = cache_with_mp4();
        let mut job = basic_job("/nonexistent");
        job.sources[0].streams[1].language = "ger".to_string();
        job.sources[0].streams[1]
            .metadata
            .insert("title".to_string(), "Kommentar".to_string());

        let cmd = compile_command(&job, &cache, false);
        let lang_pos = cmd
            .iter()
            .position(|a| a == "language=ger")
            .expect("language metadata emitted");
        assert_eq!(cmd[lang_pos - 1], "-metadata:s:a:0");
        assert!(cmd.contains(&"title=Kommentar".to_string()));
    }
}
