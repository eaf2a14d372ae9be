//! End-to-end extractor tests against captured help-text fixtures, driven
//! through a map-backed [`ToolRunner`] so no tool binary is needed.

use std::collections::{BTreeMap, HashMap};

use ffqueue_core::ParamValue;
use ffqueue_introspect::{IntrospectError, Result, ToolRunner};
use ffqueue_introspect::{codec, filter, format, snapshot};

/// Serves canned output keyed by the joined argument list.
struct FakeTool {
    responses: HashMap<String, String>,
}

impl FakeTool {
    fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            responses: entries
                .iter()
                .map(|(args, text)| ((*args).to_string(), (*text).to_string()))
                .collect(),
        }
    }
}

impl ToolRunner for FakeTool {
    fn run(&self, args: &[&str]) -> Result<String> {
        match self.responses.get(&args.join(" ")) {
            Some(text) => Ok(text.clone()),
            None => Err(IntrospectError::ToolNotFound(args.join(" "))),
        }
    }
}

const CODEC_LISTING: &str = "\
 Codecs:
 DEV.L. av1                  Alliance for Open Media AV1
 DEV.L. vp9                  Google VP9 (decoders: libvpx-vp9) (encoders: libvpx-vp9)
";

const VP9_ENCODER_HELP: &str = "\
Encoder libvpx-vp9 [libvpx VP9]:
libvpx-vp9 encoder AVOptions:
  -lag-in-frames <int> E..V....... Number of frames to look ahead (from -1 to INT_MAX) (default -1)
  -deadline <int> E..V....... Time to spend encoding (from INT_MIN to INT_MAX) (default good)
     best            0            E..V.......
     good            1000000      E..V.......
";

const VP9_DECODER_HELP: &str = "\
Decoder libvpx-vp9 [libvpx VP9]:
libvpx-vp9 decoder AVOptions:
  -lag-in-frames <int> .D.V....... Number of frames to look ahead (from -1 to INT_MAX) (default -1)
";

const AV1_ENCODER_HELP: &str = "\
Encoder av1 [AV1]:
av1 encoder AVOptions:
  -usage <int> E..V....... Quality and compression efficiency vs speed trade-off (from 0 to 2) (default 0)
";

fn codec_fake() -> FakeTool {
    FakeTool::new(&[
        ("-codecs", CODEC_LISTING),
        ("-h encoder=libvpx-vp9", VP9_ENCODER_HELP),
        ("-h decoder=libvpx-vp9", VP9_DECODER_HELP),
        ("-h encoder=av1", AV1_ENCODER_HELP),
        ("-h decoder=av1", "Unknown decoder 'av1'"),
    ])
}

#[test]
fn codec_extraction_splits_handlers_and_merges_probes() {
    let tool = codec_fake();
    let codecs = codec::extract_codecs(&tool, None).unwrap();

    // The rogue family label is gone; the handler carries both sides.
    assert!(!codecs.contains_key("vp9"));
    let handler = &codecs["libvpx-vp9"];
    assert!(handler.flags.encoder && handler.flags.decoder);

    // lag-in-frames was seen by both probes: contexts OR-merged.
    let lag = &handler.parameters["lag-in-frames"];
    assert!(lag.context.encoding && lag.context.decoding);

    // deadline was encoder-only and keeps its choices.
    let deadline = &handler.parameters["deadline"];
    assert_eq!(deadline.options["good"].value, Some(ParamValue::Int(1000000)));
}

#[test]
fn unusable_decoder_probe_contributes_nothing() {
    let tool = codec_fake();
    let codecs = codec::extract_codecs(&tool, None).unwrap();

    // av1's decoder probe answered "Unknown ..." and must not clobber the
    // encoder-derived parameters.
    let av1 = &codecs["av1"];
    assert!(av1.parameters.contains_key("usage"));
    assert!(av1.parameters["usage"].context.encoding);
}

#[test]
fn probing_twice_is_idempotent() {
    let tool = codec_fake();
    let first = codec::extract_codecs(&tool, None).unwrap();
    let second = codec::extract_codecs(&tool, None).unwrap();
    assert_eq!(first, second);

    // Re-merging the encoder help into an already-merged entry changes
    // nothing: OR is idempotent and choice collisions are overwrites.
    let mut merged = first["libvpx-vp9"].clone();
    let again =
        ffqueue_introspect::avoptions::parse_av_options(VP9_ENCODER_HELP);
    ffqueue_core::merge_parameters(&mut merged.parameters, again);
    assert_eq!(merged, first["libvpx-vp9"]);
}

#[test]
fn format_extraction_collects_extensions_and_parameters() {
    let tool = FakeTool::new(&[
        (
            "-formats",
            " D  matroska,webm        Matroska / WebM\n  E matroska             Matroska\n",
        ),
        (
            "-h muxer=matroska",
            "Muxer matroska [Matroska]:\n    Common extensions: mkv.\nmatroska muxer AVOptions:\n  -reserve_index_space <int> E.......... Reserve space at the beginning (from 0 to INT_MAX) (default 0)\n",
        ),
        (
            "-h demuxer=matroska",
            "Demuxer matroska,webm [Matroska / WebM]:\nmatroska demuxer AVOptions:\n  -live <boolean> .D......... Tell the parser this is a live stream (default false)\n",
        ),
    ]);

    let formats = format::extract_formats(&tool, None).unwrap();
    let matroska = &formats["matroska"];

    assert!(matroska.is_muxer && matroska.is_demuxer);
    assert_eq!(matroska.aliases, vec!["webm"]);
    assert_eq!(matroska.file_extensions, vec!["mkv"]);
    // Parameters from both probe sides land in one map.
    assert!(matroska.parameters.contains_key("reserve_index_space"));
    assert!(matroska.parameters.contains_key("live"));
}

#[test]
fn filter_extraction_applies_the_scale_quirk() {
    let tool = FakeTool::new(&[
        (
            "-filters",
            " ... scale             V->V       Scale the input video size.\n",
        ),
        (
            "-h filter=scale",
            "Filter scale\nscale AVOptions:\n  -flags <int> ...FV...... scaling flags (from 0 to 100) (default 4)\n  -sws_flags <flags> ...FV...... scaler flags\n     bilinear         ...FV...... bilinear scaling\n     lanczos          ...FV...... lanczos rescaling\n",
        ),
    ]);

    let filters = filter::extract_filters(&tool, None).unwrap();
    let scale = &filters["scale"];

    assert!(!scale.parameters.contains_key("sws_flags"));
    assert_eq!(scale.parameters["flags"].param_type, "flags");
    assert!(scale.parameters["flags"].options.contains_key("bilinear"));
}

#[test]
fn build_cache_assembles_all_domains() {
    let entries: Vec<(&str, &str)> = vec![
        ("-codecs", CODEC_LISTING),
        ("-h encoder=libvpx-vp9", VP9_ENCODER_HELP),
        ("-h decoder=libvpx-vp9", VP9_DECODER_HELP),
        ("-h encoder=av1", AV1_ENCODER_HELP),
        ("-h decoder=av1", "Unknown decoder 'av1'"),
        ("-h full", "Video options:\n-vframes <number>  set the number of video frames to output\n"),
        ("-pix_fmts", "FLAGS NAME NB_COMPONENTS BITS_PER_PIXEL BIT_DEPTHS\n-----\nIO... yuv420p                3             12      8-8-8\n"),
        ("-filters", " ... scale             V->V       Scale the input video size.\n"),
        ("-h filter=scale", "scale AVOptions:\n  -flags <int> ...FV...... scaling flags (from 0 to 100) (default 4)\n"),
        ("-formats", " DE mp4                  MP4 (MPEG-4 Part 14)\n"),
        ("-h muxer=mp4", "Muxer mp4 [MP4]:\n    Common extensions: mp4,m4a.\n"),
        ("-h demuxer=mp4", "Demuxer mov,mp4 [QuickTime / MOV]:\n"),
    ];
    let tool = FakeTool::new(&entries);

    let cache = snapshot::build_cache(&tool, "ffmpeg version 7.1", None).unwrap();

    assert_eq!(cache.tool_version_header, "ffmpeg version 7.1");
    assert!(cache.globals.video.contains_key("vframes"));
    assert!(cache.pixel_formats.contains_key("yuv420p"));
    assert!(cache.filters.contains_key("scale"));
    assert_eq!(cache.formats["mp4"].file_extensions, vec!["mp4", "m4a"]);
    assert!(cache.codecs.contains_key("libvpx-vp9"));
    assert!(!cache.generated_at.is_empty());
}

#[test]
fn cache_roundtrips_through_the_blob() {
    let tool = codec_fake();
    let mut cache =
        ffqueue_core::CapabilityCache::new("ffmpeg version 7.1".to_string());
    cache.codecs = codec::extract_codecs(&tool, None).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("caps.bin");
    snapshot::save_to_file(&cache, &path).unwrap();
    let loaded = snapshot::load_from_file(&path).unwrap();

    assert_eq!(loaded, cache);
}
