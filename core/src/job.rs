//! The user-declared transcode job model.
//!
//! A [`Job`] is created empty or from a media probe, edited by the caller,
//! and handed to the scheduler by reference; the scheduler mutates only
//! [`Job::status`] and [`Job::error_log`]. Trim and delay fields are kept as
//! free-form strings so the user's syntax survives round trips through job
//! files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::value::ParamValue;

/// Lifecycle state of a job. Runtime-only; never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Failed,
    Successful,
}

/// Media kind of an elementary stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    #[default]
    Video,
    Audio,
    Subtitle,
    Data,
    Attachment,
}

impl StreamKind {
    /// Single-letter stream specifier used in the tool's argument syntax.
    pub fn specifier_letter(&self) -> char {
        match self {
            StreamKind::Video => 'v',
            StreamKind::Audio => 'a',
            StreamKind::Subtitle => 's',
            StreamKind::Data => 'd',
            StreamKind::Attachment => 't',
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StreamKind::Video => "video",
            StreamKind::Audio => "audio",
            StreamKind::Subtitle => "subtitle",
            StreamKind::Data => "data",
            StreamKind::Attachment => "attachment",
        };
        f.write_str(label)
    }
}

/// Trim window for a stream. Strings preserve the user's own duration
/// syntax; parsing happens only when a number is actually needed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Trim {
    pub start: String,
    pub length: String,
    pub end: String,
}

impl Trim {
    /// True if no trim field is set.
    pub fn is_empty(&self) -> bool {
        self.start.is_empty() && self.length.is_empty() && self.end.is_empty()
    }
}

/// A value inside a filter specification. Maps render as `k=v:k=v`, lists
/// as `a|b|c`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Text(String),
    List(Vec<String>),
    Map(BTreeMap<String, FilterValue>),
}

/// One filter in a stream's filter chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    pub name: String,
    pub parameters: BTreeMap<String, FilterValue>,
}

/// Encoder selection and tuning for one stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderSettings {
    /// Encoder name; empty means stream copy.
    pub encoder: String,
    pub parameters: BTreeMap<String, ParamValue>,
    pub filters: Vec<FilterSpec>,
}

/// One elementary stream inside a [`Source`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stream {
    pub active: bool,
    /// Stream index as assigned by the tool.
    pub index: u32,
    pub kind: StreamKind,
    pub codec_description: String,
    /// Original playback length in seconds, before trimming.
    pub duration: f64,
    pub bitrate: u64,
    pub encoder: EncoderSettings,
    pub language: String,
    pub disposition: Vec<String>,
    pub metadata: BTreeMap<String, String>,
    /// Free-form start offset; distinct delays split a source into separate
    /// tool inputs.
    pub delay: String,
    pub trim: Trim,
}

/// One input file with its detected container info and streams.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Source {
    pub file_name: String,
    pub metadata: BTreeMap<String, String>,
    /// Demuxer name detected for this file; the compiler falls back to it
    /// when the job declares no multiplexer.
    pub demuxer: String,
    pub bitrate: u64,
    pub streams: Vec<Stream>,
}

impl Source {
    /// Iterates the active streams of this source.
    pub fn active_streams(&self) -> impl Iterator<Item = &Stream> {
        self.streams.iter().filter(|s| s.active)
    }
}

/// A user-declared transcode unit.
///
/// # Examples
///
/// ```
/// use ffqueue_core::{Job, JobStatus};
///
/// let job = Job::default();
/// assert_eq!(job.status, JobStatus::Pending);
/// assert_eq!(job.parallel_group, 0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Job {
    pub name: String,
    pub sources: Vec<Source>,
    /// Longest original stream duration across sources, in seconds.
    pub total_duration: f64,
    /// Output container; empty falls back to the first source's demuxer.
    pub multiplexer: String,
    pub muxer_parameters: BTreeMap<String, ParamValue>,
    pub metadata: BTreeMap<String, String>,
    pub output_directory: String,
    pub output_file_name: String,
    /// 0 runs alone in sequence; N > 0 runs concurrently with every other
    /// job sharing group N.
    pub parallel_group: u8,
    #[serde(skip)]
    pub status: JobStatus,
    #[serde(skip)]
    pub error_log: String,
}

impl Job {
    /// Iterates `(source index, stream)` over all active streams in
    /// declaration order — the order the compiler maps them in.
    pub fn active_streams(&self) -> impl Iterator<Item = (usize, &Stream)> {
        self.sources
            .iter()
            .enumerate()
            .flat_map(|(idx, src)| src.active_streams().map(move |s| (idx, s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> Job {
        Job {
            name: "episode".to_string(),
            sources: vec![Source {
                file_name: "/media/in.mkv".to_string(),
                demuxer: "matroska".to_string(),
                streams: vec![
                    Stream {
                        active: true,
                        index: 0,
                        kind: StreamKind::Video,
                        duration: 120.0,
                        encoder: EncoderSettings {
                            encoder: "libx264".to_string(),
                            parameters: BTreeMap::from([(
                                "crf".to_string(),
                                ParamValue::Int(23),
                            )]),
                            ..Default::default()
                        },
                        ..Default::default()
                    },
                    Stream {
                        active: false,
                        index: 1,
                        kind: StreamKind::Audio,
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }],
            total_duration: 120.0,
            multiplexer: "mp4".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn active_streams_skip_inactive_entries() {
        let job = sample_job();
        let active: Vec<u32> = job.active_streams().map(|(_, s)| s.index).collect();
        assert_eq!(active, vec![0]);
    }

    #[test]
    fn runtime_state_is_not_serialized() {
        let mut job = sample_job();
        job.status = JobStatus::Failed;
        job.error_log = "boom".to_string();

        let json = serde_json::to_string(&job).unwrap();
        let back: Job = serde_json::from_str(&json).unwrap();

        assert_eq!(back.status, JobStatus::Pending);
        assert!(back.error_log.is_empty());
        assert_eq!(back.name, job.name);
        assert_eq!(back.sources, job.sources);
    }

    #[test]
    fn stream_kind_specifier_letters() {
        assert_eq!(StreamKind::Video.specifier_letter(), 'v');
        assert_eq!(StreamKind::Audio.specifier_letter(), 'a');
        assert_eq!(StreamKind::Subtitle.specifier_letter(), 's');
        assert_eq!(StreamKind::Data.specifier_letter(), 'd');
        assert_eq!(StreamKind::Attachment.specifier_letter(), 't');
    }

    #[test]
    fn filter_value_deserializes_untagged() {
        let yaml_like = r#"{"flags": "lanczos", "size": {"w": "1280", "h": "720"}, "streams": ["a", "b"]}"#;
        let parsed: BTreeMap<String, FilterValue> = serde_json::from_str(yaml_like).unwrap();

        assert_eq!(parsed["flags"], FilterValue::Text("lanczos".to_string()));
        assert!(matches!(parsed["size"], FilterValue::Map(_)));
        assert_eq!(
            parsed["streams"],
            FilterValue::List(vec!["a".to_string(), "b".to_string()])
        );
    }
}
