//! Decoding of the tool's machine-readable progress stream.
//!
//! The tool writes `key=value` lines to stdout, each block terminated by a
//! `progress=continue` / `progress=end` line. Keys accumulate in a rolling
//! buffer; when the sentinel arrives, elapsed time is compared against the
//! job's effective duration and the reported speed multiplier turns the
//! remaining media seconds into a wall-clock ETA.

use std::collections::HashMap;

/// One rendered progress sample.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Completed fraction in [0, 1].
    pub fraction: f64,
    /// Human-readable summary line: percent, bitrate, fps, speed, ETA.
    pub info: String,
}

/// Rolling `key=value` buffer over one process's stdout.
pub struct ProgressDecoder {
    buffer: HashMap<String, String>,
    total_duration: f64,
}

impl ProgressDecoder {
    /// `total_duration` is the job's effective duration in seconds (trim-
    /// adjusted, maximized across active streams).
    pub fn new(total_duration: f64) -> Self {
        Self {
            buffer: HashMap::new(),
            total_duration,
        }
    }

    /// Feeds one stdout line. Returns a sample when the line completes a
    /// progress block and carries a usable elapsed time.
    pub fn ingest_line(&mut self, line: &str) -> Option<ProgressUpdate> {
        let (key, value) = line.split_once('=')?;
        let key = key.trim().to_string();
        let value = value.trim().to_string();
        self.buffer.insert(key.clone(), value);

        if key != "progress" {
            return None;
        }

        // out_time_ms is in microseconds despite the name.
        let micros: i64 = self.buffer.get("out_time_ms")?.parse().ok()?;
        let current_sec = micros as f64 / 1_000_000.0;
        let fraction = if self.total_duration > 0.0 {
            (current_sec / self.total_duration).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let bitrate = self.field_or("bitrate", "0");
        let fps = self.field_or("fps", "0");
        let speed_raw = self.field_or("speed", "0x");

        let mut eta = "Calculating...".to_string();
        let mut speed_formatted = String::new();
        let velocity: f64 = speed_raw.trim_end_matches('x').trim().parse().unwrap_or(0.0);
        if velocity > 0.01 {
            let remaining_media_sec = (self.total_duration - current_sec).max(0.0);
            eta = format_eta(remaining_media_sec / velocity);
            speed_formatted = format!("{velocity:.2}x  ");
        }

        let info = format!(
            "{:.2}%  {bitrate}  {fps} fps  {speed_formatted}{eta} left",
            fraction * 100.0
        );
        Some(ProgressUpdate { fraction, info })
    }

    fn field_or(&self, key: &str, fallback: &str) -> String {
        self.buffer
            .get(key)
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Formats a wall-clock remaining time into day/hour/minute tiers.
pub fn format_eta(total_seconds: f64) -> String {
    if !total_seconds.is_finite() || total_seconds < 0.0 {
        return "Unknown".to_string();
    }

    let total = total_seconds as u64;
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    if days >= 1 {
        format!("{days} days, {hours} hours")
    } else if hours >= 1 {
        format!("{hours} hours, {minutes} min, {seconds} sec")
    } else if minutes >= 1 {
        format!("{minutes} minutes {seconds} seconds")
    } else {
        format!("< 1 min ({seconds} seconds)")
    }
}
