//! Duration string parsing and trim-adjusted duration math.
//!
//! The tool accepts durations as `[-]HH:MM:SS[.m]`, `MM:SS[.m]`, or
//! `[-]S[.m]` with an optional `s`/`ms`/`us` unit suffix. User-entered trim
//! and delay fields are stored verbatim and parsed here only when a number
//! is needed.

use crate::job::Trim;

/// Parses a duration string into seconds.
///
/// Returns `None` for empty or unrecognized input.
///
/// # Examples
///
/// ```
/// use ffqueue_core::time::parse_duration;
///
/// assert_eq!(parse_duration("01:02:03"), Some(3723.0));
/// assert_eq!(parse_duration("02:30"), Some(150.0));
/// assert_eq!(parse_duration("1.5"), Some(1.5));
/// assert_eq!(parse_duration("500ms"), Some(0.5));
/// assert_eq!(parse_duration("garbage"), None);
/// ```
pub fn parse_duration(input: &str) -> Option<f64> {
    let input = input.trim().to_ascii_lowercase();
    if input.is_empty() {
        return None;
    }

    // Sexagesimal: [HOURS:]MINUTES:SECONDS[.m]
    if input.contains(':') {
        let parts: Vec<&str> = input.split(':').collect();
        return match parts.as_slice() {
            [h, m, s] => {
                let hours: f64 = h.parse::<i64>().ok()? as f64;
                let minutes: f64 = m.parse::<i64>().ok()? as f64;
                let seconds: f64 = s.parse().ok()?;
                Some(hours * 3600.0 + minutes * 60.0 + seconds)
            }
            [m, s] => {
                let minutes: f64 = m.parse::<i64>().ok()? as f64;
                let seconds: f64 = s.parse().ok()?;
                Some(minutes * 60.0 + seconds)
            }
            _ => None,
        };
    }

    // Plain seconds with an optional unit suffix.
    let (number, scale) = if let Some(stripped) = input.strip_suffix("ms") {
        (stripped, 1e-3)
    } else if let Some(stripped) = input.strip_suffix("us") {
        (stripped, 1e-6)
    } else if let Some(stripped) = input.strip_suffix('s') {
        (stripped, 1.0)
    } else {
        (input.as_str(), 1.0)
    };

    number.trim().parse::<f64>().ok().map(|v| v * scale)
}

/// Computes the trim-adjusted playback length of a stream in seconds.
///
/// Precedence: an explicit length overrides everything; otherwise an end
/// point yields `end - start`; otherwise `original - start`. Results are
/// clamped to be non-negative.
///
/// # Examples
///
/// ```
/// use ffqueue_core::Trim;
/// use ffqueue_core::time::effective_duration;
///
/// let trim = Trim {
///     start: "10".to_string(),
///     length: "5".to_string(),
///     end: "30".to_string(),
/// };
/// // Length wins over end and over original - start.
/// assert_eq!(effective_duration(60.0, &trim), 5.0);
/// ```
pub fn effective_duration(original: f64, trim: &Trim) -> f64 {
    let start = parse_duration(&trim.start).unwrap_or(0.0);

    if let Some(length) = parse_duration(&trim.length) {
        return length;
    }

    if let Some(end) = parse_duration(&trim.end) {
        return (end - start).max(0.0);
    }

    (original - start).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sexagesimal_forms() {
        assert_eq!(parse_duration("12:03:45"), Some(43425.0));
        assert_eq!(parse_duration("03:45"), Some(225.0));
        assert_eq!(parse_duration("00:00:01.5"), Some(1.5));
    }

    #[test]
    fn parses_unit_suffixes() {
        assert_eq!(parse_duration("90"), Some(90.0));
        assert_eq!(parse_duration("90s"), Some(90.0));
        assert_eq!(parse_duration("250ms"), Some(0.25));
        assert_eq!(parse_duration("1500us"), Some(0.0015));
        assert_eq!(parse_duration("-2.5"), Some(-2.5));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("  "), None);
        assert_eq!(parse_duration("abc"), None);
        assert_eq!(parse_duration("1:2:3:4"), None);
    }

    #[test]
    fn length_overrides_end_and_start() {
        let trim = Trim {
            start: "10".to_string(),
            length: "5".to_string(),
            end: "30".to_string(),
        };
        assert_eq!(effective_duration(60.0, &trim), 5.0);
    }

    #[test]
    fn end_minus_start_when_no_length() {
        let trim = Trim {
            start: "10".to_string(),
            end: "30".to_string(),
            ..Default::default()
        };
        assert_eq!(effective_duration(60.0, &trim), 20.0);
    }

    #[test]
    fn original_minus_start_as_fallback() {
        let trim = Trim {
            start: "10".to_string(),
            ..Default::default()
        };
        assert_eq!(effective_duration(60.0, &trim), 50.0);
    }

    #[test]
    fn durations_never_go_negative() {
        let trim = Trim {
            start: "90".to_string(),
            ..Default::default()
        };
        assert_eq!(effective_duration(60.0, &trim), 0.0);

        let trim = Trim {
            start: "40".to_string(),
            end: "30".to_string(),
            ..Default::default()
        };
        assert_eq!(effective_duration(60.0, &trim), 0.0);
    }
}
