//! Pixel format extraction from the `-pix_fmts` listing.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use ffqueue_core::PixelFormat;

use crate::error::Result;
use crate::probe::{ProgressFn, ToolRunner};

static PIX_FMT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    // Five-letter capability code, name, component count, bits per pixel,
    // hyphen-joined per-component bit depths.
    Regex::new(r"^([IOHBP.]{5})\s+([\w-]+)\s+(\d+)\s+(\d+)\s+([\d-]+)$")
        .expect("static regex must compile")
});

/// Parses the `-pix_fmts` listing. Data lines only start after the header
/// separator row of dashes; everything before it is column legend.
pub fn parse_pixel_formats(output: &str) -> BTreeMap<String, PixelFormat> {
    let mut pixel_formats = BTreeMap::new();
    let mut past_separator = false;

    for line in output.lines() {
        if line.contains("-----") {
            past_separator = true;
            continue;
        }
        if !past_separator {
            continue;
        }

        let Some(caps) = PIX_FMT_LINE.captures(line) else {
            continue;
        };
        let name = caps[2].to_string();
        let bits_per_component = caps[5]
            .split('-')
            .filter(|part| !part.is_empty())
            .map(|part| part.parse().unwrap_or(0))
            .collect();

        pixel_formats.insert(
            name,
            PixelFormat {
                num_components: caps[3].parse().unwrap_or(0),
                bits_per_pixel: caps[4].parse().unwrap_or(0),
                bits_per_component,
            },
        );
    }

    pixel_formats
}

/// Runs the pixel-format extractor over one `-pix_fmts` invocation.
pub fn extract_pixel_formats(
    runner: &dyn ToolRunner,
    progress: Option<ProgressFn>,
) -> Result<BTreeMap<String, PixelFormat>> {
    if let Some(report) = progress {
        report("pixel formats", 0.0);
    }
    let output = runner.run(&["-pix_fmts"])?;
    Ok(parse_pixel_formats(&output))
}
