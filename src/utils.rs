use crate::OutputFormat;
use std::time::Duration;
use url::Url;

const FALLBACK_BASENAME: &str = "screenshot";
const MAX_BASENAME_CHARS: usize = 120;
const RESERVED_NAMES: &[&str] = &["con", "prn", "aux", "nul", "clock$"];

/// Turn a page title into a safe file base name.
///
/// Anything other than ASCII letters, digits, `-`, `_`, `.` and spaces becomes
/// `_`, leading/trailing dots and spaces are dropped, whitespace runs collapse,
/// Windows device names get a `_` prefix and the result is capped at 120 chars.
pub fn sanitize_base_filename(input: &str) -> String {
    let mut base = String::with_capacity(input.len());
    let mut replacing = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
            base.push(c);
            replacing = false;
        } else if !replacing {
            // A run of disallowed characters collapses to one underscore.
            base.push('_');
            replacing = true;
        }
    }

    let base = base.trim_matches(|c| c == '.' || c == ' ');
    let mut base = base.split_whitespace().collect::<Vec<_>>().join(" ");

    if base.is_empty() || base == "." || base == ".." {
        return FALLBACK_BASENAME.to_string();
    }

    if is_reserved_name(&base) {
        base.insert(0, '_');
    }

    if base.chars().count() > MAX_BASENAME_CHARS {
        base = base.chars().take(MAX_BASENAME_CHARS).collect();
    }

    base
}

fn is_reserved_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    if RESERVED_NAMES.contains(&lower.as_str()) {
        return true;
    }
    let bytes = lower.as_bytes();
    bytes.len() == 4
        && (lower.starts_with("com") || lower.starts_with("lpt"))
        && (b'1'..=b'9').contains(&bytes[3])
}

/// `sanitize(title) + extension`
///
/// ```rust
/// use stitchshot::{output_filename, OutputFormat};
///
/// assert_eq!(output_filename("Docs: Intro", OutputFormat::Jpeg), "Docs_ Intro.jpg");
/// ```
pub fn output_filename(page_title: &str, format: OutputFormat) -> String {
    format!(
        "{}.{}",
        sanitize_base_filename(page_title),
        format.extension()
    )
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let millis = duration.subsec_millis();

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else if seconds > 0 {
        format!("{}.{}s", seconds, millis / 100)
    } else {
        format!("{millis}ms")
    }
}

pub fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Only http(s) and file pages can be opened for capture.
pub fn validate_url(url: &str) -> Result<Url, crate::CaptureError> {
    let parsed =
        Url::parse(url).map_err(|e| crate::CaptureError::InvalidUrl(format!("{url}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" | "file" => Ok(parsed),
        scheme => Err(crate::CaptureError::InvalidUrl(format!(
            "{url}: unsupported scheme {scheme}"
        ))),
    }
}
