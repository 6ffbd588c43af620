//! Extraction of inline control directives from answer text.
//!
//! The backend embeds `[format:<kind>]…[/format]` and `[data:<json>]` tags in
//! otherwise human-readable prose. Extraction runs on every accumulation
//! step, so it must be safe on partial text: a directive whose closing
//! bracket has not streamed in yet is left verbatim in the visible text and
//! simply matches on a later step.

use std::sync::LazyLock;

use folio_protocol::ContentFormat;
use regex_lite::Regex;

use crate::util::static_regex;

/// Prose and directives of one buffer state, separated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extraction {
    /// Visible text with recognized directives stripped and whitespace
    /// trimmed.
    pub text: String,
    /// Kind from a complete `[format:…]` tag, if one was present.
    pub format: Option<ContentFormat>,
    /// Raw payload of a complete `[data:…]` tag, not yet parsed.
    pub data_raw: Option<String>,
}

static FORMAT_TAG: LazyLock<Regex> =
    LazyLock::new(|| static_regex(r"(?i)\[format:\s*(text|table|contact|pdf)\s*\]"));
static FORMAT_CLOSE: LazyLock<Regex> = LazyLock::new(|| static_regex(r"(?i)\[/format\]"));

pub fn extract_directives(raw: &str) -> Extraction {
    let mut text = raw.to_string();
    let mut format = None;

    if let Some(captures) = FORMAT_TAG.captures(&text) {
        format = captures[1].parse::<ContentFormat>().ok();
        if let Some(tag) = captures.get(0) {
            text.replace_range(tag.start()..tag.end(), "");
        }
        if let Some(close) = FORMAT_CLOSE.find(&text) {
            text.replace_range(close.start()..close.end(), "");
        }
    }

    let mut data_raw = None;
    if let Some((range, payload)) = find_data_directive(&text) {
        data_raw = Some(payload);
        text.replace_range(range, "");
    }

    Extraction {
        text: text.trim().to_string(),
        format,
        data_raw,
    }
}

/// Locate a complete `[data:…]` directive. The payload is scanned with
/// bracket-depth and string-literal awareness so a `]` inside a JSON array
/// or a quoted string does not cut it short. Returns the byte range of the
/// whole directive and the payload between the colon and the closing
/// bracket.
fn find_data_directive(text: &str) -> Option<(std::ops::Range<usize>, String)> {
    const OPEN: &str = "[data:";
    let start = find_ascii_ci(text, OPEN)?;
    let payload_start = start + OPEN.len();

    let mut depth = 1usize;
    let mut in_string = false;
    let mut quote = '"';
    let mut escaped = false;

    for (offset, ch) in text[payload_start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                in_string = false;
            }
            continue;
        }
        match ch {
            // Malformed payloads use single quotes as often as double.
            '"' | '\'' => {
                in_string = true;
                quote = ch;
            }
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    let payload_end = payload_start + offset;
                    let payload = text[payload_start..payload_end].to_string();
                    return Some((start..payload_end + 1, payload));
                }
            }
            _ => {}
        }
    }
    // Closing bracket not received yet.
    None
}

/// Byte index of `needle` in `haystack`, ASCII case-insensitive.
fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    let haystack = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}
