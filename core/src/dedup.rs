//! Suppression of content the model re-emits across stream chunks.
//!
//! The cleaner runs over the *cumulative* buffer after every append, so it
//! must be cheap, idempotent, and conservative: nothing is removed until the
//! exact same segment has actually been seen before.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex_lite::Regex;

use crate::util::static_regex;

/// Buffers shorter than this are returned untouched; the scan cost is not
/// justified and short texts trip false positives.
const MIN_DEDUP_LEN: usize = 50;

/// Segments shorter than this (typically bare punctuation) are never
/// candidates for removal.
const MIN_SEGMENT_LEN: usize = 5;

/// One or more sentence terminators followed by whitespace.
static SENTENCE_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| static_regex(r"[.!?]+\s+"));

/// A markdown bullet item of the `* **label**: text` shape, running to the
/// end of its line.
static BULLET_ITEM: LazyLock<Regex> = LazyLock::new(|| static_regex(r"\*\s+\*\*[^*\n]+\*\*:[^\n]*"));

/// Remove sentence- and bullet-level repetitions from a cumulative stream
/// buffer. Idempotent; the seen-sets live on this call's stack so nothing
/// leaks between messages or conversations.
pub fn dedup_stream_text(text: &str) -> String {
    if text.chars().count() < MIN_DEDUP_LEN {
        return text.to_string();
    }
    let deduped = drop_repeated_sentences(text);
    drop_repeated_bullets(&deduped)
}

enum Segment<'a> {
    Content(&'a str),
    Boundary(&'a str),
}

fn split_sentences(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut last = 0;
    for boundary in SENTENCE_BOUNDARY.find_iter(text) {
        if boundary.start() > last {
            segments.push(Segment::Content(&text[last..boundary.start()]));
        }
        segments.push(Segment::Boundary(boundary.as_str()));
        last = boundary.end();
    }
    if last < text.len() {
        segments.push(Segment::Content(&text[last..]));
    }
    segments
}

fn drop_repeated_sentences(text: &str) -> String {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = String::with_capacity(text.len());
    // A dropped sentence takes its trailing boundary with it, otherwise the
    // output accumulates orphaned terminators.
    let mut drop_next_boundary = false;

    for segment in split_sentences(text) {
        match segment {
            Segment::Boundary(boundary) => {
                if drop_next_boundary {
                    drop_next_boundary = false;
                } else {
                    out.push_str(boundary);
                }
            }
            Segment::Content(content) => {
                drop_next_boundary = false;
                if content.chars().count() >= MIN_SEGMENT_LEN && !seen.insert(content) {
                    drop_next_boundary = true;
                    continue;
                }
                out.push_str(content);
            }
        }
    }
    out
}

fn drop_repeated_bullets(text: &str) -> String {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut removals: Vec<(usize, usize)> = Vec::new();

    for item in BULLET_ITEM.find_iter(text) {
        if !seen.insert(item.as_str()) {
            let mut end = item.end();
            // Take the line break of the removed item along.
            if text[end..].starts_with('\n') {
                end += 1;
            }
            removals.push((item.start(), end));
        }
    }
    if removals.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (start, end) in removals {
        out.push_str(&text[last..start]);
        last = end;
    }
    out.push_str(&text[last..]);
    out
}
