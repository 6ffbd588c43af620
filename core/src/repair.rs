//! Best-effort recovery of the near-JSON payloads carried by data
//! directives.
//!
//! The backend's model emits payloads with unquoted keys, single-quoted
//! strings, trailing commas and missing closers often enough that a strict
//! parse is the exception. The pipeline below short-circuits as soon as any
//! stage produces valid JSON and never lets a failure escape: every input
//! ends as a parsed value, a canonical fallback, or a structured error
//! placeholder.

use std::sync::LazyLock;

use regex_lite::Captures;
use regex_lite::Regex;
use serde_json::Value;
use serde_json::json;
use tracing::debug;

use crate::contact::default_contact_payload;
use crate::util::static_regex;

/// Terminal result of the repair pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum RepairOutcome {
    /// The payload parsed, possibly after syntactic repairs.
    Parsed(Value),
    /// Unparseable, but recognizably a contact card; the canonical default
    /// payload stands in.
    ContactFallback(Value),
    /// Unparseable and unrecognized. `placeholder` is the `{"error": …}`
    /// object handed to the renderer; `message` is surfaced as the
    /// message's `parseError`.
    Failed { placeholder: Value, message: String },
}

/// Bare object keys: `key:` needing `"key":`.
static UNQUOTED_KEY: LazyLock<Regex> =
    LazyLock::new(|| static_regex(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:"));

/// Single-quoted string values.
static SINGLE_QUOTED: LazyLock<Regex> = LazyLock::new(|| static_regex(r"'([^']*)'"));

/// Trailing comma before a closer.
static TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| static_regex(r",\s*([}\]])"));

/// Adjacent objects missing their separating comma.
static MISSING_COMMA: LazyLock<Regex> = LazyLock::new(|| static_regex(r"}\s*\{"));

/// Placeholder protecting escaped single quotes through the quote
/// conversion.
const ESCAPED_QUOTE_SENTINEL: char = '\u{1}';

pub fn repair_json(raw: &str) -> RepairOutcome {
    let trimmed = raw.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return RepairOutcome::Parsed(value);
    }

    let repaired = apply_syntactic_repairs(trimmed);
    if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
        return RepairOutcome::Parsed(value);
    }

    let balanced = close_open_delimiters(&repaired);
    match serde_json::from_str::<Value>(&balanced) {
        Ok(value) => RepairOutcome::Parsed(value),
        Err(err) => {
            if looks_like_contact_payload(trimmed) {
                debug!("payload unrepairable but carries contact markers, using default card");
                return RepairOutcome::ContactFallback(default_contact_payload());
            }
            let message = format!("could not repair data payload: {err}");
            let placeholder = json!({ "error": message.clone() });
            RepairOutcome::Failed {
                placeholder,
                message,
            }
        }
    }
}

fn apply_syntactic_repairs(payload: &str) -> String {
    let quoted_keys = UNQUOTED_KEY.replace_all(payload, |caps: &Captures<'_>| {
        format!("{}\"{}\":", &caps[1], &caps[2])
    });

    let protected = quoted_keys.replace("\\'", &ESCAPED_QUOTE_SENTINEL.to_string());
    let double_quoted = SINGLE_QUOTED.replace_all(&protected, |caps: &Captures<'_>| {
        // Inner double quotes would terminate the converted string early.
        format!("\"{}\"", caps[1].replace('"', "\\\""))
    });
    let restored = double_quoted.replace(ESCAPED_QUOTE_SENTINEL, "'");

    let no_trailing = TRAILING_COMMA.replace_all(&restored, |caps: &Captures<'_>| caps[1].to_string());
    MISSING_COMMA.replace_all(&no_trailing, "},{").into_owned()
}

/// Append the closers of any still-open `{`/`[`. The scan deliberately does
/// not skip string literals; miscounting a brace inside a string is an
/// accepted trade-off for never looping on garbage.
fn close_open_delimiters(payload: &str) -> String {
    let mut stack: Vec<char> = Vec::new();
    for ch in payload.chars() {
        match ch {
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&ch) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }
    if stack.is_empty() {
        return payload.to_string();
    }
    let mut out = String::with_capacity(payload.len() + stack.len());
    out.push_str(payload);
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

fn looks_like_contact_payload(payload: &str) -> bool {
    payload.contains("socialLinks") || payload.contains("Contact Form")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn parsed(raw: &str) -> Value {
        match repair_json(raw) {
            RepairOutcome::Parsed(value) => value,
            other => panic!("expected Parsed for {raw:?}, got {other:?}"),
        }
    }

    #[test]
    fn valid_json_round_trips() {
        let raw = r#"{"name": "Ada", "links": [1, 2, 3], "nested": {"ok": true}}"#;
        assert_eq!(parsed(raw), serde_json::from_str::<Value>(raw).expect("valid"));
    }

    #[test]
    fn unquoted_keys_are_quoted() {
        assert_eq!(parsed("{name: \"Bob\", age: 41}"), json!({"name": "Bob", "age": 41}));
    }

    #[test]
    fn single_quoted_values_convert() {
        assert_eq!(parsed("{\"name\": 'Bob'}"), json!({"name": "Bob"}));
    }

    #[test]
    fn escaped_single_quotes_survive_conversion() {
        assert_eq!(
            parsed("{\"bio\": 'it\\'s fine'}"),
            json!({"bio": "it's fine"})
        );
    }

    #[test]
    fn trailing_commas_are_stripped() {
        assert_eq!(
            parsed("{\"items\": [1, 2, 3,],}"),
            json!({"items": [1, 2, 3]})
        );
    }

    #[test]
    fn missing_comma_between_objects_is_inserted() {
        assert_eq!(
            parsed("[{\"a\": 1}{\"b\": 2}]"),
            json!([{"a": 1}, {"b": 2}])
        );
    }

    #[test]
    fn unbalanced_braces_are_closed() {
        assert_eq!(parsed("{\"a\":1"), json!({"a": 1}));
    }

    #[test]
    fn nested_unbalanced_closers_come_in_order() {
        assert_eq!(
            parsed("{\"rows\": [[1, 2"),
            json!({"rows": [[1, 2]]})
        );
    }

    #[test]
    fn contact_markers_fall_back_to_default_card() {
        let outcome = repair_json("socialLinks ::: totally broken");
        match outcome {
            RepairOutcome::ContactFallback(value) => {
                assert!(value.get("socialLinks").is_some());
            }
            other => panic!("expected contact fallback, got {other:?}"),
        }
    }

    #[test]
    fn unrecognizable_garbage_yields_error_placeholder() {
        match repair_json("<<<not json at all>>>") {
            RepairOutcome::Failed { placeholder, message } => {
                assert!(placeholder.get("error").is_some());
                assert!(!message.is_empty());
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn combined_repairs_compose() {
        assert_eq!(
            parsed("{name: 'Bob', skills: ['Rust', 'TS',]"),
            json!({"name": "Bob", "skills": ["Rust", "TS"]})
        );
    }
}
