//! Display-only span tokenizer for answer text.
//!
//! One left-to-right scan finds the nearest next match among all span kinds,
//! so segmentation is deterministic and spans never overlap regardless of
//! how the patterns would interact when chained.

use std::sync::LazyLock;

use regex_lite::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    Text(String),
    Bold(String),
    Italic(String),
    Code(String),
    Link { label: String, href: String },
    Email(String),
    Url(String),
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Bold,
    Italic,
    Code,
    Link,
    Email,
    Url,
}

fn literal_regex(pattern: &str) -> Regex {
    #[allow(clippy::expect_used)]
    Regex::new(pattern).expect("literal pattern compiles")
}

static BOLD: LazyLock<Regex> = LazyLock::new(|| literal_regex(r"\*\*([^*]+)\*\*"));
static ITALIC: LazyLock<Regex> = LazyLock::new(|| literal_regex(r"\*([^*\s][^*]*)\*"));
static CODE: LazyLock<Regex> = LazyLock::new(|| literal_regex(r"`([^`]+)`"));
static LINK: LazyLock<Regex> = LazyLock::new(|| literal_regex(r"\[([^\]]+)\]\(([^)\s]+)\)"));
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| literal_regex(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}"));
static URL: LazyLock<Regex> = LazyLock::new(|| literal_regex(r"https?://[^\s)\]>]+"));

/// Kinds in tie-break order: when two patterns match at the same offset the
/// earlier kind wins.
static KINDS: &[(Kind, &LazyLock<Regex>)] = &[
    (Kind::Bold, &BOLD),
    (Kind::Italic, &ITALIC),
    (Kind::Code, &CODE),
    (Kind::Link, &LINK),
    (Kind::Email, &EMAIL),
    (Kind::Url, &URL),
];

pub fn tokenize(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let nearest = KINDS
            .iter()
            .filter_map(|(kind, regex)| regex.find(rest).map(|m| (*kind, m.start(), m.end())))
            .min_by_key(|(_, start, _)| *start);

        let Some((kind, start, end)) = nearest else {
            spans.push(Span::Text(rest.to_string()));
            break;
        };
        if start > 0 {
            spans.push(Span::Text(rest[..start].to_string()));
        }

        let matched = &rest[start..end];
        spans.push(to_span(kind, matched));
        rest = &rest[end..];
    }
    spans
}

fn to_span(kind: Kind, matched: &str) -> Span {
    let captures = |regex: &Regex, group: usize| -> String {
        regex
            .captures(matched)
            .and_then(|caps| caps.get(group))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| matched.to_string())
    };

    match kind {
        Kind::Bold => Span::Bold(captures(&BOLD, 1)),
        Kind::Italic => Span::Italic(captures(&ITALIC, 1)),
        Kind::Code => Span::Code(captures(&CODE, 1)),
        Kind::Link => Span::Link {
            label: captures(&LINK, 1),
            href: captures(&LINK, 2),
        },
        Kind::Email => Span::Email(matched.to_string()),
        Kind::Url => Span::Url(matched.to_string()),
    }
}

/// Render spans with minimal ANSI styling for the terminal.
pub fn render(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for span in tokenize(text) {
        match span {
            Span::Text(t) => out.push_str(&t),
            Span::Bold(t) => out.push_str(&format!("\x1b[1m{t}\x1b[0m")),
            Span::Italic(t) => out.push_str(&format!("\x1b[3m{t}\x1b[0m")),
            Span::Code(t) => out.push_str(&format!("\x1b[2m`{t}`\x1b[0m")),
            Span::Link { label, href } => out.push_str(&format!("\x1b[4m{label}\x1b[0m ({href})")),
            Span::Email(t) | Span::Url(t) => out.push_str(&format!("\x1b[4m{t}\x1b[0m")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn plain_text_is_one_span() {
        assert_eq!(
            tokenize("nothing special"),
            vec![Span::Text("nothing special".to_string())]
        );
    }

    #[test]
    fn bold_wins_over_italic_at_the_same_offset() {
        assert_eq!(
            tokenize("**really** plain"),
            vec![
                Span::Bold("really".to_string()),
                Span::Text(" plain".to_string()),
            ]
        );
    }

    #[test]
    fn nearest_match_wins_across_kinds() {
        assert_eq!(
            tokenize("see `code` then **bold**"),
            vec![
                Span::Text("see ".to_string()),
                Span::Code("code".to_string()),
                Span::Text(" then ".to_string()),
                Span::Bold("bold".to_string()),
            ]
        );
    }

    #[test]
    fn links_emails_and_urls_tokenize() {
        assert_eq!(
            tokenize("[repo](https://github.com/folio-dev) or hello@folio.dev or https://folio.dev"),
            vec![
                Span::Link {
                    label: "repo".to_string(),
                    href: "https://github.com/folio-dev".to_string(),
                },
                Span::Text(" or ".to_string()),
                Span::Email("hello@folio.dev".to_string()),
                Span::Text(" or ".to_string()),
                Span::Url("https://folio.dev".to_string()),
            ]
        );
    }

    #[test]
    fn segmentation_is_deterministic_and_non_overlapping() {
        let spans = tokenize("*a* **b** *c*");
        assert_eq!(
            spans,
            vec![
                Span::Italic("a".to_string()),
                Span::Text(" ".to_string()),
                Span::Bold("b".to_string()),
                Span::Text(" ".to_string()),
                Span::Italic("c".to_string()),
            ]
        );
    }
}
