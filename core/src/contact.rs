//! Contact-card heuristics.
//!
//! The backend is trusted to only use contact phrasing when it actually
//! wants the contact card, so detection is a substring scan rather than a
//! structural signal. Everything heuristic about that lives in this module
//! so a structural replacement has exactly one seam.

use serde_json::Value;
use serde_json::json;

/// The address the assistant hands out; also a latch trigger on its own.
pub const CONTACT_EMAIL: &str = "hello@folio.dev";

/// Lowercase fragments that flip a message to the contact card.
const CONTACT_KEYWORDS: &[&str] = &[
    "email:",
    "contact form",
    "get in touch",
    "reach me",
    CONTACT_EMAIL,
];

/// Whether a chunk of answer text reads like the assistant is offering
/// contact details.
pub(crate) fn mentions_contact(text: &str) -> bool {
    let lowered = text.to_lowercase();
    CONTACT_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

/// Canonical contact payload used when the backend's own payload is absent
/// or beyond repair.
pub fn default_contact_payload() -> Value {
    json!({
        "heading": "Contact Form",
        "email": CONTACT_EMAIL,
        "socialLinks": [
            { "label": "GitHub", "url": "https://github.com/folio-dev" },
            { "label": "LinkedIn", "url": "https://www.linkedin.com/in/folio-dev" },
        ],
    })
}
