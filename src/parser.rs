//! Locate and parse the delimited JSON payload in a model response.
//!
//! Never fails: a missing or unreadable payload is reported as
//! [`ParsedPayload::Empty`] so later stages can skip their work explicitly.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::prompt::{JSON_CLOSE_TAG, JSON_OPEN_TAG};

static PAYLOAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Non-greedy: each tag pair is its own region.
    let pattern = format!(
        r"(?s){}(.*?){}",
        regex::escape(JSON_OPEN_TAG),
        regex::escape(JSON_CLOSE_TAG)
    );
    Regex::new(&pattern).expect("payload regex is valid")
});

/// Why nothing usable came out of a response.
#[derive(Debug, Clone, PartialEq)]
pub enum EmptyReason {
    /// No `<JSON>…</JSON>` region in the text
    MissingDelimiters,
    /// The region did not hold valid JSON
    Malformed(String),
    /// Valid JSON, but not an object
    NotAnObject,
}

impl std::fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmptyReason::MissingDelimiters => write!(f, "no delimited JSON payload in response"),
            EmptyReason::Malformed(e) => write!(f, "malformed JSON payload: {}", e),
            EmptyReason::NotAnObject => write!(f, "JSON payload is not an object"),
        }
    }
}

/// Result of parsing a model response.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedPayload {
    Empty(EmptyReason),
    Extracted(Value),
}

/// Extract the structured payload from raw model text.
pub fn parse_response(text: &str) -> ParsedPayload {
    let regions: Vec<&str> = PAYLOAD_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| strip_code_fence(m.as_str()))
        .collect();
    if regions.is_empty() {
        debug!("No JSON delimiters found in {} chars of response", text.len());
        return ParsedPayload::Empty(EmptyReason::MissingDelimiters);
    }

    // An empty tag pair echoed in the reasoning is skipped.
    let json_str = regions
        .iter()
        .copied()
        .find(|r| !r.is_empty())
        .unwrap_or_default();

    match serde_json::from_str::<Value>(json_str) {
        Ok(value @ Value::Object(_)) => ParsedPayload::Extracted(value),
        Ok(_) => {
            warn!("Delimited payload is valid JSON but not an object");
            ParsedPayload::Empty(EmptyReason::NotAnObject)
        }
        Err(e) => {
            warn!(
                "Error parsing JSON payload: {} (starts with: {})",
                e,
                json_str.chars().take(200).collect::<String>()
            );
            ParsedPayload::Empty(EmptyReason::Malformed(e.to_string()))
        }
    }
}

/// Remove a markdown code fence the model sometimes adds inside the tags.
fn strip_code_fence(s: &str) -> &str {
    let trimmed = s.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
