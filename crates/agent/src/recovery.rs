//! Salvaging an answer from a parse failure.
//!
//! Parse failure details echo the raw model output. When that echo can be
//! found, the raw text becomes the response instead of an error. A
//! `<think>...</think>` block inside it is split off as the thinking.

use crate::react::parser::FINAL_ANSWER_MARKER;
use regex::Regex;
use std::sync::LazyLock;

/// Thinking reported when the model gave none.
pub const DEFAULT_THINKING: &str =
    "To help you with your request, I'll gather some relevant information.";

/// Known echo patterns, tried in order. Group 1 is the raw output.
static ECHO_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?is)could not parse llm output:[^`]*`(.+)`",
        r"(?is)produced both a final answer and a parse-able action::\s*(.+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid recovery pattern"))
    .collect()
});

static THINK_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<think>(.*?)</think>(.*)").expect("valid think-block pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovered {
    pub thinking: String,
    pub response: String,
}

/// Try to recover a usable answer from a failure detail.
pub fn recover(detail: &str) -> Option<Recovered> {
    let raw = ECHO_PATTERNS
        .iter()
        .find_map(|re| re.captures(detail).and_then(|c| c.get(1)))
        .map(|m| m.as_str().trim())?;

    let (thinking, body) = match THINK_BLOCK.captures(raw) {
        Some(caps) => (
            caps.get(1).map_or("", |m| m.as_str()).trim().to_string(),
            caps.get(2).map_or("", |m| m.as_str()),
        ),
        None => (String::new(), raw),
    };

    let response = match body.rfind(FINAL_ANSWER_MARKER) {
        Some(idx) => &body[idx + FINAL_ANSWER_MARKER.len()..],
        None => body,
    }
    .trim()
    .to_string();

    if response.is_empty() {
        return None;
    }

    Some(Recovered {
        thinking: if thinking.is_empty() {
            DEFAULT_THINKING.to_string()
        } else {
            thinking
        },
        response,
    })
}
