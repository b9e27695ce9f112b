//! Parser for single-input ReAct completions.
//!
//! A completion is either an action (`Action:` + `Action Input:`) or a
//! finish (`Final Answer:`). Anything else is a parse failure whose text
//! echoes the raw completion between backticks.

use regex::Regex;
use std::sync::LazyLock;

pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";
pub const OBSERVATION_STOP: &str = "\nObservation:";

static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)")
        .expect("valid action regex")
});
static ACTION_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Action\s*\d*\s*:").expect("valid action regex"));

/// One decision parsed from a completion.
#[derive(Debug, Clone, PartialEq)]
pub enum ReactStep {
    Action {
        tool: String,
        input: String,
        log: String,
    },
    Finish {
        answer: String,
        log: String,
    },
}

/// Parse a completion. The error is the human-readable failure detail.
pub fn parse_step(raw: &str) -> Result<ReactStep, String> {
    let text = match raw.find(OBSERVATION_STOP) {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    let includes_answer = text.contains(FINAL_ANSWER_MARKER);

    if let Some(caps) = ACTION_RE.captures(text) {
        if includes_answer {
            return Err(format!(
                "Parsing LLM output produced both a final answer and a parse-able action:: {text}"
            ));
        }
        let tool = caps.get(1).map_or("", |m| m.as_str()).trim().to_string();
        let input = caps
            .get(2)
            .map_or("", |m| m.as_str())
            .trim()
            .trim_matches('"')
            .to_string();
        return Ok(ReactStep::Action {
            tool,
            input,
            log: text.to_string(),
        });
    }

    if includes_answer {
        let answer = text
            .rsplit(FINAL_ANSWER_MARKER)
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        return Ok(ReactStep::Finish {
            answer,
            log: text.to_string(),
        });
    }

    if ACTION_ONLY_RE.is_match(text) {
        return Err(format!(
            "Could not parse LLM output: missing 'Action Input:' after 'Action:' in `{text}`"
        ));
    }
    Err(format!("Could not parse LLM output: `{text}`"))
}

/// The first line of a step's log with any `Thought:` prefix removed, or
/// the whole log when it does not open with one.
pub fn extract_thought(log: &str) -> String {
    let first = log.trim_start().lines().next().unwrap_or_default();
    match first.strip_prefix("Thought:") {
        Some(rest) => rest.trim().to_string(),
        None => log.trim().to_string(),
    }
}
