//! Prompt templates and effective-prompt composition.

use regex::{Captures, Regex};
use std::sync::LazyLock;
use wayfarer_core::message::{Message, Role};

/// Guidance sent as the system message on every reasoning call.
pub const SYSTEM_GUIDANCE: &str = "You are a helpful travel assistant with access to weather, local time, and city facts tools.

Always format responses with:
- Current weather summary
- Local time
- 2 interesting city facts
- Clear reasoning explanation";

/// The single-input ReAct template. `{tools}`, `{tool_names}`, `{input}`
/// and `{agent_scratchpad}` are substituted by [`render_react_prompt`].
pub const REACT_TEMPLATE: &str = "Answer the following questions as best you can. You have access to the following tools:

{tools}

Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question

Begin!

Question: {input}
Thought:{agent_scratchpad}";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(tools|tool_names|input|agent_scratchpad)\}").expect("valid placeholder pattern")
});

/// Fill the ReAct template in one pass; substituted text is never rescanned.
pub fn render_react_prompt(tools: &str, tool_names: &str, input: &str, scratchpad: &str) -> String {
    PLACEHOLDER
        .replace_all(REACT_TEMPLATE, |caps: &Captures| match &caps[1] {
            "tools" => tools,
            "tool_names" => tool_names,
            "input" => input,
            _ => scratchpad,
        })
        .into_owned()
}

/// Build the question the reasoning loop sees.
///
/// The summary comes first, then recent history, then the question. Recent
/// history is trimmed from the oldest end until it fits `history_budget`
/// estimated tokens. With no prior context the question passes through
/// unchanged.
pub fn compose_input(
    summary: &str,
    recent: &[Message],
    question: &str,
    history_budget: usize,
) -> String {
    let summary = summary.trim();
    let history = fit_history(recent, history_budget);

    if summary.is_empty() && history.is_empty() {
        return question.to_string();
    }

    let mut sections = Vec::with_capacity(3);
    if !summary.is_empty() {
        sections.push(format!("Summary of the earlier conversation:\n{summary}"));
    }
    if !history.is_empty() {
        let lines = history
            .iter()
            .map(|m| format!("{}: {}", speaker(m.role), m.content))
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(format!("Recent conversation:\n{lines}"));
    }
    sections.push(format!("Current question: {question}"));
    sections.join("\n\n")
}

/// Newest messages whose combined estimate fits the budget, oldest first.
fn fit_history(recent: &[Message], budget: usize) -> &[Message] {
    let mut used = 0usize;
    let mut start = recent.len();
    for (idx, message) in recent.iter().enumerate().rev() {
        used += message.estimated_tokens();
        if used > budget {
            break;
        }
        start = idx;
    }
    &recent[start..]
}

fn speaker(role: Role) -> &'static str {
    match role {
        Role::User => "Human",
        Role::Assistant => "AI",
        Role::System => "System",
    }
}
