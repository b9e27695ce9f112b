//! Turn results and their wire shapes.

use crate::react::{ReasoningStep, extract_thought};
use crate::recovery::DEFAULT_THINKING;
use serde::{Deserialize, Serialize};
use wayfarer_core::message::Message;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolParameters {
    pub city: String,
}

/// One tool invocation, in call order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub tool: String,
    pub parameters: ToolParameters,
}

impl FunctionCall {
    pub fn new(tool: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            parameters: ToolParameters { city: city.into() },
        }
    }
}

/// The normalized answer to one user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnResult {
    pub thinking: String,
    pub function_calls: Vec<FunctionCall>,
    pub response: String,
}

/// How the reasoning loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The model gave a final answer.
    Finished,
    /// The iteration cap was hit; the response was built from observations.
    IterationCapped,
    /// The model output could not be parsed but its text was salvaged.
    Recovered { detail: String },
}

impl Completion {
    pub fn label(&self) -> &'static str {
        match self {
            Completion::Finished => "finished",
            Completion::IterationCapped => "iteration_capped",
            Completion::Recovered { .. } => "recovered",
        }
    }
}

/// A history line as clients see it: `{"type": "human"|"ai", "content"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
}

impl From<&Message> for HistoryEntry {
    fn from(message: &Message) -> Self {
        Self {
            kind: message.role.history_label().to_string(),
            content: message.content.clone(),
        }
    }
}

pub fn history_entries(messages: &[Message]) -> Vec<HistoryEntry> {
    messages.iter().map(HistoryEntry::from).collect()
}

/// Everything a completed turn produced, including the memory state
/// after its exchange was recorded.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub result: TurnResult,
    pub steps: Vec<ReasoningStep>,
    pub completion: Completion,
    pub conversation_summary: String,
    pub conversation_history: Vec<HistoryEntry>,
}

/// The first step's thought, or the stock placeholder.
pub fn thinking_from(steps: &[ReasoningStep]) -> String {
    steps
        .first()
        .map(|s| extract_thought(&s.action.log))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_THINKING.to_string())
}

/// Best-effort answer from collected observations: facts, then weather,
/// then time, separated by blank lines. Error observations are skipped.
pub fn synthesize_response(steps: &[ReasoningStep]) -> String {
    let mut facts = None;
    let mut weather = None;
    let mut time = None;

    for step in steps.iter().filter(|s| !s.observation.is_error()) {
        let obs = &step.observation;
        match step.action.tool.as_str() {
            "CityFactsTool" => {
                facts = obs.field("summary").map(str::to_string);
            }
            "WeatherTool" => {
                weather = Some(format!(
                    "Currently {} and {}. Humidity is {} with wind speed of {}.",
                    obs.field("temperature").unwrap_or_default(),
                    obs.field("weather").unwrap_or_default(),
                    obs.field("humidity").unwrap_or_default(),
                    obs.field("wind_speed").unwrap_or_default(),
                ));
            }
            "TimeTool" => {
                time = Some(format!(
                    "The local time is {} ({}).",
                    obs.field("datetime").unwrap_or_default(),
                    obs.field("timezone").unwrap_or_default(),
                ));
            }
            _ => {}
        }
    }

    let parts: Vec<String> = [facts, weather, time]
        .into_iter()
        .flatten()
        .filter(|p| !p.trim().is_empty())
        .collect();

    if parts.is_empty() {
        "I wasn't able to finish gathering information for your request. Please try asking again, perhaps about a specific city.".to_string()
    } else {
        parts.join("\n\n")
    }
}

/// Step as reported under `reasoning.steps`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepView {
    pub thought: String,
    pub action: String,
    pub action_input: String,
    pub observation: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningView {
    pub thinking: String,
    pub steps: Vec<StepView>,
}

/// The body returned for a non-streaming chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResponse {
    pub response: String,
    pub reasoning: ReasoningView,
    pub history: Vec<HistoryEntry>,
    pub agent_response: TurnResult,
}

impl From<TurnOutcome> for TurnResponse {
    fn from(outcome: TurnOutcome) -> Self {
        let steps = outcome
            .steps
            .into_iter()
            .map(|s| StepView {
                thought: s.action.log,
                action: s.action.tool,
                action_input: s.action.input,
                observation: s.observation.0,
            })
            .collect();

        Self {
            response: outcome.result.response.clone(),
            reasoning: ReasoningView {
                thinking: outcome.result.thinking.clone(),
                steps,
            },
            history: outcome.conversation_history,
            agent_response: outcome.result,
        }
    }
}
