//! Streaming events.
//!
//! Every event serializes as `{"type": ..., "content": ...}` and is
//! self-describing, so the gateway can forward each one as its own SSE
//! frame. Which kinds a client receives depends on the [`StreamMode`].

use crate::turn::{FunctionCall, HistoryEntry, TurnResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A tool call as reported in `updates` mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUsage {
    pub tool: String,
    pub input: String,
    pub thought: String,
    pub observation: serde_json::Value,
}

/// Terminal snapshot of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredOutput {
    #[serde(flatten)]
    pub result: TurnResult,
    pub conversation_summary: String,
    pub conversation_history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResponse {
    pub response: String,
}

/// Events emitted to a streaming client.
///
/// - `thinking`          - model text before the final answer
/// - `token`             - final-answer text
/// - `tool_separator`    - a tool started or finished
/// - `tool_usage`        - a completed tool call with its observation
/// - `structured_update` - running {thinking, function_calls, response}
/// - `structured_output` - the final snapshot, sent once
/// - `error`             - a failure description
/// - `final`             - token-only mode's closing event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Thinking { content: String },
    Token { content: String },
    ToolSeparator { content: String, tool: String },
    ToolUsage { content: ToolUsage },
    StructuredUpdate { content: TurnResult },
    StructuredOutput { content: StructuredOutput },
    Error { content: String },
    Final { content: FinalResponse },
}

impl StreamEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Thinking { .. } => "thinking",
            Self::Token { .. } => "token",
            Self::ToolSeparator { .. } => "tool_separator",
            Self::ToolUsage { .. } => "tool_usage",
            Self::StructuredUpdate { .. } => "structured_update",
            Self::StructuredOutput { .. } => "structured_output",
            Self::Error { .. } => "error",
            Self::Final { .. } => "final",
        }
    }

    pub fn tool_open(tool: &str) -> Self {
        Self::ToolSeparator {
            content: format!("\n---Using {tool}---\n"),
            tool: tool.to_string(),
        }
    }

    pub fn tool_close(tool: &str) -> Self {
        Self::ToolSeparator {
            content: "\n---Tool Complete---\n".to_string(),
            tool: tool.to_string(),
        }
    }

    pub fn structured_update(
        thinking: &str,
        function_calls: &[FunctionCall],
        response: &str,
    ) -> Self {
        Self::StructuredUpdate {
            content: TurnResult {
                thinking: thinking.to_string(),
                function_calls: function_calls.to_vec(),
                response: response.to_string(),
            },
        }
    }
}

/// Which event kinds a stream carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
    /// Token-level: thinking, tokens, separators, structured updates.
    #[default]
    Messages,
    /// Step-level: one `tool_usage` per tool call.
    Updates,
    /// The union of `messages` and `updates`.
    Both,
    /// Answer tokens, then one `final` event.
    Tokens,
}

impl StreamMode {
    pub fn admits(self, event: &StreamEvent) -> bool {
        use StreamMode::*;
        match event {
            StreamEvent::Error { .. } => true,
            StreamEvent::Thinking { .. }
            | StreamEvent::ToolSeparator { .. }
            | StreamEvent::StructuredUpdate { .. } => matches!(self, Messages | Both),
            StreamEvent::Token { .. } => matches!(self, Messages | Both | Tokens),
            StreamEvent::ToolUsage { .. } => matches!(self, Updates | Both),
            StreamEvent::StructuredOutput { .. } => !matches!(self, Tokens),
            StreamEvent::Final { .. } => matches!(self, Tokens),
        }
    }
}

impl FromStr for StreamMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "messages" => Ok(Self::Messages),
            "updates" => Ok(Self::Updates),
            "both" => Ok(Self::Both),
            "tokens" => Ok(Self::Tokens),
            other => Err(format!(
                "unknown stream mode '{other}', expected one of: messages, updates, both, tokens"
            )),
        }
    }
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Messages => "messages",
            Self::Updates => "updates",
            Self::Both => "both",
            Self::Tokens => "tokens",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_wire_shape() {
        let event = StreamEvent::Token {
            content: "Hello".into(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "token", "content": "Hello"})
        );
    }

    #[test]
    fn separator_carries_tool() {
        let value = serde_json::to_value(StreamEvent::tool_open("WeatherTool")).unwrap();
        assert_eq!(
            value,
            json!({"type": "tool_separator", "content": "\n---Using WeatherTool---\n", "tool": "WeatherTool"})
        );
        let close = serde_json::to_value(StreamEvent::tool_close("WeatherTool")).unwrap();
        assert_eq!(close["content"], "\n---Tool Complete---\n");
    }

    #[test]
    fn structured_output_is_flat() {
        let event = StreamEvent::StructuredOutput {
            content: StructuredOutput {
                result: TurnResult {
                    thinking: "t".into(),
                    function_calls: vec![FunctionCall::new("TimeTool", "Rome")],
                    response: "r".into(),
                },
                conversation_summary: "s".into(),
                conversation_history: vec![],
            },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "structured_output");
        assert_eq!(value["content"]["thinking"], "t");
        assert_eq!(value["content"]["response"], "r");
        assert_eq!(value["content"]["conversation_summary"], "s");
        assert_eq!(value["content"]["function_calls"][0]["parameters"]["city"], "Rome");
    }

    #[test]
    fn events_deserialize_from_wire() {
        let event: StreamEvent =
            serde_json::from_str(r#"{"type":"final","content":{"response":"done"}}"#).unwrap();
        assert_eq!(
            event,
            StreamEvent::Final {
                content: FinalResponse {
                    response: "done".into()
                }
            }
        );
        assert_eq!(event.event_type(), "final");
    }

    #[test]
    fn mode_filters() {
        let thinking = StreamEvent::Thinking { content: "x".into() };
        let usage = StreamEvent::ToolUsage {
            content: ToolUsage {
                tool: "TimeTool".into(),
                input: "Rome".into(),
                thought: "t".into(),
                observation: json!({}),
            },
        };
        let error = StreamEvent::Error { content: "e".into() };

        assert!(StreamMode::Messages.admits(&thinking));
        assert!(!StreamMode::Messages.admits(&usage));
        assert!(StreamMode::Updates.admits(&usage));
        assert!(!StreamMode::Updates.admits(&thinking));
        assert!(StreamMode::Both.admits(&thinking) && StreamMode::Both.admits(&usage));
        assert!(!StreamMode::Tokens.admits(&thinking));
        for mode in [StreamMode::Messages, StreamMode::Updates, StreamMode::Both, StreamMode::Tokens] {
            assert!(mode.admits(&error));
        }
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("Updates".parse::<StreamMode>(), Ok(StreamMode::Updates));
        assert_eq!(StreamMode::default(), StreamMode::Messages);
        assert!("verbose".parse::<StreamMode>().is_err());
        let mode: StreamMode = serde_json::from_str(r#""both""#).unwrap();
        assert_eq!(mode, StreamMode::Both);
    }
}
