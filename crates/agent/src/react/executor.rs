//! The ReAct loop.
//!
//! Each iteration streams one completion from the model, parses it into an
//! action or a final answer, and for an action invokes the tool and feeds
//! the observation back through the scratchpad. The loop ends on a final
//! answer, a parse failure, or after `max_iterations` completions.
//!
//! Callers that want to watch the loop pass an event sender; every model
//! delta and tool boundary is reported on it in the order it happened.

use super::parser::{FINAL_ANSWER_MARKER, OBSERVATION_STOP, ReactStep, parse_step};
use crate::prompts::{SYSTEM_GUIDANCE, render_react_prompt};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use wayfarer_core::error::ProviderError;
use wayfarer_core::event::{DomainEvent, EventBus};
use wayfarer_core::message::Message;
use wayfarer_core::provider::{Provider, ProviderRequest};
use wayfarer_core::tool::{Observation, ToolRegistry};

/// A tool call the model decided on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAction {
    /// Registered tool name, or the raw name when it matched no tool.
    pub tool: String,
    pub input: String,
    /// The completion text the action was parsed from.
    pub log: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub action: AgentAction,
    pub observation: Observation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    Finished { answer: String },
    IterationCapped,
}

#[derive(Debug, Clone)]
pub struct ReasoningOutcome {
    pub steps: Vec<ReasoningStep>,
    pub termination: Termination,
}

#[derive(Debug, Error)]
pub enum ReasoningError {
    /// The model produced text that is neither an action nor an answer.
    #[error("{detail}")]
    OutputParsing {
        detail: String,
        steps: Vec<ReasoningStep>,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Lifecycle callbacks reported while the loop runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ReasoningEvent {
    /// A model call is starting.
    LlmStart,
    /// A non-empty model delta.
    Token(String),
    /// The model has started its final answer; later tokens belong to it.
    AnswerStart,
    ToolStart { tool: String, input: String },
    ToolEnd { step: ReasoningStep },
}

pub struct ReactExecutor {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Arc<ToolRegistry>,
    max_iterations: u32,
    event_bus: Option<Arc<EventBus>>,
}

impl ReactExecutor {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            tools,
            max_iterations: 5,
            event_bus: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set max iterations. Zero is treated as one.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run the loop for one question.
    pub async fn run(
        &self,
        input: &str,
        events: Option<&UnboundedSender<ReasoningEvent>>,
    ) -> Result<ReasoningOutcome, ReasoningError> {
        let tool_descriptions = self.tools.describe();
        let tool_names = self.tools.names().join(", ");
        let mut scratchpad = String::new();
        let mut steps: Vec<ReasoningStep> = Vec::new();

        info!(model = %self.model, max_iter = self.max_iterations, "ReAct loop starting");

        for iteration in 1..=self.max_iterations {
            debug!(iteration, "ReAct iteration");

            let prompt = render_react_prompt(&tool_descriptions, &tool_names, input, &scratchpad);
            let request = ProviderRequest {
                model: self.model.clone(),
                messages: vec![Message::system(SYSTEM_GUIDANCE), Message::user(prompt)],
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                stop: vec![OBSERVATION_STOP.to_string()],
            };

            emit(events, ReasoningEvent::LlmStart);
            let completion = self.generate(request, events).await?;

            match parse_step(&completion) {
                Ok(ReactStep::Finish { answer, .. }) => {
                    info!(iterations = iteration, tool_calls = steps.len(), "ReAct loop completed");
                    return Ok(ReasoningOutcome {
                        steps,
                        termination: Termination::Finished { answer },
                    });
                }
                Ok(ReactStep::Action { tool, input: city, log }) => {
                    let step = self.act(tool, city, log, events).await;
                    scratchpad.push_str(&step.action.log);
                    scratchpad.push_str(&format!(
                        "\nObservation: {}\nThought: ",
                        step.observation.render()
                    ));
                    steps.push(step);
                }
                Err(detail) => {
                    warn!(iteration, "Could not parse model output");
                    return Err(ReasoningError::OutputParsing { detail, steps });
                }
            }
        }

        warn!("ReAct: max iterations reached ({})", self.max_iterations);
        Ok(ReasoningOutcome {
            steps,
            termination: Termination::IterationCapped,
        })
    }

    /// Stream one completion, reporting deltas as they arrive.
    async fn generate(
        &self,
        request: ProviderRequest,
        events: Option<&UnboundedSender<ReasoningEvent>>,
    ) -> Result<String, ProviderError> {
        let mut rx = self.provider.stream(request).await?;
        let mut text = String::new();
        let mut answering = false;
        // Until the first answer text arrives, leading whitespace is dropped.
        let mut answer_opened = false;

        while let Some(chunk) = rx.recv().await {
            let chunk = chunk?;
            if let Some(delta) = chunk.content.filter(|c| !c.is_empty()) {
                let before = text.len();
                text.push_str(&delta);

                if answering {
                    let piece = if answer_opened { delta.as_str() } else { delta.trim_start() };
                    if !piece.is_empty() {
                        answer_opened = true;
                        emit(events, ReasoningEvent::Token(piece.to_string()));
                    }
                } else if let Some(pos) = text.find(FINAL_ANSWER_MARKER) {
                    answering = true;
                    // The marker may have started in an earlier delta.
                    let lead = &delta[..pos.saturating_sub(before)];
                    if !lead.is_empty() {
                        emit(events, ReasoningEvent::Token(lead.to_string()));
                    }
                    emit(events, ReasoningEvent::AnswerStart);
                    let rest = delta[pos + FINAL_ANSWER_MARKER.len() - before..].trim_start();
                    if !rest.is_empty() {
                        answer_opened = true;
                        emit(events, ReasoningEvent::Token(rest.to_string()));
                    }
                } else {
                    emit(events, ReasoningEvent::Token(delta));
                }
            }
            if chunk.done {
                break;
            }
        }

        Ok(text)
    }

    async fn act(
        &self,
        tool: String,
        city: String,
        log: String,
        events: Option<&UnboundedSender<ReasoningEvent>>,
    ) -> ReasoningStep {
        let Some(name) = self.tools.get(&tool).map(|t| t.name().to_string()) else {
            debug!(tool = %tool, "Model asked for an unknown tool");
            let observation = Observation::text(format!(
                "{tool} is not a valid tool, try one of [{}].",
                self.tools.names().join(", ")
            ));
            return ReasoningStep {
                action: AgentAction { tool, input: city, log },
                observation,
            };
        };

        emit(
            events,
            ReasoningEvent::ToolStart {
                tool: name.clone(),
                input: city.clone(),
            },
        );

        let started = Instant::now();
        let observation = self.tools.invoke(&name, &city).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::ToolInvoked {
                tool_name: name.clone(),
                success: !observation.is_error(),
                duration_ms,
                timestamp: Utc::now(),
            });
        }

        let step = ReasoningStep {
            action: AgentAction {
                tool: name,
                input: city,
                log,
            },
            observation,
        };
        emit(events, ReasoningEvent::ToolEnd { step: step.clone() });
        step
    }
}

fn emit(events: Option<&UnboundedSender<ReasoningEvent>>, event: ReasoningEvent) {
    if let Some(tx) = events {
        // A closed receiver means nobody is watching any more.
        let _ = tx.send(event);
    }
}
