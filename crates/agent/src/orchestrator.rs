//! Turn orchestration: memory in, reasoning, memory out.
//!
//! A turn reads the session's summary and recent history, composes the
//! question the reasoning loop sees, runs the loop, normalizes whatever
//! came back into a [`TurnResult`], and records the exchange. Only an
//! unrecoverable failure skips the memory update.

use crate::multiplexer::{self, EventStream};
use crate::prompts::compose_input;
use crate::react::{
    ReactExecutor, ReasoningError, ReasoningEvent, ReasoningOutcome, ReasoningStep, Termination,
};
use crate::recovery::recover;
use crate::stream_event::StreamMode;
use crate::turn::{
    Completion, FunctionCall, TurnOutcome, TurnResult, history_entries, synthesize_response,
    thinking_from,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};
use wayfarer_core::event::{DomainEvent, EventBus};
use wayfarer_core::memory::{DEFAULT_SESSION_ID, SessionMemory};
use wayfarer_core::{Error, Result};

/// Default capacity of the per-request event queue.
const DEFAULT_STREAM_BUFFER: usize = 128;

pub struct TurnOrchestrator {
    memory: Arc<dyn SessionMemory>,
    executor: ReactExecutor,
    event_bus: Option<Arc<EventBus>>,
    stream_buffer: usize,
}

impl TurnOrchestrator {
    pub fn new(memory: Arc<dyn SessionMemory>, executor: ReactExecutor) -> Self {
        Self {
            memory,
            executor,
            event_bus: None,
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Capacity of the queue between the reasoning task and the consumer.
    pub fn with_stream_buffer(mut self, capacity: usize) -> Self {
        self.stream_buffer = capacity.max(1);
        self
    }

    pub fn memory(&self) -> &Arc<dyn SessionMemory> {
        &self.memory
    }

    pub(crate) fn stream_buffer(&self) -> usize {
        self.stream_buffer
    }

    /// Answer one message for one session.
    pub async fn run_turn(&self, session_id: &str, user_text: &str) -> Result<TurnOutcome> {
        self.execute(session_id, user_text, None).await
    }

    /// Answer one message as an ordered event stream.
    pub fn run_turn_stream(
        self: &Arc<Self>,
        session_id: &str,
        user_text: &str,
        mode: StreamMode,
    ) -> EventStream {
        multiplexer::spawn(self.clone(), session_id, user_text, mode)
    }

    pub(crate) async fn execute(
        &self,
        session_id: &str,
        user_text: &str,
        events: Option<&UnboundedSender<ReasoningEvent>>,
    ) -> Result<TurnOutcome> {
        let session_id = match session_id.trim() {
            "" => DEFAULT_SESSION_ID,
            id => id,
        };

        let snapshot = self.memory.read(session_id).await;
        let input = compose_input(
            &snapshot.summary,
            &snapshot.recent_messages,
            user_text,
            snapshot.stats.buffer_size,
        );

        let (steps, completion, response, thinking) = match self.executor.run(&input, events).await
        {
            Ok(ReasoningOutcome {
                steps,
                termination: Termination::Finished { answer },
            }) if !answer.trim().is_empty() => (steps, Completion::Finished, answer, None),
            Ok(ReasoningOutcome {
                steps,
                termination: Termination::Finished { .. },
            }) => {
                warn!(session_id, "Model returned an empty final answer");
                let response = synthesize_response(&steps);
                (steps, Completion::Finished, response, None)
            }
            Ok(ReasoningOutcome {
                steps,
                termination: Termination::IterationCapped,
            }) => {
                let response = synthesize_response(&steps);
                (steps, Completion::IterationCapped, response, None)
            }
            Err(ReasoningError::OutputParsing { detail, steps }) => match recover(&detail) {
                Some(recovered) => {
                    warn!(session_id, "Recovered answer from unparseable model output");
                    (
                        steps,
                        Completion::Recovered { detail },
                        recovered.response,
                        Some(recovered.thinking),
                    )
                }
                None => {
                    self.report_error(session_id, &detail);
                    return Err(Error::Processing { detail });
                }
            },
            Err(ReasoningError::Provider(e)) => {
                self.report_error(session_id, &e.to_string());
                return Err(Error::Provider(e));
            }
        };

        let result = TurnResult {
            thinking: thinking.unwrap_or_else(|| thinking_from(&steps)),
            function_calls: self.function_calls(&steps),
            response,
        };

        self.memory
            .append_exchange(session_id, user_text, &result.response)
            .await;
        let after = self.memory.read(session_id).await;

        info!(
            session_id,
            completion = completion.label(),
            tool_calls = result.function_calls.len(),
            "Turn completed"
        );
        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::TurnCompleted {
                session_id: session_id.to_string(),
                completion: completion.label().to_string(),
                tool_calls: result.function_calls.len(),
                timestamp: Utc::now(),
            });
        }

        Ok(TurnOutcome {
            result,
            steps,
            completion,
            conversation_summary: after.summary,
            conversation_history: history_entries(&after.recent_messages),
        })
    }

    /// Calls to registered tools, in order. Invalid tool names are left out.
    fn function_calls(&self, steps: &[ReasoningStep]) -> Vec<FunctionCall> {
        steps
            .iter()
            .filter(|s| self.executor.tools().get(&s.action.tool).is_some())
            .map(|s| FunctionCall::new(&s.action.tool, &s.action.input))
            .collect()
    }

    fn report_error(&self, session_id: &str, detail: &str) {
        warn!(session_id, error = %detail, "Turn failed");
        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::ErrorOccurred {
                context: format!("turn:{session_id}"),
                error_message: detail.to_string(),
                timestamp: Utc::now(),
            });
        }
    }
}
