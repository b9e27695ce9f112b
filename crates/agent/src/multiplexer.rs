//! Event stream multiplexer.
//!
//! A streamed turn runs on its own task. The reasoning loop reports
//! lifecycle callbacks on an unbounded queue so it never waits on the
//! client; a single drain loop turns them into [`StreamEvent`]s and feeds
//! a bounded channel the consumer reads. The consumer sees the channel
//! close once the last event has been delivered.
//!
//! Dropping the [`EventStream`] cancels the task, and a consumer that goes
//! away is noticed through the closed channel.
//!
//! Text after `</think>` is held until the reasoning loop says which way
//! the call went: an action turns it into thinking, an answer keeps it
//! back and `finish` reports the parsed response instead.
//!
//! Known limitation: `<think>` and `</think>` are detected per chunk. A
//! marker split across two chunks is not recognized.

use crate::orchestrator::TurnOrchestrator;
use crate::react::{ReasoningEvent, extract_thought};
use crate::recovery::DEFAULT_THINKING;
use crate::stream_event::{FinalResponse, StreamEvent, StreamMode, StructuredOutput, ToolUsage};
use crate::turn::{Completion, FunctionCall, TurnOutcome};
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Where model tokens currently go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Thinking,
    /// After `</think>`, before the loop has seen an action or an answer.
    Pending,
    Tool,
    Answer,
}

/// Turns reasoning callbacks into client events. Single owner, no locking.
#[derive(Debug)]
pub struct Multiplexer {
    mode: StreamMode,
    section: Section,
    thinking: Option<String>,
    function_calls: Vec<FunctionCall>,
    response: String,
    answer_tokens: usize,
    pending: String,
    answering: bool,
}

impl Multiplexer {
    pub fn new(mode: StreamMode) -> Self {
        Self {
            mode,
            section: Section::Thinking,
            thinking: None,
            function_calls: Vec::new(),
            response: String::new(),
            answer_tokens: 0,
            pending: String::new(),
            answering: false,
        }
    }

    /// Events for one callback, already filtered for the stream mode.
    pub fn on_event(&mut self, event: ReasoningEvent) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        match event {
            ReasoningEvent::LlmStart => {
                self.flush_pending(&mut out);
                self.section = Section::Thinking;
                self.answering = false;
                self.response.clear();
                self.answer_tokens = 0;
            }
            ReasoningEvent::AnswerStart => {
                // Held text is the preamble before `Final Answer:`.
                self.flush_pending(&mut out);
                self.section = Section::Answer;
                self.answering = true;
            }
            ReasoningEvent::Token(chunk) => self.on_token(&chunk, &mut out),
            ReasoningEvent::ToolStart { tool, input } => {
                self.flush_pending(&mut out);
                self.section = Section::Tool;
                self.answering = false;
                out.push(StreamEvent::tool_open(&tool));
                self.function_calls.push(FunctionCall::new(tool, input));
            }
            ReasoningEvent::ToolEnd { step } => {
                self.section = Section::Thinking;
                let thought = extract_thought(&step.action.log);
                if self.thinking.is_none() {
                    self.thinking = Some(thought.clone());
                }
                out.push(StreamEvent::tool_close(&step.action.tool));
                out.push(StreamEvent::ToolUsage {
                    content: ToolUsage {
                        tool: step.action.tool,
                        input: step.action.input,
                        thought,
                        observation: step.observation.0,
                    },
                });
            }
        }
        self.admitted(out)
    }

    /// Closing events once the turn has finished or failed.
    pub fn finish(&mut self, outcome: wayfarer_core::Result<TurnOutcome>) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        // Whatever is still held is covered by the response below.
        self.pending.clear();
        match outcome {
            Ok(outcome) => {
                if let Completion::Recovered { detail } = &outcome.completion {
                    out.push(StreamEvent::Error {
                        content: detail.clone(),
                    });
                    out.push(StreamEvent::Token {
                        content: outcome.result.response.clone(),
                    });
                } else if self.answer_tokens == 0 {
                    out.push(StreamEvent::Token {
                        content: outcome.result.response.clone(),
                    });
                }
                out.push(StreamEvent::Final {
                    content: FinalResponse {
                        response: outcome.result.response.clone(),
                    },
                });
                out.push(StreamEvent::StructuredOutput {
                    content: StructuredOutput {
                        result: outcome.result,
                        conversation_summary: outcome.conversation_summary,
                        conversation_history: outcome.conversation_history,
                    },
                });
            }
            Err(e) => out.push(StreamEvent::Error {
                content: e.to_string(),
            }),
        }
        self.admitted(out)
    }

    fn on_token(&mut self, chunk: &str, out: &mut Vec<StreamEvent>) {
        let mut text = chunk;

        if let Some(idx) = text.find(THINK_OPEN) {
            self.route(&text[..idx], out);
            self.section = Section::Thinking;
            text = &text[idx + THINK_OPEN.len()..];
        }

        if let Some(idx) = text.find(THINK_CLOSE) {
            self.route(&text[..idx], out);
            self.section = if self.answering {
                Section::Answer
            } else {
                Section::Pending
            };
            text = text[idx + THINK_CLOSE.len()..].trim_start();
        }

        self.route(text, out);
    }

    fn route(&mut self, text: &str, out: &mut Vec<StreamEvent>) {
        if text.is_empty() {
            return;
        }
        match self.section {
            Section::Thinking => out.push(StreamEvent::Thinking {
                content: text.to_string(),
            }),
            Section::Pending => self.pending.push_str(text),
            // Model output while a tool runs is not forwarded.
            Section::Tool => {}
            Section::Answer => {
                self.answer_tokens += 1;
                self.response.push_str(text);
                out.push(StreamEvent::Token {
                    content: text.to_string(),
                });
                out.push(StreamEvent::structured_update(
                    self.thinking.as_deref().unwrap_or(DEFAULT_THINKING),
                    &self.function_calls,
                    &self.response,
                ));
            }
        }
    }

    fn flush_pending(&mut self, out: &mut Vec<StreamEvent>) {
        if !self.pending.is_empty() {
            out.push(StreamEvent::Thinking {
                content: std::mem::take(&mut self.pending),
            });
        }
    }

    fn admitted(&self, events: Vec<StreamEvent>) -> Vec<StreamEvent> {
        events
            .into_iter()
            .filter(|e| self.mode.admits(e))
            .collect()
    }
}

/// The consumer side of a streamed turn.
///
/// Yields events in emission order and ends when the turn is over.
pub struct EventStream {
    rx: mpsc::Receiver<StreamEvent>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl EventStream {
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    /// Stop the turn. Events already queued can still be received.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Drain every remaining event.
    pub async fn collect_all(mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }
}

impl Stream for EventStream {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

pub(crate) fn spawn(
    orchestrator: Arc<TurnOrchestrator>,
    session_id: &str,
    user_text: &str,
    mode: StreamMode,
) -> EventStream {
    let (tx, rx) = mpsc::channel(orchestrator.stream_buffer());
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let session_id = session_id.to_string();
    let user_text = user_text.to_string();

    let task = tokio::spawn(async move {
        let (life_tx, mut life_rx) = mpsc::unbounded_channel();

        let reasoning = async {
            let outcome = orchestrator
                .execute(&session_id, &user_text, Some(&life_tx))
                .await;
            // Closing the lifecycle queue lets the drain loop finish.
            drop(life_tx);
            outcome
        };

        let tx_ref = &tx;
        let drain = async move {
            let mut mux = Multiplexer::new(mode);
            while let Some(callback) = life_rx.recv().await {
                for event in mux.on_event(callback) {
                    if tx_ref.send(event).await.is_err() {
                        return (mux, false);
                    }
                }
            }
            (mux, true)
        };

        tokio::select! {
            _ = token.cancelled() => {
                debug!(session_id = %session_id, "Stream cancelled");
            }
            _ = tx.closed() => {
                debug!(session_id = %session_id, "Stream consumer went away");
            }
            (outcome, (mut mux, delivered)) = async { tokio::join!(reasoning, drain) } => {
                if delivered {
                    for event in mux.finish(outcome) {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    });

    EventStream { rx, cancel, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::react::test_helpers::ScriptedProvider;
    use crate::react::{AgentAction, ReactExecutor, ReasoningStep};
    use crate::turn::{HistoryEntry, TurnResult};
    use std::time::Duration;
    use wayfarer_config::ToolsConfig;
    use wayfarer_core::memory::SessionMemory;
    use wayfarer_core::tool::Observation;
    use wayfarer_memory::InMemorySessionStore;

    fn orchestrator(
        provider: Arc<ScriptedProvider>,
        memory: Arc<InMemorySessionStore>,
    ) -> Arc<TurnOrchestrator> {
        let tools = Arc::new(wayfarer_tools::default_registry(&ToolsConfig::default()));
        let executor = ReactExecutor::new(provider, "mock-model", tools);
        Arc::new(TurnOrchestrator::new(memory, executor).with_stream_buffer(4))
    }

    fn types(events: &[StreamEvent]) -> Vec<&'static str> {
        events.iter().map(StreamEvent::event_type).collect()
    }

    fn one_tool_script() -> Arc<ScriptedProvider> {
        Arc::new(ScriptedProvider::new(vec![
            vec![
                "Thought: I should",
                " check the",
                " time.\nAction: TimeTool\nAction Input: Tokyo",
            ],
            vec!["Final Answer:", " It is", " night."],
        ]))
    }

    fn outcome(response: &str, completion: Completion) -> TurnOutcome {
        TurnOutcome {
            result: TurnResult {
                thinking: DEFAULT_THINKING.into(),
                function_calls: vec![],
                response: response.into(),
            },
            steps: vec![],
            completion,
            conversation_summary: String::new(),
            conversation_history: vec![HistoryEntry {
                kind: "human".into(),
                content: "q".into(),
            }],
        }
    }

    #[tokio::test]
    async fn one_tool_turn_event_order() {
        let memory = Arc::new(InMemorySessionStore::default());
        let stream = orchestrator(one_tool_script(), memory.clone()).run_turn_stream(
            "s",
            "Time in Tokyo?",
            StreamMode::Messages,
        );
        let events = stream.collect_all().await;

        assert_eq!(
            types(&events),
            vec![
                "thinking",
                "thinking",
                "thinking",
                "tool_separator",
                "tool_separator",
                "token",
                "structured_update",
                "token",
                "structured_update",
                "structured_output",
            ]
        );
        assert_eq!(events[3], StreamEvent::tool_open("TimeTool"));
        assert_eq!(events[4], StreamEvent::tool_close("TimeTool"));

        match &events[8] {
            StreamEvent::StructuredUpdate { content } => {
                assert_eq!(content.thinking, "I should check the time.");
                assert_eq!(content.response, "It is night.");
                assert_eq!(content.function_calls, vec![FunctionCall::new("TimeTool", "Tokyo")]);
            }
            other => panic!("Expected structured_update, got {other:?}"),
        }
        match &events[9] {
            StreamEvent::StructuredOutput { content } => {
                assert_eq!(content.result.response, "It is night.");
                assert_eq!(content.conversation_history.len(), 2);
            }
            other => panic!("Expected structured_output, got {other:?}"),
        }

        assert_eq!(memory.read("s").await.stats.total_messages, 2);
    }

    #[tokio::test]
    async fn updates_mode_reports_steps() {
        let memory = Arc::new(InMemorySessionStore::default());
        let events = orchestrator(one_tool_script(), memory)
            .run_turn_stream("s", "Time in Tokyo?", StreamMode::Updates)
            .collect_all()
            .await;

        assert_eq!(types(&events), vec!["tool_usage", "structured_output"]);
        match &events[0] {
            StreamEvent::ToolUsage { content } => {
                assert_eq!(content.tool, "TimeTool");
                assert_eq!(content.input, "Tokyo");
                assert_eq!(content.observation["timezone"], "Asia/Tokyo");
            }
            other => panic!("Expected tool_usage, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn both_mode_puts_usage_after_close_separator() {
        let memory = Arc::new(InMemorySessionStore::default());
        let events = orchestrator(one_tool_script(), memory)
            .run_turn_stream("s", "Time in Tokyo?", StreamMode::Both)
            .collect_all()
            .await;

        let kinds = types(&events);
        assert_eq!(&kinds[3..6], &["tool_separator", "tool_separator", "tool_usage"]);
        assert_eq!(kinds.last(), Some(&"structured_output"));
    }

    #[tokio::test]
    async fn tokens_mode_ends_with_final() {
        let memory = Arc::new(InMemorySessionStore::default());
        let events = orchestrator(one_tool_script(), memory)
            .run_turn_stream("s", "Time in Tokyo?", StreamMode::Tokens)
            .collect_all()
            .await;

        assert_eq!(types(&events), vec!["token", "token", "final"]);
        assert_eq!(
            events[2],
            StreamEvent::Final {
                content: FinalResponse {
                    response: "It is night.".into()
                }
            }
        );
    }

    #[tokio::test]
    async fn recoverable_failure_streams_error_then_answer() {
        let memory = Arc::new(InMemorySessionStore::default());
        let provider = Arc::new(ScriptedProvider::completions(vec!["Rome is sunny today."]));
        let events = orchestrator(provider, memory.clone())
            .run_turn_stream("s", "Rome?", StreamMode::Messages)
            .collect_all()
            .await;

        let kinds = types(&events);
        let tail = &kinds[kinds.len() - 3..];
        assert_eq!(tail, &["error", "token", "structured_output"]);
        assert_eq!(
            events[events.len() - 2],
            StreamEvent::Token {
                content: "Rome is sunny today.".into()
            }
        );
        assert_eq!(memory.read("s").await.recent_messages[1].content, "Rome is sunny today.");
    }

    #[tokio::test]
    async fn unrecoverable_failure_streams_one_error() {
        let memory = Arc::new(InMemorySessionStore::default());
        let provider = Arc::new(ScriptedProvider::completions(vec![""]));
        let events = orchestrator(provider, memory.clone())
            .run_turn_stream("s", "hi", StreamMode::Updates)
            .collect_all()
            .await;

        assert_eq!(types(&events), vec!["error"]);
        assert!(memory.read("s").await.is_empty());
    }

    #[tokio::test]
    async fn dropping_the_stream_releases_the_task() {
        let memory = Arc::new(InMemorySessionStore::default());
        let orchestrator = orchestrator(one_tool_script(), memory);
        let stream = orchestrator.run_turn_stream("s", "q", StreamMode::Messages);
        drop(stream);

        tokio::time::timeout(Duration::from_secs(5), async {
            while Arc::strong_count(&orchestrator) > 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("stream task should release the orchestrator");
    }

    #[test]
    fn think_markers_split_reasoning_from_answer() {
        let mut mux = Multiplexer::new(StreamMode::Messages);
        let mut events = mux.on_event(ReasoningEvent::Token("<think>Weighing options".into()));
        events.extend(mux.on_event(ReasoningEvent::Token(" here</think>\n\nThought: done\n".into())));
        events.extend(mux.on_event(ReasoningEvent::AnswerStart));
        events.extend(mux.on_event(ReasoningEvent::Token("Paris it is".into())));

        assert_eq!(
            events[..3],
            [
                StreamEvent::Thinking {
                    content: "Weighing options".into()
                },
                StreamEvent::Thinking {
                    content: " here".into()
                },
                StreamEvent::Thinking {
                    content: "Thought: done\n".into()
                },
            ]
        );
        assert_eq!(
            events[3],
            StreamEvent::Token {
                content: "Paris it is".into()
            }
        );
        assert_eq!(types(&events[4..]), vec!["structured_update"]);
    }

    #[test]
    fn text_after_think_is_held_until_the_turn_ends() {
        let mut mux = Multiplexer::new(StreamMode::Messages);
        mux.on_event(ReasoningEvent::LlmStart);
        mux.on_event(ReasoningEvent::Token("<think>hmm</think>Paris".into()));
        assert!(mux.on_event(ReasoningEvent::Token(" it is".into())).is_empty());

        let events = mux.finish(Ok(outcome("Paris it is", Completion::Finished)));
        assert_eq!(types(&events), vec!["token", "structured_output"]);
        assert_eq!(
            events[0],
            StreamEvent::Token {
                content: "Paris it is".into()
            }
        );
    }

    #[test]
    fn action_after_think_stays_out_of_the_answer() {
        let mut mux = Multiplexer::new(StreamMode::Messages);
        let mut events = mux.on_event(ReasoningEvent::LlmStart);
        events.extend(mux.on_event(ReasoningEvent::Token("<think>need weather</think>".into())));
        events.extend(mux.on_event(ReasoningEvent::Token(
            "Action: WeatherTool\nAction Input: Paris".into(),
        )));
        events.extend(mux.on_event(ReasoningEvent::ToolStart {
            tool: "WeatherTool".into(),
            input: "Paris".into(),
        }));
        events.extend(mux.on_event(ReasoningEvent::ToolEnd {
            step: ReasoningStep {
                action: AgentAction {
                    tool: "WeatherTool".into(),
                    input: "Paris".into(),
                    log: "<think>need weather</think>Action: WeatherTool\nAction Input: Paris"
                        .into(),
                },
                observation: Observation::text("Sunny"),
            },
        }));
        events.extend(mux.on_event(ReasoningEvent::LlmStart));
        events.extend(mux.on_event(ReasoningEvent::AnswerStart));
        events.extend(mux.on_event(ReasoningEvent::Token("Sunny.".into())));

        assert_eq!(
            types(&events),
            vec![
                "thinking",
                "thinking",
                "tool_separator",
                "tool_separator",
                "token",
                "structured_update",
            ]
        );
        assert_eq!(
            events[1],
            StreamEvent::Thinking {
                content: "Action: WeatherTool\nAction Input: Paris".into()
            }
        );
        match &events[5] {
            StreamEvent::StructuredUpdate { content } => {
                assert_eq!(content.response, "Sunny.");
                assert_eq!(content.function_calls, vec![FunctionCall::new("WeatherTool", "Paris")]);
            }
            other => panic!("Expected structured_update, got {other:?}"),
        }

        let events = mux.finish(Ok(outcome("Sunny.", Completion::Finished)));
        assert_eq!(types(&events), vec!["structured_output"]);
    }

    #[test]
    fn tool_phase_tokens_are_suppressed() {
        let mut mux = Multiplexer::new(StreamMode::Messages);
        mux.on_event(ReasoningEvent::ToolStart {
            tool: "WeatherTool".into(),
            input: "Oslo".into(),
        });
        assert!(mux.on_event(ReasoningEvent::Token("stray".into())).is_empty());

        let events = mux.on_event(ReasoningEvent::ToolEnd {
            step: ReasoningStep {
                action: AgentAction {
                    tool: "WeatherTool".into(),
                    input: "Oslo".into(),
                    log: "Thought: weather".into(),
                },
                observation: Observation::error("no key"),
            },
        });
        assert_eq!(events, vec![StreamEvent::tool_close("WeatherTool")]);

        let events = mux.on_event(ReasoningEvent::Token("back".into()));
        assert_eq!(types(&events), vec!["thinking"]);
    }

    #[test]
    fn degraded_finish_emits_the_synthesized_answer() {
        let mut mux = Multiplexer::new(StreamMode::Messages);
        let events = mux.finish(Ok(outcome("The local time is noon.", Completion::IterationCapped)));
        assert_eq!(types(&events), vec!["token", "structured_output"]);
    }

    #[test]
    fn streamed_answer_is_not_repeated() {
        let mut mux = Multiplexer::new(StreamMode::Messages);
        mux.on_event(ReasoningEvent::AnswerStart);
        mux.on_event(ReasoningEvent::Token("Hi".into()));
        let events = mux.finish(Ok(outcome("Hi", Completion::Finished)));
        assert_eq!(types(&events), vec!["structured_output"]);
    }
}
