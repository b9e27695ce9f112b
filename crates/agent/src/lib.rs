//! The agent: ReAct reasoning, turn orchestration, and event streaming.
//!
//! A turn flows through three layers:
//!
//! 1. [`TurnOrchestrator`] reads session memory and composes the question
//! 2. [`ReactExecutor`] reasons over it, calling tools as needed
//! 3. the multiplexer turns the loop's callbacks into [`StreamEvent`]s
//!
//! Non-streaming callers get a [`TurnOutcome`]; streaming callers get an
//! [`EventStream`] filtered by [`StreamMode`].

pub mod multiplexer;
pub mod orchestrator;
pub mod prompts;
pub mod react;
pub mod recovery;
pub mod stream_event;
pub mod turn;

pub use multiplexer::{EventStream, Multiplexer};
pub use orchestrator::TurnOrchestrator;
pub use react::{
    AgentAction, ReactExecutor, ReasoningError, ReasoningEvent, ReasoningOutcome, ReasoningStep,
    Termination,
};
pub use stream_event::{FinalResponse, StreamEvent, StreamMode, StructuredOutput, ToolUsage};
pub use turn::{
    Completion, FunctionCall, HistoryEntry, TurnOutcome, TurnResponse, TurnResult, history_entries,
};
