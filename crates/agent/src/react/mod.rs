//! ReAct reasoning: Thought → Action → Observation, bounded per turn.

pub mod executor;
pub mod parser;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use executor::{
    AgentAction, ReactExecutor, ReasoningError, ReasoningEvent, ReasoningOutcome, ReasoningStep,
    Termination,
};
pub use parser::{ReactStep, extract_thought, parse_step};
