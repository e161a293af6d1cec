//! Model backend client and agent loop

mod agent;
mod client;
#[cfg(test)]
pub(crate) mod testing;
mod types;

pub use agent::{Agent, AgentState, AgentStep, RunIds, RunOutcome};
pub use client::{ChatBackend, OpenAiCompatClient};
pub use types::{ChatResponse, Choice};
