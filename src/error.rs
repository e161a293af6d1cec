//! Error taxonomy for a single orchestration run
//!
//! Every variant is fatal to the run unless the agent is configured to
//! report skill failures back to the model. Variants carry rendered text
//! rather than source errors so a terminal state can hold a copy.

use thiserror::Error;

/// Errors that end (or may end) an orchestration run
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    /// The skill mediator could not be reached after all dial attempts
    #[error("failed to reach skill mediator at {endpoint} after {attempts} attempt(s): {message}")]
    Connection {
        endpoint: String,
        attempts: u32,
        message: String,
    },

    /// Transport or protocol failure on an established mediator connection
    #[error("skill mediator error: {0}")]
    Mediator(String),

    /// A skill descriptor is malformed; partial catalogs are not tolerated
    #[error("invalid skill catalog: {0}")]
    Schema(String),

    /// Model credentials returned by the mediator are missing or malformed
    #[error("invalid model credentials: {0}")]
    Credential(String),

    /// Process or conversation input is missing or invalid
    #[error("invalid input: {0}")]
    Input(String),

    /// The model backend call failed
    #[error("model call failed: {message}")]
    ModelCall { message: String, retryable: bool },

    /// A tool call's arguments are not a JSON object
    #[error("invalid arguments for tool call {call_id} ({skill}): {message}")]
    Argument {
        call_id: String,
        skill: String,
        message: String,
    },

    /// A skill call failed; the text may encode a policy denial
    #[error("skill {skill} failed: {message}")]
    SkillInvocation { skill: String, message: String },

    /// The model kept requesting tools past the configured turn limit
    #[error("turn limit of {max_turns} exceeded without a final response")]
    TurnLimitExceeded { max_turns: u32 },
}

impl RunError {
    pub fn model_call(message: impl Into<String>) -> Self {
        Self::ModelCall {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn transient_model_call(message: impl Into<String>) -> Self {
        Self::ModelCall {
            message: message.into(),
            retryable: true,
        }
    }

    /// Whether a retry of the same operation could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ModelCall { retryable: true, .. })
    }
}

pub type RunResult<T> = std::result::Result<T, RunError>;
