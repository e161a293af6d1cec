//! Mediator wire protocol
//!
//! Newline-delimited JSON over the mediator socket. Every request carries a
//! numeric id which the matching response echoes back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::RawSkillDescriptor;

// ============================================================================
// Client → Mediator
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RequestEnvelope {
    pub id: u64,
    #[serde(flatten)]
    pub request: MediatorRequest,
}

/// Calls the mediator understands
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediatorRequest {
    /// Skills callable within a session
    ListSkills { session_id: String },

    /// Context value for a session/invocation; `name` selects the record
    /// (the model name when resolving credentials)
    GetContext {
        session_id: String,
        invocation_id: String,
        name: String,
    },

    /// Execute one skill with structured arguments
    InvokeSkill {
        session_id: String,
        invocation_id: String,
        skill_name: String,
        args: Value,
    },
}

impl MediatorRequest {
    pub fn method(&self) -> &'static str {
        match self {
            Self::ListSkills { .. } => "list_skills",
            Self::GetContext { .. } => "get_context",
            Self::InvokeSkill { .. } => "invoke_skill",
        }
    }
}

// ============================================================================
// Mediator → Client
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEnvelope {
    pub id: u64,
    #[serde(flatten)]
    pub response: MediatorResponse,
}

/// Replies from the mediator
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediatorResponse {
    Skills {
        #[serde(default)]
        skills: Vec<RawSkillDescriptor>,
    },
    Context {
        value: Value,
    },
    SkillResult {
        #[serde(default)]
        output: Value,
    },
    /// Call-level failure; the message is passed through verbatim
    Error { message: String },
}

impl MediatorResponse {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Skills { .. } => "skills",
            Self::Context { .. } => "context",
            Self::SkillResult { .. } => "skill_result",
            Self::Error { .. } => "error",
        }
    }
}
