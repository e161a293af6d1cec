//! Skill mediator access
//!
//! The mediator authorizes, routes and executes skill calls and resolves
//! per-model credentials. The orchestration loop only talks to it through
//! [`SkillGateway`].

mod client;
mod protocol;
#[cfg(test)]
pub(crate) mod testing;
mod types;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RunResult;

pub use client::{ConnectOptions, MediatorClient};
pub use types::{ModelCredentials, SkillDescriptor, SkillResult};

/// Request/response access to skills for one session
#[async_trait]
pub trait SkillGateway: Send {
    /// Skills callable within the session
    async fn list_skills(&mut self, session_id: &str) -> RunResult<Vec<SkillDescriptor>>;

    /// Credentials for `model`, scoped to the session and invocation
    async fn resolve_credentials(
        &mut self,
        session_id: &str,
        invocation_id: &str,
        model: &str,
    ) -> RunResult<ModelCredentials>;

    /// Execute one skill; mediator-side failures come back as
    /// `RunError::SkillInvocation` with the mediator's text
    async fn invoke_skill(
        &mut self,
        session_id: &str,
        invocation_id: &str,
        skill_name: &str,
        args: &Value,
    ) -> RunResult<SkillResult>;
}
