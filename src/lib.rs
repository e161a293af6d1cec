//! skillrun - answer a user's request by letting a language model call
//! skills through a policy-governed skill mediator
//!
//! The crate can be driven as a library with any [`ChatBackend`] and
//! [`SkillGateway`] implementation.
//!
//! # Example
//!
//! ```no_run
//! use skillrun::{
//!     Agent, AgentRuntimeConfig, AgentStep, Config, ConnectOptions, MediatorClient,
//!     OpenAiCompatClient, PolicyDirective, RunIds, SkillGateway, ToolCatalog, Transcript,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let mut mediator =
//!         MediatorClient::connect("/tmp/skills.sock", &ConnectOptions::default()).await?;
//!
//!     let credentials = mediator.resolve_credentials("sess-1", "inv-1", "gpt-4o").await?;
//!     let catalog = ToolCatalog::from_skills(&mediator.list_skills("sess-1").await?);
//!     let backend = OpenAiCompatClient::new(&credentials, &config.backend)?;
//!
//!     let mut agent = Agent::new(
//!         AgentRuntimeConfig::default(),
//!         RunIds::new("sess-1", "inv-1"),
//!         Transcript::new(&PolicyDirective::default(), "What is John's bloodwork?"),
//!         catalog,
//!         Box::new(backend),
//!         Box::new(mediator),
//!     );
//!
//!     while let Some(step) = agent.next().await {
//!         match step {
//!             AgentStep::Thinking(text) => println!("thinking: {text}"),
//!             AgentStep::Finished(text) => println!("{text}"),
//!             AgentStep::Failed(err) => eprintln!("{err}"),
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod input;
mod llm;
mod mediator;
mod policy;
mod prompts;
pub mod runner;
pub mod skills;
mod tools;
mod transcript;

pub use config::{
    AgentConfig, AgentRuntimeConfig, BackendConfig, BackendRoute, Config, MediatorConfig,
    PolicyConfig, SkillErrorMode,
};
pub use error::{RunError, RunResult};
pub use input::ProcessInput;
pub use llm::{
    Agent, AgentState, AgentStep, ChatBackend, ChatResponse, Choice, OpenAiCompatClient, RunIds,
    RunOutcome,
};
pub use mediator::{
    ConnectOptions, MediatorClient, ModelCredentials, SkillDescriptor, SkillGateway, SkillResult,
};
pub use policy::{refusal_message, DenialMatcher};
pub use prompts::{PolicyDirective, POLICY_DIRECTIVE};
pub use tools::{ToolCatalog, ToolSpec};
pub use transcript::{
    render_tool_output, AssistantMessage, Message, ToolCall, Transcript, TranscriptError,
};
