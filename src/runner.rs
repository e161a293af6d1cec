//! Run bootstrap: connect to the mediator, resolve credentials, fetch the
//! catalog once, then drive the agent and print its answer lines

use std::io::Write;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::{AgentRuntimeConfig, Config};
use crate::input::ProcessInput;
use crate::llm::{Agent, AgentStep, ChatBackend, OpenAiCompatClient};
use crate::mediator::{ConnectOptions, MediatorClient, ModelCredentials, SkillGateway};
use crate::policy::DenialMatcher;
use crate::prompts::PolicyDirective;
use crate::tools::ToolCatalog;
use crate::transcript::Transcript;

/// Stdout line for a step, if the step is user-visible
pub fn render_step(step: &AgentStep) -> Option<String> {
    match step {
        AgentStep::Thinking(text) => Some(format!("🤔 Thinking: {text}")),
        AgentStep::Finished(text) => Some(format!("✅ Final response: {text}")),
        _ => None,
    }
}

/// Run one conversation against the mediator named in `input`
pub async fn run(input: &ProcessInput, config: &Config, out: &mut impl Write) -> Result<()> {
    let client = MediatorClient::connect(
        &input.service_endpoint,
        &ConnectOptions::from(&config.mediator),
    )
    .await?;
    debug!("Mediator session on {}", client.endpoint());

    let backend_config = config.backend.clone();
    run_with_gateway(
        Box::new(client),
        move |credentials| {
            let client = OpenAiCompatClient::new(credentials, &backend_config)?;
            info!("Model backend {} at {}", client.model(), client.endpoint());
            Ok(Box::new(client) as Box<dyn ChatBackend>)
        },
        input,
        config,
        out,
    )
    .await
}

/// Run with an established gateway; `make_backend` builds the model client
/// once credentials are known
pub async fn run_with_gateway<F>(
    mut gateway: Box<dyn SkillGateway>,
    make_backend: F,
    input: &ProcessInput,
    config: &Config,
    out: &mut impl Write,
) -> Result<()>
where
    F: FnOnce(&ModelCredentials) -> Result<Box<dyn ChatBackend>>,
{
    let credentials = gateway
        .resolve_credentials(&input.session_id, &input.invocation_id, &input.model)
        .await?;
    info!("Resolved credentials for model {}", credentials.model);

    let skills = gateway.list_skills(&input.session_id).await?;
    let catalog = ToolCatalog::from_skills(&skills);
    info!("Session {} exposes {} skill(s)", input.session_id, catalog.len());

    let backend = make_backend(&credentials)?;
    let denials = DenialMatcher::compile(config.policy.denial_patterns.as_slice())?;
    let transcript = Transcript::new(&PolicyDirective::from_config(&config.policy), &input.prompt);

    let mut agent = Agent::new(
        AgentRuntimeConfig::from(config),
        input.ids(),
        transcript,
        catalog,
        backend,
        gateway,
    )
    .with_denial_matcher(denials);

    while let Some(step) = agent.next().await {
        debug!("Agent step: {:?}", step);
        if let Some(line) = render_step(&step) {
            writeln!(out, "{line}").context("Failed to write output")?;
            out.flush().context("Failed to flush output")?;
        }
        if let AgentStep::Failed(err) = step {
            return Err(err.into());
        }
    }

    Ok(())
}
