//! Orchestration loop: alternate model calls and skill invocations until the
//! model produces a final answer or the run fails

use std::collections::VecDeque;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::client::ChatBackend;
use super::types::ChatResponse;
use crate::config::{AgentRuntimeConfig, SkillErrorMode};
use crate::error::{RunError, RunResult};
use crate::mediator::SkillGateway;
use crate::policy::{refusal_message, DenialMatcher};
use crate::tools::ToolCatalog;
use crate::transcript::{render_tool_output, Message, ToolCall, Transcript};

/// Identifiers scoping every mediator call of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunIds {
    pub session_id: String,
    pub invocation_id: String,
}

impl RunIds {
    pub fn new(session_id: impl Into<String>, invocation_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            invocation_id: invocation_id.into(),
        }
    }
}

/// Steps yielded by the agent while it works
#[derive(Debug, Clone, PartialEq)]
pub enum AgentStep {
    /// Assistant text accompanying a turn that requests tools
    Thinking(String),
    /// Arguments parsed, the skill is about to be invoked
    ToolStarted { call_id: String, skill: String },
    ToolCompleted {
        call_id: String,
        skill: String,
        content: String,
    },
    /// Skill failed; in report mode the loop carries on
    ToolFailed {
        call_id: String,
        skill: String,
        error: String,
    },
    PolicyDenied { skill: String, reason: String },
    /// Transient model failure, the same turn will be retried
    Retrying { attempt: u32, error: String },
    Finished(String),
    Failed(RunError),
}

/// Loop state
#[derive(Debug, Clone, PartialEq)]
pub enum AgentState {
    AwaitingModel,
    /// Remaining calls of the latest assistant message, in source order
    ExecutingTools(VecDeque<ToolCall>),
    Done(String),
    Failed(RunError),
}

/// What a run ended with, plus the thinking text of each tool turn
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub thoughts: Vec<String>,
    pub result: RunResult<String>,
}

/// Agent driving one bounded conversation
pub struct Agent {
    config: AgentRuntimeConfig,
    ids: RunIds,
    transcript: Transcript,
    catalog: ToolCatalog,
    backend: Box<dyn ChatBackend>,
    gateway: Box<dyn SkillGateway>,
    denials: DenialMatcher,

    state: AgentState,
    /// Model calls made so far, retries excluded
    turns: u32,
    /// Failed attempts of the current model call
    attempts: u32,
    /// Call whose `ToolStarted` was emitted, with its parsed arguments
    in_flight: Option<(ToolCall, Value)>,
    terminal_reported: bool,
}

impl Agent {
    pub fn new(
        config: AgentRuntimeConfig,
        ids: RunIds,
        transcript: Transcript,
        catalog: ToolCatalog,
        backend: Box<dyn ChatBackend>,
        gateway: Box<dyn SkillGateway>,
    ) -> Self {
        Self {
            config,
            ids,
            transcript,
            catalog,
            backend,
            gateway,
            denials: DenialMatcher::default(),
            state: AgentState::AwaitingModel,
            turns: 0,
            attempts: 0,
            in_flight: None,
            terminal_reported: false,
        }
    }

    /// Patterns used to recognise policy denials when enforcement is on
    pub fn with_denial_matcher(mut self, denials: DenialMatcher) -> Self {
        self.denials = denials;
        self
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Drive the agent to a terminal state
    pub async fn run(&mut self) -> RunOutcome {
        let mut thoughts = Vec::new();
        while let Some(step) = self.next().await {
            match step {
                AgentStep::Thinking(text) => thoughts.push(text),
                AgentStep::Finished(text) => {
                    return RunOutcome {
                        thoughts,
                        result: Ok(text),
                    }
                }
                AgentStep::Failed(err) => {
                    return RunOutcome {
                        thoughts,
                        result: Err(err),
                    }
                }
                _ => {}
            }
        }

        // Already terminal before run() was called
        let result = match &self.state {
            AgentState::Done(text) => Ok(text.clone()),
            AgentState::Failed(err) => Err(err.clone()),
            _ => Err(RunError::model_call("agent stopped before a final response")),
        };
        RunOutcome { thoughts, result }
    }

    /// Get the next step; `None` once the terminal step has been yielded
    pub async fn next(&mut self) -> Option<AgentStep> {
        loop {
            match &self.state {
                AgentState::Done(text) => {
                    if self.terminal_reported {
                        return None;
                    }
                    self.terminal_reported = true;
                    return Some(AgentStep::Finished(text.clone()));
                }
                AgentState::Failed(err) => {
                    if self.terminal_reported {
                        return None;
                    }
                    self.terminal_reported = true;
                    return Some(AgentStep::Failed(err.clone()));
                }
                AgentState::AwaitingModel => {
                    if let Some(step) = self.call_model().await {
                        return Some(step);
                    }
                }
                AgentState::ExecutingTools(_) => {
                    if let Some(step) = self.execute_next_tool().await {
                        return Some(step);
                    }
                }
            }
        }
    }

    async fn call_model(&mut self) -> Option<AgentStep> {
        if self.turns >= self.config.max_turns {
            warn!("Turn limit of {} reached", self.config.max_turns);
            self.fail(RunError::TurnLimitExceeded {
                max_turns: self.config.max_turns,
            });
            return None;
        }

        debug!(
            "Agent: model call {} with {} messages",
            self.turns + 1,
            self.transcript.len()
        );
        let response = self
            .backend
            .chat(
                self.transcript.snapshot(),
                self.catalog.specs(),
                self.config.seed,
            )
            .await;

        match response {
            Ok(response) => {
                self.turns += 1;
                self.attempts = 0;
                self.handle_response(response)
            }
            Err(err) if err.is_retryable() && self.attempts < self.config.model_retries => {
                self.attempts += 1;
                let delay = self.config.model_retry_delay * 2u32.saturating_pow(self.attempts - 1);
                warn!(
                    "Model call failed (attempt {}), retrying in {:?}: {}",
                    self.attempts, delay, err
                );
                tokio::time::sleep(delay).await;
                Some(AgentStep::Retrying {
                    attempt: self.attempts,
                    error: err.to_string(),
                })
            }
            Err(err) => {
                error!("Model call failed: {}", err);
                self.fail(err);
                None
            }
        }
    }

    fn handle_response(&mut self, response: ChatResponse) -> Option<AgentStep> {
        let Some(choice) = response.choices.first() else {
            self.fail(RunError::model_call("response contained no choices"));
            return None;
        };

        let message = match choice.assistant_message() {
            Ok(message) => message,
            Err(err) => {
                self.fail(err);
                return None;
            }
        };
        let content = message.content.clone().unwrap_or_default();
        let terminal = choice.is_terminal() || message.tool_calls.is_empty();
        let calls: VecDeque<ToolCall> = message.tool_calls.iter().cloned().collect();

        if let Err(err) = self.record(Message::Assistant(message)) {
            self.fail(err);
            return None;
        }

        if terminal {
            info!("Agent: final response after {} turn(s)", self.turns);
            self.state = AgentState::Done(content);
            return None;
        }

        info!("Agent: model requested {} tool call(s)", calls.len());
        self.state = AgentState::ExecutingTools(calls);
        Some(AgentStep::Thinking(content))
    }

    async fn execute_next_tool(&mut self) -> Option<AgentStep> {
        let Some((call, args)) = self.in_flight.take() else {
            return self.start_next_tool();
        };

        let result = if self.catalog.contains(&call.name) {
            self.gateway
                .invoke_skill(
                    &self.ids.session_id,
                    &self.ids.invocation_id,
                    &call.name,
                    &args,
                )
                .await
        } else {
            warn!("Model requested unknown skill {}", call.name);
            Err(RunError::SkillInvocation {
                skill: call.name.clone(),
                message: format!("unknown skill: {}", call.name),
            })
        };

        let step = match result {
            Ok(result) => {
                let content = render_tool_output(&result.output);
                debug!("Skill {} returned {} bytes", call.name, content.len());
                if let Err(err) = self.record(tool_message(&call, content.clone())) {
                    self.fail(err);
                    return None;
                }
                AgentStep::ToolCompleted {
                    call_id: call.id,
                    skill: call.name,
                    content,
                }
            }
            Err(RunError::SkillInvocation { skill, message }) => {
                return self.handle_skill_failure(call, skill, message);
            }
            Err(err) => {
                error!("Mediator failure while invoking {}: {}", call.name, err);
                self.fail(err);
                return None;
            }
        };

        self.advance_queue();
        Some(step)
    }

    /// Validate the next queued call's arguments and announce it
    fn start_next_tool(&mut self) -> Option<AgentStep> {
        let AgentState::ExecutingTools(queue) = &mut self.state else {
            return None;
        };
        let Some(call) = queue.pop_front() else {
            self.state = AgentState::AwaitingModel;
            return None;
        };

        match parse_arguments(&call) {
            Ok(args) => {
                debug!("Agent: invoking {} ({})", call.name, call.id);
                let step = AgentStep::ToolStarted {
                    call_id: call.id.clone(),
                    skill: call.name.clone(),
                };
                self.in_flight = Some((call, args));
                Some(step)
            }
            Err(err) => {
                error!("{}", err);
                self.fail(err);
                None
            }
        }
    }

    fn handle_skill_failure(
        &mut self,
        call: ToolCall,
        skill: String,
        message: String,
    ) -> Option<AgentStep> {
        warn!("Skill {} failed: {}", skill, message);

        if self.config.enforce_denials && self.denials.is_denial(&message) {
            info!("Skill {} denied by policy, ending run", skill);
            if let Err(err) = self.record(tool_message(&call, format!("Error: {message}"))) {
                self.fail(err);
                return None;
            }
            self.state = AgentState::Done(refusal_message(&skill, &message));
            return Some(AgentStep::PolicyDenied {
                skill,
                reason: message,
            });
        }

        match self.config.on_skill_error {
            SkillErrorMode::Abort => {
                self.fail(RunError::SkillInvocation {
                    skill: skill.clone(),
                    message: message.clone(),
                });
            }
            SkillErrorMode::Report => {
                if let Err(err) = self.record(tool_message(&call, format!("Error: {message}"))) {
                    self.fail(err);
                    return None;
                }
                self.advance_queue();
            }
        }

        Some(AgentStep::ToolFailed {
            call_id: call.id,
            skill,
            error: message,
        })
    }

    /// Back to the model once every queued call has been answered
    fn advance_queue(&mut self) {
        if let AgentState::ExecutingTools(queue) = &self.state {
            if queue.is_empty() {
                self.state = AgentState::AwaitingModel;
            }
        }
    }

    fn record(&mut self, message: Message) -> RunResult<()> {
        self.transcript
            .append(message)
            .map_err(|e| RunError::model_call(e.to_string()))
    }

    fn fail(&mut self, err: RunError) {
        self.in_flight = None;
        self.state = AgentState::Failed(err);
    }
}

fn tool_message(call: &ToolCall, content: String) -> Message {
    Message::Tool {
        tool_call_id: call.id.clone(),
        content,
    }
}

/// Arguments must decode to a JSON object
fn parse_arguments(call: &ToolCall) -> RunResult<Value> {
    let argument_error = |message: String| RunError::Argument {
        call_id: call.id.clone(),
        skill: call.name.clone(),
        message,
    };

    if call.arguments.trim().is_empty() {
        return Err(argument_error("arguments are empty".to_string()));
    }
    let args: Value = serde_json::from_str(&call.arguments)
        .map_err(|e| argument_error(format!("arguments are not valid JSON: {e}")))?;
    if !args.is_object() {
        return Err(argument_error("arguments are not a JSON object".to_string()));
    }
    Ok(args)
}
