//! Scripted backend and in-memory gateway for driving the loop in tests

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::client::ChatBackend;
use super::types::ChatResponse;
use crate::error::{RunError, RunResult};
use crate::mediator::{ModelCredentials, SkillDescriptor, SkillGateway, SkillResult};
use crate::tools::ToolSpec;
use crate::transcript::Message;

/// Response with a single choice
pub fn completion(finish_reason: Option<&str>, message: Value) -> ChatResponse {
    serde_json::from_value(json!({
        "choices": [{"finish_reason": finish_reason, "message": message}]
    }))
    .unwrap()
}

/// Terminal text answer
pub fn text_reply(content: &str) -> ChatResponse {
    completion(
        Some("stop"),
        json!({"role": "assistant", "content": content}),
    )
}

/// Turn requesting the given `(id, skill, arguments)` calls
pub fn tool_reply(content: Option<&str>, calls: &[(&str, &str, &str)]) -> ChatResponse {
    let tool_calls: Vec<Value> = calls
        .iter()
        .map(|(id, name, arguments)| {
            json!({
                "id": id,
                "type": "function",
                "function": {"name": name, "arguments": arguments}
            })
        })
        .collect();
    completion(
        Some("tool_calls"),
        json!({"role": "assistant", "content": content, "tool_calls": tool_calls}),
    )
}

/// Backend replaying canned responses and recording every request
#[derive(Default)]
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<RunResult<ChatResponse>>>,
    requests: Arc<Mutex<Vec<(Vec<Message>, Vec<String>, i64)>>>,
}

impl ScriptedBackend {
    pub fn new(responses: Vec<RunResult<ChatResponse>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Arc::default(),
        }
    }

    /// Handle to the recorded `(messages, tool names, seed)` triples
    pub fn requests(&self) -> Arc<Mutex<Vec<(Vec<Message>, Vec<String>, i64)>>> {
        Arc::clone(&self.requests)
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        seed: i64,
    ) -> RunResult<ChatResponse> {
        self.requests.lock().unwrap().push((
            messages.to_vec(),
            tools.iter().map(|t| t.name.clone()).collect(),
            seed,
        ));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RunError::model_call("script exhausted")))
    }
}

/// Gateway serving a fixed catalog; skills answer from a table
#[derive(Default)]
pub struct FakeGateway {
    skills: Vec<SkillDescriptor>,
    results: HashMap<String, RunResult<Value>>,
    invocations: Arc<Mutex<Vec<(String, Value)>>>,
}

impl FakeGateway {
    pub fn new(skills: Vec<SkillDescriptor>) -> Self {
        Self {
            skills,
            ..Default::default()
        }
    }

    pub fn with_output(mut self, skill: &str, output: Value) -> Self {
        self.results.insert(skill.to_string(), Ok(output));
        self
    }

    /// Skill fails with mediator text `message`
    pub fn with_failure(mut self, skill: &str, message: &str) -> Self {
        self.results.insert(
            skill.to_string(),
            Err(RunError::SkillInvocation {
                skill: skill.to_string(),
                message: message.to_string(),
            }),
        );
        self
    }

    pub fn with_error(mut self, skill: &str, err: RunError) -> Self {
        self.results.insert(skill.to_string(), Err(err));
        self
    }

    /// Handle to the recorded `(skill, args)` invocations
    pub fn invocations(&self) -> Arc<Mutex<Vec<(String, Value)>>> {
        Arc::clone(&self.invocations)
    }
}

#[async_trait]
impl SkillGateway for FakeGateway {
    async fn list_skills(&mut self, _session_id: &str) -> RunResult<Vec<SkillDescriptor>> {
        Ok(self.skills.clone())
    }

    async fn resolve_credentials(
        &mut self,
        _session_id: &str,
        _invocation_id: &str,
        model: &str,
    ) -> RunResult<ModelCredentials> {
        Ok(ModelCredentials {
            api_key: "sk-test".to_string(),
            model: model.to_string(),
            endpoint: None,
        })
    }

    async fn invoke_skill(
        &mut self,
        _session_id: &str,
        _invocation_id: &str,
        skill_name: &str,
        args: &Value,
    ) -> RunResult<SkillResult> {
        self.invocations
            .lock()
            .unwrap()
            .push((skill_name.to_string(), args.clone()));
        match self.results.get(skill_name) {
            Some(Ok(output)) => Ok(SkillResult {
                output: output.clone(),
            }),
            Some(Err(err)) => Err(err.clone()),
            None => Ok(SkillResult {
                output: Value::Null,
            }),
        }
    }
}
