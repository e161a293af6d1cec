//! Process input: the single JSON argument handed over by the mediator

use serde::Deserialize;
use serde_json::Value;

use crate::error::{RunError, RunResult};
use crate::llm::RunIds;

/// Validated run input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInput {
    pub session_id: String,
    pub invocation_id: String,
    /// Filesystem path of the mediator's Unix socket
    pub service_endpoint: String,
    /// Model name to resolve credentials for
    pub model: String,
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
struct RawInput {
    #[serde(rename = "sessionID")]
    session_id: Option<Value>,
    #[serde(rename = "invocationID")]
    invocation_id: Option<Value>,
    #[serde(rename = "serviceEndpoint")]
    service_endpoint: Option<Value>,
    #[serde(rename = "inputArgs")]
    input_args: Option<Value>,
}

impl ProcessInput {
    /// Parse and validate the JSON argument
    pub fn parse(raw: &str) -> RunResult<Self> {
        let input: RawInput = serde_json::from_str(raw)
            .map_err(|e| RunError::Input(format!("failed to parse input args: {e}")))?;

        let session_id = required_string(input.session_id.as_ref(), "sessionID")?;
        let invocation_id = required_string(input.invocation_id.as_ref(), "invocationID")?;
        let service_endpoint =
            required_string(input.service_endpoint.as_ref(), "serviceEndpoint")?;

        let args = match input.input_args {
            Some(Value::Object(args)) => args,
            Some(_) => return Err(RunError::Input("inputArgs is not an object".to_string())),
            None => return Err(RunError::Input("inputArgs is missing".to_string())),
        };
        let model = required_string(args.get("model"), "model")?;
        let prompt = required_string(args.get("prompt"), "prompt")?;

        Ok(Self {
            session_id,
            invocation_id,
            service_endpoint,
            model,
            prompt,
        })
    }

    pub fn ids(&self) -> RunIds {
        RunIds::new(self.session_id.clone(), self.invocation_id.clone())
    }
}

fn required_string(value: Option<&Value>, field: &str) -> RunResult<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(RunError::Input(format!("{field} is empty"))),
        Some(_) => Err(RunError::Input(format!("{field} is not a string"))),
        None => Err(RunError::Input(format!("{field} not provided"))),
    }
}
