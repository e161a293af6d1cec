//! Wire types for OpenAI-compatible chat completions

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{RunError, RunResult};
use crate::tools::ToolSpec;
use crate::transcript::{AssistantMessage, Message, ToolCall};

/// Finish reason that asks the caller to run the requested tools
pub const FINISH_TOOL_CALLS: &str = "tool_calls";

/// Request body for `POST /chat/completions`
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<FunctionTool>,
    pub seed: i64,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: &[Message], tools: &[ToolSpec], seed: i64) -> Self {
        Self {
            model: model.into(),
            messages: messages.iter().map(wire_message).collect(),
            tools: tools.iter().map(FunctionTool::from).collect(),
            seed,
        }
    }
}

/// Tool definition in function-calling form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionTool {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<&ToolSpec> for FunctionTool {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            tool_type: "function",
            function: FunctionDefinition {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: spec.parameters.clone(),
            },
        }
    }
}

/// Convert a transcript entry into its wire form. Assistant messages that
/// came from the backend are replayed exactly as received.
pub fn wire_message(message: &Message) -> Value {
    match message {
        Message::System { content } => json!({"role": "system", "content": content}),
        Message::User { content } => json!({"role": "user", "content": content}),
        Message::Assistant(assistant) => match &assistant.raw {
            Some(raw) => raw.clone(),
            None => {
                let mut wire = json!({"role": "assistant", "content": assistant.content});
                if !assistant.tool_calls.is_empty() {
                    wire["tool_calls"] = assistant
                        .tool_calls
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.id,
                                "type": "function",
                                "function": {"name": call.name, "arguments": call.arguments}
                            })
                        })
                        .collect();
                }
                wire
            }
        },
        Message::Tool {
            tool_call_id,
            content,
        } => json!({"role": "tool", "tool_call_id": tool_call_id, "content": content}),
    }
}

/// Response body; only the parts the loop inspects are typed
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    /// Kept raw so it can be replayed on the next call
    pub message: Value,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl Choice {
    /// Decode the assistant message, keeping the raw payload
    pub fn assistant_message(&self) -> RunResult<AssistantMessage> {
        let payload: ChoiceMessage = serde_json::from_value(self.message.clone())
            .map_err(|e| RunError::model_call(format!("malformed assistant message: {e}")))?;

        Ok(AssistantMessage {
            content: payload.content,
            tool_calls: payload
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|call| {
                    ToolCall::new(
                        call.id,
                        call.function.name,
                        call.function.arguments.unwrap_or_default(),
                    )
                })
                .collect(),
            raw: Some(self.message.clone()),
        })
    }

    /// Whether the backend declared the turn finished without tool use
    pub fn is_terminal(&self) -> bool {
        matches!(&self.finish_reason, Some(reason) if reason != FINISH_TOOL_CALLS)
    }
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallPayload>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallPayload {
    id: String,
    function: FunctionCallPayload,
}

#[derive(Debug, Deserialize)]
struct FunctionCallPayload {
    name: String,
    #[serde(default)]
    arguments: Option<String>,
}

/// Error body returned on non-2xx responses
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::PolicyDirective;
    use crate::transcript::Transcript;
    use pretty_assertions::assert_eq;

    fn lookup_spec() -> ToolSpec {
        ToolSpec {
            name: "lookup".to_string(),
            description: "Look up a record".to_string(),
            parameters: json!({"type": "object", "properties": {"x": {"type": "integer"}}}),
        }
    }

    #[test]
    fn test_request_omits_empty_tools() {
        let transcript = Transcript::new(&PolicyDirective::new("be careful"), "hi");
        let request = ChatRequest::new("gpt-4o", transcript.snapshot(), &[], 0);
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(
            body,
            json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "be careful"},
                    {"role": "user", "content": "hi"}
                ],
                "seed": 0
            })
        );
    }

    #[test]
    fn test_request_with_tools() {
        let transcript = Transcript::new(&PolicyDirective::default(), "hi");
        let request = ChatRequest::new("gpt-4o", transcript.snapshot(), &[lookup_spec()], 7);
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["seed"], 7);
        assert_eq!(
            body["tools"],
            json!([{
                "type": "function",
                "function": {
                    "name": "lookup",
                    "description": "Look up a record",
                    "parameters": {"type": "object", "properties": {"x": {"type": "integer"}}}
                }
            }])
        );
    }

    #[test]
    fn test_assistant_replayed_raw() {
        let raw = json!({"role": "assistant", "content": null, "refusal": null, "tool_calls": []});
        let message = Message::Assistant(AssistantMessage {
            content: None,
            tool_calls: vec![],
            raw: Some(raw.clone()),
        });
        assert_eq!(wire_message(&message), raw);
    }

    #[test]
    fn test_assistant_without_raw() {
        let message = Message::Assistant(AssistantMessage {
            content: None,
            tool_calls: vec![ToolCall::new("c1", "lookup", r#"{"x":1}"#)],
            raw: None,
        });
        assert_eq!(
            wire_message(&message),
            json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "c1",
                    "type": "function",
                    "function": {"name": "lookup", "arguments": "{\"x\":1}"}
                }]
            })
        );

        let tool = Message::Tool {
            tool_call_id: "c1".into(),
            content: r#"{"y": 2}"#.into(),
        };
        assert_eq!(
            wire_message(&tool),
            json!({"role": "tool", "tool_call_id": "c1", "content": "{\"y\": 2}"})
        );
    }

    #[test]
    fn test_parse_tool_call_response() {
        let response: ChatResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "lookup", "arguments": "{\"x\":1}"}
                    }]
                }
            }]
        }))
        .unwrap();

        let choice = &response.choices[0];
        assert!(!choice.is_terminal());
        let message = choice.assistant_message().unwrap();
        assert_eq!(message.content, None);
        assert_eq!(message.tool_calls, vec![ToolCall::new("call_1", "lookup", r#"{"x":1}"#)]);
        assert_eq!(message.raw.as_ref(), Some(&choice.message));
    }

    #[test]
    fn test_parse_terminal_response() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{"finish_reason": "stop", "message": {"role": "assistant", "content": "hello", "tool_calls": null}}]
        }))
        .unwrap();

        let choice = &response.choices[0];
        assert!(choice.is_terminal());
        let message = choice.assistant_message().unwrap();
        assert_eq!(message.content.as_deref(), Some("hello"));
        assert!(message.tool_calls.is_empty());
    }

    #[test]
    fn test_missing_finish_reason_is_not_terminal() {
        let response: ChatResponse =
            serde_json::from_value(json!({"choices": [{"message": {"content": "hi"}}]})).unwrap();
        assert!(!response.choices[0].is_terminal());
    }

    #[test]
    fn test_malformed_message() {
        let choice = Choice {
            message: json!({"tool_calls": [{"function": {"name": "lookup"}}]}),
            finish_reason: None,
        };
        let err = choice.assistant_message().unwrap_err();
        assert!(err.to_string().contains("malformed assistant message"));
    }

    #[test]
    fn test_parse_api_error() {
        let body: ApiErrorBody = serde_json::from_str(
            r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#,
        )
        .unwrap();
        assert_eq!(body.error.message, "Incorrect API key provided");
        assert_eq!(body.error.error_type.as_deref(), Some("invalid_request_error"));
    }
}
