//! Conversation state for one run
//!
//! The transcript is the ordered, append-only message sequence sent verbatim
//! on every model call. It always starts with the policy directive followed
//! by the user prompt, and tool results only ever answer the most recent
//! assistant message.

use std::collections::HashSet;
use std::io;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::prompts::PolicyDirective;

/// A model-requested skill invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    /// Correlates the eventual tool message with this call
    pub id: String,
    pub name: String,
    /// Arguments exactly as serialized by the model
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// An assistant turn
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssistantMessage {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    /// Backend message object, replayed as-is on later calls
    pub raw: Option<Value>,
}

impl AssistantMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }
}

/// One transcript entry
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    System { content: String },
    User { content: String },
    Assistant(AssistantMessage),
    Tool { tool_call_id: String, content: String },
}

impl Message {
    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::User { .. } => "user",
            Self::Assistant(_) => "assistant",
            Self::Tool { .. } => "tool",
        }
    }
}

/// Appends that would break transcript ordering
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptError {
    #[error("{0} messages can only open a transcript")]
    UnexpectedRole(&'static str),
    #[error("tool result {0} does not answer a call of the latest assistant message")]
    OrphanToolResult(String),
    #[error("tool call {0} was already answered")]
    DuplicateToolResult(String),
    #[error("tool call id {0} appears more than once in one assistant message")]
    DuplicateToolCallId(String),
    #[error("{0} tool call(s) of the previous assistant message are unanswered")]
    UnansweredToolCalls(usize),
}

/// Ordered message sequence for one conversation
#[derive(Debug, Clone)]
pub struct Transcript {
    messages: Vec<Message>,
    /// Unanswered call ids of the latest assistant message, in call order
    pending: Vec<String>,
    answered: HashSet<String>,
}

impl Transcript {
    /// Start a conversation: directive first, then the user prompt
    pub fn new(directive: &PolicyDirective, prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![
                Message::System {
                    content: directive.text().to_string(),
                },
                Message::User {
                    content: prompt.into(),
                },
            ],
            pending: Vec::new(),
            answered: HashSet::new(),
        }
    }

    /// Append a loop-produced message
    pub fn append(&mut self, message: Message) -> Result<(), TranscriptError> {
        match &message {
            Message::System { .. } | Message::User { .. } => {
                return Err(TranscriptError::UnexpectedRole(message.role()));
            }
            Message::Assistant(assistant) => {
                if !self.pending.is_empty() {
                    return Err(TranscriptError::UnansweredToolCalls(self.pending.len()));
                }
                let mut ids = HashSet::new();
                for call in &assistant.tool_calls {
                    if !ids.insert(call.id.as_str()) {
                        return Err(TranscriptError::DuplicateToolCallId(call.id.clone()));
                    }
                }
                self.answered.clear();
                self.pending = assistant.tool_calls.iter().map(|c| c.id.clone()).collect();
            }
            Message::Tool { tool_call_id, .. } => {
                match self.pending.iter().position(|id| id == tool_call_id) {
                    Some(index) => {
                        let id = self.pending.remove(index);
                        self.answered.insert(id);
                    }
                    None if self.answered.contains(tool_call_id) => {
                        return Err(TranscriptError::DuplicateToolResult(tool_call_id.clone()));
                    }
                    None => {
                        return Err(TranscriptError::OrphanToolResult(tool_call_id.clone()));
                    }
                }
            }
        }

        self.messages.push(message);
        Ok(())
    }

    /// Messages to send on the next model call
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    /// Calls of the latest assistant message still waiting for a result
    pub fn pending_tool_calls(&self) -> &[String] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Serialize a skill output the way it is fed back to the model: compact,
/// with `", "` and `": "` separators, keys in the mediator's order
pub fn render_tool_output(output: &Value) -> String {
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    match output.serialize(&mut serializer) {
        Ok(()) => String::from_utf8(buf).unwrap_or_else(|_| output.to_string()),
        Err(_) => output.to_string(),
    }
}

struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}
