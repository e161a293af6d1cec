//! Records exchanged with the skill mediator

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RunError, RunResult};

/// A callable skill as advertised by the mediator for one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema", alias = "input_schema")]
    pub input_schema: Value,
}

impl SkillDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Descriptor as it arrives on the wire, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSkillDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        rename = "inputSchema",
        alias = "input_schema",
        skip_serializing_if = "Option::is_none"
    )]
    pub input_schema: Option<Value>,
}

impl RawSkillDescriptor {
    fn validate(self, index: usize) -> RunResult<SkillDescriptor> {
        let name = match self.name {
            Some(name) if !name.trim().is_empty() => name,
            _ => {
                return Err(RunError::Schema(format!(
                    "skill at position {index} is missing a name"
                )))
            }
        };
        let input_schema = match self.input_schema {
            Some(schema) if !schema.is_null() => schema,
            _ => {
                return Err(RunError::Schema(format!(
                    "skill {name} is missing an input schema"
                )))
            }
        };
        Ok(SkillDescriptor {
            name,
            description: self.description.unwrap_or_default(),
            input_schema,
        })
    }
}

/// Validate a full catalog; one bad entry rejects all of it
pub fn validate_catalog(raw: Vec<RawSkillDescriptor>) -> RunResult<Vec<SkillDescriptor>> {
    let mut seen = HashSet::new();
    let mut skills = Vec::with_capacity(raw.len());

    for (index, entry) in raw.into_iter().enumerate() {
        let skill = entry.validate(index)?;
        if !seen.insert(skill.name.clone()) {
            return Err(RunError::Schema(format!(
                "skill {} is listed more than once",
                skill.name
            )));
        }
        skills.push(skill);
    }

    Ok(skills)
}

/// Per-model credentials resolved through the mediator
#[derive(Clone, PartialEq, Eq)]
pub struct ModelCredentials {
    pub api_key: String,
    /// Model identifier to send to the backend
    pub model: String,
    /// Base URL override for the model backend
    pub endpoint: Option<String>,
}

impl fmt::Debug for ModelCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCredentials")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl ModelCredentials {
    /// Build credentials from the mediator's context record
    pub fn from_context(value: Value) -> RunResult<Self> {
        let Value::Object(record) = value else {
            return Err(RunError::Credential(
                "context record is not an object".to_string(),
            ));
        };

        let required = |key: &str| -> RunResult<String> {
            match record.get(key) {
                Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
                Some(Value::String(_)) => {
                    Err(RunError::Credential(format!("{key} is empty")))
                }
                Some(_) => Err(RunError::Credential(format!("{key} is not a string"))),
                None => Err(RunError::Credential(format!("{key} is missing"))),
            }
        };

        let api_key = required("apiKey")?;
        let model = required("model")?;
        let endpoint = record
            .get("endpoint")
            .or_else(|| record.get("baseURL"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self {
            api_key,
            model,
            endpoint,
        })
    }
}

/// Output of one skill invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillResult {
    pub output: Value,
}
