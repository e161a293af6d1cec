//! Demo skills served by the bundled `resolve-patient-id` and
//! `patient-bloodwork` binaries
//!
//! Each skill is a single-shot process: the mediator passes one JSON
//! argument of the form `{"inputArgs": {...}}` and reads the result from
//! stdout. Failures go to stderr with a skill-specific exit status.

use serde_json::{json, Value};
use thiserror::Error;

use crate::mediator::SkillDescriptor;
use crate::tools::schema::{object_schema, string_prop};

pub const RESOLVE_PATIENT_ID: &str = "resolve-patient-id";
pub const PATIENT_BLOODWORK: &str = "patient-bloodwork";

/// Skill process failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkillError {
    #[error("Usage: {0} '<SkillInputArgs JSON>'")]
    Usage(&'static str),
    #[error("Invalid JSON input: {0}")]
    InvalidJson(String),
    #[error("Missing {0}")]
    MissingField(&'static str),
    #[error("Unknown patient name: {0}")]
    UnknownPatient(String),
}

impl SkillError {
    /// Exit status for `resolve-patient-id`
    pub fn resolve_exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => 1,
            Self::InvalidJson(_) => 2,
            Self::MissingField(_) => 3,
            Self::UnknownPatient(_) => 4,
        }
    }

    /// Exit status for `patient-bloodwork`
    pub fn bloodwork_exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => 1,
            _ => 2,
        }
    }
}

/// Descriptors to register the demo skills with a mediator
pub fn descriptors() -> Vec<SkillDescriptor> {
    vec![
        SkillDescriptor::new(
            RESOLVE_PATIENT_ID,
            "Resolve a patient's hospital id from their name",
            object_schema()
                .property("name", string_prop("Patient name; the first word is matched"), true)
                .closed()
                .build(),
        ),
        SkillDescriptor::new(
            PATIENT_BLOODWORK,
            "Fetch the latest bloodwork panel for a patient id",
            object_schema()
                .property("patient_id", string_prop("Hospital patient id, e.g. H12345"), true)
                .closed()
                .build(),
        ),
    ]
}

/// Hospital id for a known first name
pub fn patient_id_for(first_name: &str) -> Option<&'static str> {
    match first_name.to_lowercase().as_str() {
        "john" => Some("H12345"),
        "sheila" => Some("H23456"),
        "anand" => Some("H56789"),
        _ => None,
    }
}

fn input_args(raw: &str) -> Result<Value, SkillError> {
    let input: Value =
        serde_json::from_str(raw).map_err(|e| SkillError::InvalidJson(e.to_string()))?;
    Ok(input.get("inputArgs").cloned().unwrap_or(Value::Null))
}

/// `resolve-patient-id`: `{"inputArgs": {"name": ...}}` to `{"patient_id": ...}`
pub fn resolve_patient_id(raw: &str) -> Result<Value, SkillError> {
    let args = input_args(raw)?;
    let name = args
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or(SkillError::MissingField("inputArgs.name"))?;

    let first_name = name.split_whitespace().next().unwrap_or_default();
    let patient_id = patient_id_for(first_name)
        .ok_or_else(|| SkillError::UnknownPatient(first_name.to_string()))?;

    Ok(json!({"patient_id": patient_id}))
}

/// Whether a JSON value counts as provided: not null, false, zero or empty
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// `patient-bloodwork`: canned panel for any patient id, echoed as given
pub fn patient_bloodwork(raw: &str) -> Result<Value, SkillError> {
    let args = input_args(raw)?;
    let patient_id = args
        .get("patient_id")
        .filter(|id| is_present(id))
        .cloned()
        .ok_or(SkillError::MissingField("required field: inputArgs.patient_id"))?;

    Ok(json!({
        "patient_id": patient_id,
        "bloodwork": {
            "hemoglobin": 13.5,
            "white_cell_count": 6.2,
            "platelets": 250,
            "glucose": 98,
            "cholesterol": {"total": 180, "ldl": 100, "hdl": 55}
        }
    }))
}
