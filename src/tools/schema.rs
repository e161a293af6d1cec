//! JSON schema helpers for skill input schemas

use serde_json::{json, Value};

/// Build a JSON schema object
pub fn object_schema() -> SchemaBuilder {
    SchemaBuilder::new("object")
}

/// Build a string property
pub fn string_prop(description: &str) -> Value {
    json!({
        "type": "string",
        "description": description
    })
}

/// Schema builder for skill input schemas
pub struct SchemaBuilder {
    schema_type: String,
    properties: serde_json::Map<String, Value>,
    required: Vec<String>,
    closed: bool,
}

impl SchemaBuilder {
    pub fn new(schema_type: &str) -> Self {
        Self {
            schema_type: schema_type.to_string(),
            properties: serde_json::Map::new(),
            required: Vec::new(),
            closed: false,
        }
    }

    /// Reject properties that were not declared
    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }

    /// Add a property to the schema
    pub fn property(mut self, name: &str, schema: Value, required: bool) -> Self {
        self.properties.insert(name.to_string(), schema);
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// Build the final schema
    pub fn build(self) -> Value {
        let mut schema = json!({
            "type": self.schema_type,
            "properties": self.properties,
            "required": self.required
        });
        if self.closed {
            schema["additionalProperties"] = Value::Bool(false);
        }
        schema
    }
}
