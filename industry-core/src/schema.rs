//! Output schema descriptors.
//!
//! Industry does not speak any particular LLM schema dialect; an
//! [`ObjectSchema`] is the minimal, serializable description of the record
//! shape a generator is asked for. It feeds the request fingerprint, so a
//! change to any field name, description or requiredness invalidates the
//! cached group for that producer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One attribute of a generated record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    /// Natural-language description handed to the generator.
    pub description: String,
    pub required: bool,
    /// Fixed value used instead of generation in test runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_value: Option<String>,
}

impl FieldDefinition {
    /// A required field.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: true,
            test_value: None,
        }
    }

    /// An optional field.
    pub fn optional(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::new(name, description)
        }
    }

    pub fn for_test(mut self, value: impl Into<String>) -> Self {
        self.test_value = Some(value.into());
        self
    }

    /// Value used in test runs; falls back to the description.
    pub fn test_value(&self) -> &str {
        match self.test_value.as_deref() {
            Some(value) if !value.is_empty() => value,
            _ => &self.description,
        }
    }
}

/// Shape of one generated record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSchema {
    pub name: String,
    pub description: String,
    pub properties: Vec<FieldDefinition>,
    /// Names of required properties, in declaration order.
    pub required: Vec<String>,
}

impl ObjectSchema {
    /// Build a schema from field definitions, deriving the required list.
    pub fn from_fields(
        name: impl Into<String>,
        description: impl Into<String>,
        fields: Vec<FieldDefinition>,
    ) -> Self {
        let required = fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.clone())
            .collect();

        Self {
            name: name.into(),
            description: description.into(),
            properties: fields,
            required,
        }
    }

    /// Get a property by name.
    pub fn property(&self, name: &str) -> Option<&FieldDefinition> {
        self.properties.iter().find(|f| f.name == name)
    }

    /// A record built from every field's test value, without generation.
    pub fn test_item(&self) -> Value {
        let fields = self
            .properties
            .iter()
            .map(|f| (f.name.clone(), Value::String(f.test_value().to_string())))
            .collect::<serde_json::Map<_, _>>();
        Value::Object(fields)
    }

    /// JSON descriptor used for fingerprinting. Test values are not part of it.
    pub fn to_descriptor(&self) -> Value {
        let properties = self
            .properties
            .iter()
            .map(|f| {
                serde_json::json!({
                    "name": f.name,
                    "description": f.description,
                })
            })
            .collect::<Vec<_>>();

        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "properties": properties,
            "required": self.required,
        })
    }
}
