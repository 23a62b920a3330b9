//! A small, JSON-schema-like parameter schema and validator — dynamic
//! dispatch of tools without reflection (spec §9): a tool's schema is data,
//! not a type, so the registry can validate arbitrary arguments uniformly.

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub enum PropertyType {
    String,
    Number,
    Boolean,
    Enum(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct Property {
    pub ty: PropertyType,
    pub required: bool,
}

/// An object schema: named, typed properties plus which are required.
/// Mirrors the "object with typed properties, required fields, enums"
/// description in spec §4.B.
#[derive(Debug, Clone, Default)]
pub struct ToolSchema {
    pub properties: BTreeMap<String, Property>,
}

impl ToolSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required_string(mut self, name: impl Into<String>) -> Self {
        self.properties.insert(
            name.into(),
            Property {
                ty: PropertyType::String,
                required: true,
            },
        );
        self
    }

    pub fn optional_string(mut self, name: impl Into<String>) -> Self {
        self.properties.insert(
            name.into(),
            Property {
                ty: PropertyType::String,
                required: false,
            },
        );
        self
    }

    pub fn optional_enum(mut self, name: impl Into<String>, values: &[&str]) -> Self {
        self.properties.insert(
            name.into(),
            Property {
                ty: PropertyType::Enum(values.iter().map(|s| s.to_string()).collect()),
                required: false,
            },
        );
        self
    }

    /// Validate `args` (must be a JSON object) against this schema:
    /// required fields present, types match, enum values are in range.
    /// Array-typed `arguments` are rejected per spec §4.C.
    pub fn validate(&self, args: &Value) -> Result<()> {
        let Some(obj) = args.as_object() else {
            return Err(Error::validation(
                "tool arguments must be a JSON object, not an array or scalar",
            ));
        };

        for (name, prop) in &self.properties {
            let value = obj.get(name);
            match value {
                None if prop.required => {
                    return Err(Error::validation(format!("missing required field '{name}'")));
                }
                None => continue,
                Some(v) => Self::validate_type(name, &prop.ty, v)?,
            }
        }
        Ok(())
    }

    fn validate_type(name: &str, ty: &PropertyType, value: &Value) -> Result<()> {
        match ty {
            PropertyType::String => {
                if !value.is_string() {
                    return Err(Error::validation(format!("field '{name}' must be a string")));
                }
            }
            PropertyType::Number => {
                if !value.is_number() {
                    return Err(Error::validation(format!("field '{name}' must be a number")));
                }
            }
            PropertyType::Boolean => {
                if !value.is_boolean() {
                    return Err(Error::validation(format!("field '{name}' must be a boolean")));
                }
            }
            PropertyType::Enum(allowed) => {
                let s = value
                    .as_str()
                    .ok_or_else(|| Error::validation(format!("field '{name}' must be a string")))?;
                if !allowed.iter().any(|a| a == s) {
                    return Err(Error::validation(format!(
                        "field '{name}' must be one of {allowed:?}, got '{s}'"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Render as a minimal JSON Schema object, for advertising to the LLM.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for (name, prop) in &self.properties {
            let schema = match &prop.ty {
                PropertyType::String => serde_json::json!({"type": "string"}),
                PropertyType::Number => serde_json::json!({"type": "number"}),
                PropertyType::Boolean => serde_json::json!({"type": "boolean"}),
                PropertyType::Enum(values) => serde_json::json!({"type": "string", "enum": values}),
            };
            properties.insert(name.clone(), schema);
            if prop.required {
                required.push(name.clone());
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}
