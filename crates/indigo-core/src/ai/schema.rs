//! Declarative output schemas for structured generation
//!
//! A [`Schema`] is an explicit list of fields, each with a type and an
//! optional constraint. It renders itself as JSON Schema for providers and
//! validates whatever text comes back into a [`Record`].

use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    String,
    Boolean,
    Integer,
    StringArray,
    /// String restricted to a closed set of values
    Enum(&'static [&'static str]),
}

impl FieldType {
    fn describe(&self) -> &'static str {
        match self {
            FieldType::String | FieldType::Enum(_) => "string",
            FieldType::Boolean => "boolean",
            FieldType::Integer => "integer",
            FieldType::StringArray => "array of strings",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    pub ty: FieldType,
    pub description: &'static str,
    pub required: bool,
}

#[derive(Debug, Clone)]
pub struct Schema {
    pub name: &'static str,
    pub description: &'static str,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum SchemaError {
    #[error("output is not valid JSON: {0}")]
    NotJson(String),
    #[error("output is not a JSON object")]
    NotObject,
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("field '{field}' should be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("field '{field}' has value '{value}', expected one of {allowed:?}")]
    NotAllowed {
        field: &'static str,
        value: String,
        allowed: &'static [&'static str],
    },
}

impl Schema {
    pub fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: &'static str, ty: FieldType, description: &'static str) -> Self {
        self.fields.push(Field {
            name,
            ty,
            description,
            required: true,
        });
        self
    }

    pub fn optional_field(
        mut self,
        name: &'static str,
        ty: FieldType,
        description: &'static str,
    ) -> Self {
        self.fields.push(Field {
            name,
            ty,
            description,
            required: false,
        });
        self
    }

    /// JSON Schema rendering (no `additionalProperties`, which Gemini rejects).
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut prop = match &field.ty {
                FieldType::String => json!({"type": "string"}),
                FieldType::Boolean => json!({"type": "boolean"}),
                FieldType::Integer => json!({"type": "integer"}),
                FieldType::StringArray => json!({"type": "array", "items": {"type": "string"}}),
                FieldType::Enum(values) => json!({"type": "string", "enum": values}),
            };
            prop["description"] = Value::String(field.description.to_string());
            properties.insert(field.name.to_string(), prop);
        }
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect();

        json!({
            "type": "object",
            "description": self.description,
            "properties": properties,
            "required": required,
        })
    }

    /// Parse raw model text into a validated record.
    pub fn parse(&self, raw: &str) -> Result<Record, SchemaError> {
        let value: Value = serde_json::from_str(strip_code_fences(raw))
            .map_err(|e| SchemaError::NotJson(e.to_string()))?;
        self.validate(value)
    }

    pub fn validate(&self, value: Value) -> Result<Record, SchemaError> {
        let Value::Object(mut object) = value else {
            return Err(SchemaError::NotObject);
        };

        let mut fields = Map::new();
        for field in &self.fields {
            match object.remove(field.name) {
                None | Some(Value::Null) if field.required => {
                    return Err(SchemaError::MissingField(field.name))
                }
                None | Some(Value::Null) => {}
                Some(value) => {
                    check_type(field, &value)?;
                    fields.insert(field.name.to_string(), value);
                }
            }
        }
        Ok(Record(fields))
    }
}

fn check_type(field: &Field, value: &Value) -> Result<(), SchemaError> {
    let wrong = || SchemaError::WrongType {
        field: field.name,
        expected: field.ty.describe(),
    };
    match &field.ty {
        FieldType::String => value.as_str().map(|_| ()).ok_or_else(wrong),
        FieldType::Boolean => value.as_bool().map(|_| ()).ok_or_else(wrong),
        FieldType::Integer => value.as_i64().map(|_| ()).ok_or_else(wrong),
        FieldType::StringArray => match value.as_array() {
            Some(items) if items.iter().all(Value::is_string) => Ok(()),
            _ => Err(wrong()),
        },
        FieldType::Enum(allowed) => {
            let s = value.as_str().ok_or_else(wrong)?;
            if allowed.contains(&s) {
                Ok(())
            } else {
                Err(SchemaError::NotAllowed {
                    field: field.name,
                    value: s.to_string(),
                    allowed,
                })
            }
        }
    }
}

/// Validated structured output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn string_array(&self, name: &str) -> Vec<String> {
        self.0
            .get(name)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.0.get(name).and_then(Value::as_bool)
    }
}

/// Strip a surrounding markdown code fence (```json ... ```) if present.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches("json"),
    };
    body.trim_end().trim_end_matches("```").trim()
}
