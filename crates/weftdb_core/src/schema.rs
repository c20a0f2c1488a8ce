//! Document schemas and validation.
//!
//! Schemas are JSON descriptors expressing required fields, per-field types,
//! and whether unknown fields are rejected. Validation is pluggable behind
//! [`SchemaValidator`] so engines can be swapped or versioned without
//! touching the document types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A JSON schema descriptor for a collection's documents.
///
/// The descriptor subset understood by the default validator:
///
/// - `"type"`: `"object"`, `"string"`, `"integer"`, `"number"`,
///   `"boolean"`, `"array"`, `"null"`
/// - `"required"`: array of field names that must be present
/// - `"properties"`: per-field sub-descriptors
/// - `"additionalProperties": false`: reject fields not listed in
///   `properties`
///
/// A top-level `"$ref": "#/definitions/<name>"` indirection is resolved
/// against a sibling `"definitions"` object, so draft-04-style schemas work
/// unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    root: Value,
}

impl Schema {
    /// Wraps a JSON value as a schema.
    #[must_use]
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    /// Parses a schema from JSON text.
    ///
    /// # Errors
    ///
    /// Returns the underlying JSON parse error.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            root: serde_json::from_str(text)?,
        })
    }

    /// Returns the schema's descriptor with any top-level `$ref` resolved.
    #[must_use]
    pub fn descriptor(&self) -> &Value {
        if let Some(reference) = self.root.get("$ref").and_then(Value::as_str) {
            if let Some(name) = reference.strip_prefix("#/definitions/") {
                if let Some(resolved) = self.root.get("definitions").and_then(|d| d.get(name)) {
                    return resolved;
                }
            }
        }
        &self.root
    }
}

/// A single schema violation, with the path of the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Path to the field, e.g. `"age"` or `"address.city"`. Empty for the
    /// document root.
    pub path: String,
    /// Human-readable reason.
    pub reason: String,
}

impl Violation {
    fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.reason)
        } else {
            write!(f, "{}: {}", self.path, self.reason)
        }
    }
}

/// Pluggable schema validation capability.
pub trait SchemaValidator: Send + Sync {
    /// Validates a document against a schema.
    ///
    /// # Errors
    ///
    /// Returns the full list of violations found; an empty result means the
    /// document conforms.
    fn validate(&self, schema: &Schema, document: &Value) -> Result<(), Vec<Violation>>;
}

/// The default descriptor-based validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorValidator;

impl DescriptorValidator {
    /// Creates a new descriptor validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn check(descriptor: &Value, value: &Value, path: &str, out: &mut Vec<Violation>) {
        if let Some(expected) = descriptor.get("type").and_then(Value::as_str) {
            if !type_matches(expected, value) {
                out.push(Violation::new(
                    path,
                    format!("expected {expected}, got {}", type_name(value)),
                ));
                return;
            }
        }

        let Some(object) = value.as_object() else {
            return;
        };

        if let Some(required) = descriptor.get("required").and_then(Value::as_array) {
            for field in required.iter().filter_map(Value::as_str) {
                if !object.contains_key(field) {
                    out.push(Violation::new(
                        &join_path(path, field),
                        "required field missing",
                    ));
                }
            }
        }

        let properties = descriptor.get("properties").and_then(Value::as_object);

        if descriptor.get("additionalProperties") == Some(&Value::Bool(false)) {
            for field in object.keys() {
                let known = properties.is_some_and(|p| p.contains_key(field));
                if !known {
                    out.push(Violation::new(
                        &join_path(path, field),
                        "unknown field not allowed",
                    ));
                }
            }
        }

        if let Some(properties) = properties {
            for (field, sub) in properties {
                if let Some(field_value) = object.get(field) {
                    Self::check(sub, field_value, &join_path(path, field), out);
                }
            }
        }
    }
}

impl SchemaValidator for DescriptorValidator {
    fn validate(&self, schema: &Schema, document: &Value) -> Result<(), Vec<Violation>> {
        let mut violations = Vec::new();
        Self::check(schema.descriptor(), document, "", &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true, // unknown type names are not enforced
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join_path(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{path}.{field}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    /// A draft-04-style person schema with `$ref` indirection.
    pub(crate) const PERSON_SCHEMA: &str = r##"{
        "$schema": "http://json-schema.org/draft-04/schema#",
        "$ref": "#/definitions/person",
        "definitions": {
            "person": {
                "required": ["_id", "name", "age"],
                "properties": {
                    "_id": {"type": "string"},
                    "name": {"type": "string"},
                    "age": {"type": "integer"}
                },
                "additionalProperties": false,
                "type": "object"
            }
        }
    }"##;

    fn person_schema() -> Schema {
        Schema::from_json(PERSON_SCHEMA).unwrap()
    }

    #[test]
    fn ref_resolution() {
        let schema = person_schema();
        let descriptor = schema.descriptor();
        assert_eq!(descriptor.get("type"), Some(&json!("object")));
    }

    #[test]
    fn valid_person_accepted() {
        let doc = json!({"_id": "", "name": "foo", "age": 21});
        assert!(DescriptorValidator::new()
            .validate(&person_schema(), &doc)
            .is_ok());
    }

    #[test]
    fn missing_required_field_rejected() {
        let doc = json!({"_id": "", "name": "foo"});
        let violations = DescriptorValidator::new()
            .validate(&person_schema(), &doc)
            .unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "age");
    }

    #[test]
    fn unknown_field_rejected() {
        let doc = json!({"_id": "", "name": "foo", "age": 21, "height": 180});
        let violations = DescriptorValidator::new()
            .validate(&person_schema(), &doc)
            .unwrap_err();
        assert!(violations.iter().any(|v| v.path == "height"));
    }

    #[test]
    fn wrong_type_rejected() {
        let doc = json!({"_id": "", "name": "foo", "age": "twenty-one"});
        let violations = DescriptorValidator::new()
            .validate(&person_schema(), &doc)
            .unwrap_err();
        assert_eq!(violations[0].path, "age");
        assert!(violations[0].reason.contains("integer"));
    }

    #[test]
    fn non_object_document_rejected() {
        let violations = DescriptorValidator::new()
            .validate(&person_schema(), &json!(42))
            .unwrap_err();
        assert!(violations[0].reason.contains("object"));
    }

    #[test]
    fn nested_descriptors() {
        let schema = Schema::from_value(json!({
            "type": "object",
            "required": ["address"],
            "properties": {
                "address": {
                    "type": "object",
                    "required": ["city"],
                    "properties": {"city": {"type": "string"}}
                }
            }
        }));

        let good = json!({"address": {"city": "Lisbon"}});
        assert!(DescriptorValidator::new().validate(&schema, &good).is_ok());

        let bad = json!({"address": {"zip": "1000"}});
        let violations = DescriptorValidator::new()
            .validate(&schema, &bad)
            .unwrap_err();
        assert_eq!(violations[0].path, "address.city");
    }

    #[test]
    fn schema_serde_roundtrip() {
        let schema = person_schema();
        let encoded = serde_json::to_string(&schema).unwrap();
        let decoded: Schema = serde_json::from_str(&encoded).unwrap();
        assert_eq!(schema, decoded);
    }

    proptest! {
        #[test]
        fn missing_age_always_rejected(name in ".*", id in ".*") {
            let doc = json!({"_id": id, "name": name});
            let result = DescriptorValidator::new().validate(&person_schema(), &doc);
            prop_assert!(result.is_err());
        }
    }
}
