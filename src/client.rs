// src/client.rs
//! Form-side validator: a compiled schema plus the current error map.

use indexmap::IndexMap;
use serde_json::Value;

use crate::schema::{self, SchemaSpec};
use crate::source::ValidationPayload;

#[derive(Debug, Clone, Default)]
pub struct FormValidator {
    schema: SchemaSpec,
    errors: IndexMap<String, String>,
}

impl FormValidator {
    pub fn new(schema: SchemaSpec) -> Self {
        Self { schema, errors: IndexMap::new() }
    }

    /// Build from the payload delivered alongside a page render.
    pub fn from_payload(payload: &ValidationPayload) -> Self {
        Self::new(schema::compile(&payload.validation_rules))
    }

    pub fn schema(&self) -> &SchemaSpec {
        &self.schema
    }

    /// Validate a whole record; replaces the error map.
    pub fn validate_all(&mut self, data: &Value) -> bool {
        let outcome = self.schema.validate_value(data);
        self.errors = outcome.errors;
        outcome.ok
    }

    /// Validate one field (e.g. on blur); sets or clears only that field's entry.
    pub fn validate_one(&mut self, field: &str, value: Option<&Value>) -> bool {
        match self.schema.validate_field(field, value) {
            Ok(()) => {
                self.errors.shift_remove(field);
                true
            }
            Err(message) => {
                self.errors.insert(field.to_string(), message);
                false
            }
        }
    }

    /// Clear one field's error, or all errors when `field` is `None`.
    pub fn clear(&mut self, field: Option<&str>) {
        match field {
            Some(field) => {
                self.errors.shift_remove(field);
            }
            None => self.errors.clear(),
        }
    }

    pub fn errors(&self) -> &IndexMap<String, String> {
        &self.errors
    }

    pub fn error(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
