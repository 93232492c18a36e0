// src/codegen.rs
//! TypeScript interface emission from a `RuleSet`.
//!
//! Only shape and optionality are emitted; value constraints (min/max/regex/...)
//! have no structural equivalent and are left to the schema validator.
//! Output is deterministic: fields in rule-set order, two-space indent, `\n`
//! line ends, no trailing newline.

use crate::ir::{BaseType, FieldRule, RuleSet};

pub const DEFAULT_DECLARATION_NAME: &str = "FormData";

pub struct Codegen {
    out: String,
}

impl Default for Codegen {
    fn default() -> Self {
        Self::new()
    }
}

impl Codegen {
    pub fn new() -> Self {
        Self { out: String::new() }
    }

    /// Append one `export interface <name> { ... }` block. Consecutive blocks
    /// are separated by a blank line.
    pub fn emit(&mut self, rule_set: &RuleSet, name: &str) {
        if !self.out.is_empty() {
            self.out.push_str("\n\n");
        }
        self.out.push_str(&format!("export interface {name} {{\n"));
        for (field, rule) in rule_set.iter() {
            self.out.push_str(&property_line(field, rule));
            self.out.push('\n');
        }
        self.out.push('}');
    }

    pub fn into_string(self) -> String {
        self.out
    }
}

/// Emit a single declaration.
pub fn emit(rule_set: &RuleSet, name: &str) -> String {
    let mut cg = Codegen::new();
    cg.emit(rule_set, name);
    cg.into_string()
}

pub fn emit_default(rule_set: &RuleSet) -> String {
    emit(rule_set, DEFAULT_DECLARATION_NAME)
}

fn property_line(field: &str, rule: &FieldRule) -> String {
    let optional = if rule.required { "" } else { "?" };
    format!("  {}{optional}: {};", property_key(field), ts_type(rule.base_type))
}

pub fn ts_type(base: BaseType) -> &'static str {
    match base {
        BaseType::String => "string",
        BaseType::Number => "number",
        BaseType::Boolean => "boolean",
        BaseType::Date => "Date | string",
        BaseType::Array => "any[]",
        BaseType::File => "File",
    }
}

/// Bare identifiers stay bare; anything else (`first.name`, `2fa`) is quoted.
fn property_key(field: &str) -> String {
    let mut chars = field.chars();
    let is_ident = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    };
    if is_ident {
        field.to_string()
    } else {
        serde_json::Value::from(field).to_string()
    }
}
