//! Server-side validation rules → client schema validator + TypeScript declaration.
//!
//! Pipeline:
//! 1. [`grammar`]: rule specification (pipe string, list, rule objects) → tokens
//! 2. [`normalize`]: tokens → [`ir::FieldRule`], collected in an ordered [`ir::RuleSet`]
//! 3. [`schema`]: `RuleSet` → [`schema::SchemaSpec`] (runtime validators)
//! 4. [`codegen`]: `RuleSet` → `export interface FormData { ... }`
//!
//! [`client::FormValidator`] holds a compiled schema plus an error map for
//! form-style use; [`source`] defines how rules arrive and how both
//! projections are packaged for delivery.
pub mod cli;
pub mod client;
pub mod codegen;
pub mod error;
pub mod grammar;
pub mod ir;
pub mod jq_exec;
pub mod normalize;
pub mod path_de;
pub mod schema;
pub mod source;

pub use client::FormValidator;
pub use error::{Error, Result};
pub use grammar::{RawRuleSet, RuleAtom, RuleObject, RuleSpec, RuleToken};
pub use ir::{BaseType, Constraint, FieldRule, RuleSet};
pub use schema::{SchemaCompiler, SchemaSpec, Validation};
pub use source::{RuleSource, StaticRuleSource, ValidationPayload};

/// Parse and normalize a raw rule set.
pub fn parse_rules(raw: &RawRuleSet) -> RuleSet {
    normalize::normalize_rule_set(raw)
}

/// Both projections of one rule specification: the compiled validator and
/// the TypeScript declaration named `declaration_name`.
pub fn project(raw: &RawRuleSet, declaration_name: &str) -> (RuleSet, SchemaSpec, String) {
    let rule_set = parse_rules(raw);
    let schema = schema::compile(&rule_set);
    let declaration = codegen::emit(&rule_set, declaration_name);
    (rule_set, schema, declaration)
}
