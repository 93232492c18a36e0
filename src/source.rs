// src/source.rs
//! Where raw rules come from, and what gets handed to the rendering layer.
//!
//! Locating rules for a handler (naming conventions, introspection) is the
//! job of a `RuleSource` implementation outside this crate. This module only
//! fixes the contract and packages the two projections for delivery.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::codegen;
use crate::grammar::RawRuleSet;
use crate::ir::RuleSet;

/// Supplies the raw rule specification for a handler's action.
/// An empty set means "validate nothing".
pub trait RuleSource {
    fn rules_for(&self, handler: &str, action: &str) -> RawRuleSet;
}

/// The action whose rules a page needs: forms validate against the action
/// they submit to; read-only pages need none.
pub fn validation_action(action: &str) -> Option<&str> {
    match action {
        "create" => Some("store"),
        "edit" => Some("update"),
        "show" | "index" => None,
        other => Some(other),
    }
}

/// In-memory `handler → action → rules` table.
#[derive(Debug, Default)]
pub struct StaticRuleSource {
    entries: HashMap<String, HashMap<String, serde_json::Value>>,
}

impl StaticRuleSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register rules as JSON (`{"field": "rules" | [...]}`).
    pub fn insert(&mut self, handler: impl Into<String>, action: impl Into<String>, rules: serde_json::Value) {
        self.entries
            .entry(handler.into())
            .or_default()
            .insert(action.into(), rules);
    }

    pub fn with(mut self, handler: impl Into<String>, action: impl Into<String>, rules: serde_json::Value) -> Self {
        self.insert(handler, action, rules);
        self
    }
}

impl RuleSource for StaticRuleSource {
    fn rules_for(&self, handler: &str, action: &str) -> RawRuleSet {
        self.entries
            .get(handler)
            .and_then(|actions| actions.get(action))
            .map(|rules| RawRuleSet::from_json(rules.clone()))
            .unwrap_or_default()
    }
}

/// Everything the client needs to validate a form, as one plain value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationPayload {
    pub validation_rules: RuleSet,
    pub type_script_interface: String,
    pub validation_method: String,
    pub current_action: String,
}

impl ValidationPayload {
    /// `None` when the action needs no validation or the source has no rules.
    pub fn build(source: &dyn RuleSource, handler: &str, action: &str) -> Option<Self> {
        let method = validation_action(action)?;
        let raw = source.rules_for(handler, method);
        if raw.is_empty() {
            tracing::debug!(handler, action, method, "no rules to share");
            return None;
        }
        Some(Self::from_raw(&raw, method, action))
    }

    pub fn from_raw(raw: &RawRuleSet, method: &str, action: &str) -> Self {
        Self::new(RuleSet::from_raw(raw), method, action)
    }

    pub fn new(validation_rules: RuleSet, method: &str, action: &str) -> Self {
        let type_script_interface = codegen::emit_default(&validation_rules);
        Self {
            validation_rules,
            type_script_interface,
            validation_method: method.to_string(),
            current_action: action.to_string(),
        }
    }
}
