// src/grammar.rs
//! Rule grammar: turns one field's rule specification into ordered tokens.
//!
//! Accepted shapes:
//! - pipe-delimited string: `"required|string|max:255"`
//! - list of atoms: `["required", "string", "max:255"]`
//! - lists containing rule objects that render to canonical rule text
//!
//! Each atom splits on its first `:` into a name and a parameter string, and
//! the parameter string splits on `,`. Names are never validated here.
pub mod objects;

use std::fmt;

use indexmap::IndexMap;
use serde::de::{Deserialize, Deserializer};
use serde_json::Value;

pub use objects::{Exists, In, JsonRuleObject, Regex, Unique};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// One atomic directive, e.g. `max:255` → `{ name: "max", parameters: ["255"] }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleToken {
    pub name: String,
    pub parameters: Vec<String>,
    /// Parameter string before the `,` split; `None` when the atom had no `:`.
    pub raw_parameters: Option<String>,
}

/// A pre-built rule descriptor. Its only capability is rendering itself to
/// canonical rule text; `None` means it has no textual form and is skipped.
pub trait RuleObject: fmt::Debug + Send + Sync {
    fn render(&self) -> Option<String>;
}

#[derive(Debug)]
pub enum RuleAtom {
    Text(String),
    Object(Box<dyn RuleObject>),
}

/// Rule specification for a single field.
#[derive(Debug)]
pub enum RuleSpec {
    Pipe(String),
    List(Vec<RuleAtom>),
}

/// Field name → rule specification, in declaration order.
#[derive(Debug, Default)]
pub struct RawRuleSet {
    pub fields: IndexMap<String, RuleSpec>,
}

// ————————————————————————————————————————————————————————————————————————————
// PARSING
// ————————————————————————————————————————————————————————————————————————————

impl RuleToken {
    /// Parse a single atom. Blank atoms yield `None`.
    ///
    /// Only the name is trimmed; the parameter string is kept verbatim.
    pub fn parse(atom: &str) -> Option<Self> {
        if atom.trim().is_empty() {
            return None;
        }
        let atom = atom.trim_start();
        let (name, raw) = match atom.split_once(':') {
            Some((name, raw)) => (name.trim(), Some(raw.to_string())),
            None => (atom.trim_end(), None),
        };
        if name.is_empty() {
            return None;
        }
        let parameters = raw
            .as_deref()
            .map(|raw| raw.split(',').map(str::to_string).collect())
            .unwrap_or_default();
        Some(Self { name: name.to_string(), parameters, raw_parameters: raw })
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.parameters.get(index).map(String::as_str)
    }
}

impl fmt::Display for RuleToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.raw_parameters {
            Some(raw) => write!(f, "{}:{}", self.name, raw),
            None => f.write_str(&self.name),
        }
    }
}

/// Tokenize one field's rule specification, preserving order.
pub fn parse(spec: &RuleSpec) -> Vec<RuleToken> {
    match spec {
        RuleSpec::Pipe(text) => text.split('|').filter_map(RuleToken::parse).collect(),
        RuleSpec::List(atoms) => atoms.iter().filter_map(parse_atom).collect(),
    }
}

fn parse_atom(atom: &RuleAtom) -> Option<RuleToken> {
    match atom {
        RuleAtom::Text(text) => RuleToken::parse(text),
        RuleAtom::Object(object) => match object.render() {
            Some(text) => RuleToken::parse(&text),
            None => {
                tracing::trace!(?object, "rule object has no textual form; skipped");
                None
            }
        },
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CONSTRUCTION
// ————————————————————————————————————————————————————————————————————————————

impl RuleAtom {
    pub fn object(object: impl RuleObject + 'static) -> Self {
        RuleAtom::Object(Box::new(object))
    }
}

impl From<&str> for RuleAtom {
    fn from(text: &str) -> Self {
        RuleAtom::Text(text.to_string())
    }
}

impl From<String> for RuleAtom {
    fn from(text: String) -> Self {
        RuleAtom::Text(text)
    }
}

impl From<&str> for RuleSpec {
    fn from(text: &str) -> Self {
        RuleSpec::Pipe(text.to_string())
    }
}

impl From<String> for RuleSpec {
    fn from(text: String) -> Self {
        RuleSpec::Pipe(text)
    }
}

impl<A: Into<RuleAtom>> From<Vec<A>> for RuleSpec {
    fn from(atoms: Vec<A>) -> Self {
        RuleSpec::List(atoms.into_iter().map(Into::into).collect())
    }
}

impl RuleSpec {
    /// Lenient conversion from JSON: strings are pipe lists, arrays are atom
    /// lists, anything else is an empty list.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(text) => RuleSpec::Pipe(text),
            Value::Array(items) => RuleSpec::List(items.into_iter().filter_map(atom_from_json).collect()),
            other => {
                tracing::debug!(value = %other, "unsupported rule specification; treated as empty");
                RuleSpec::List(Vec::new())
            }
        }
    }
}

fn atom_from_json(value: Value) -> Option<RuleAtom> {
    match value {
        Value::String(text) => Some(RuleAtom::Text(text)),
        Value::Object(map) => Some(RuleAtom::object(JsonRuleObject(map))),
        other => {
            tracing::trace!(value = %other, "non-rule atom skipped");
            None
        }
    }
}

impl<'de> Deserialize<'de> for RuleSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(RuleSpec::from_json)
    }
}

impl RawRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, spec: impl Into<RuleSpec>) -> Self {
        self.fields.insert(field.into(), spec.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, spec: impl Into<RuleSpec>) {
        self.fields.insert(field.into(), spec.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Lenient conversion from a JSON object; non-objects give an empty set.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => Self {
                fields: map.into_iter().map(|(k, v)| (k, RuleSpec::from_json(v))).collect(),
            },
            other => {
                tracing::debug!(value = %other, "rule set is not an object; treated as empty");
                Self::default()
            }
        }
    }
}

impl<'de> Deserialize<'de> for RawRuleSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let fields = IndexMap::<String, RuleSpec>::deserialize(deserializer)?;
        Ok(Self { fields })
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
