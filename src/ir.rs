// Strongly-typed rule IR shared by the schema compiler and the type emitter.
// Serializes to the wire payload the client consumes.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Base shape of a field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseType {
    #[default]
    String,
    Number,
    Boolean,
    Date,
    Array,
    File,
}

impl BaseType {
    pub fn as_str(self) -> &'static str {
        match self {
            BaseType::String => "string",
            BaseType::Number => "number",
            BaseType::Boolean => "boolean",
            BaseType::Date => "date",
            BaseType::Array => "array",
            BaseType::File => "file",
        }
    }
}

/// One refinement applied on top of the base type.
///
/// Serialized as a plain record with a `type` discriminator, e.g.
/// `{"type": "min", "value": 8}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Constraint {
    Min { value: i64 },
    Max { value: i64 },
    Size { value: i64 },
    Enum { values: Vec<String> },
    Regex { pattern: String },
    Confirmed { field: String },
    Unique {
        table: Option<String>,
        column: Option<String>,
    },
    Exists {
        table: Option<String>,
        column: Option<String>,
    },
    After { date: String },
    Before { date: String },
    Mimes { types: Vec<String> },
    Image,
    Email,
    Url,
}

impl Constraint {
    /// Wire discriminator of this constraint.
    pub fn kind(&self) -> &'static str {
        match self {
            Constraint::Min { .. } => "min",
            Constraint::Max { .. } => "max",
            Constraint::Size { .. } => "size",
            Constraint::Enum { .. } => "enum",
            Constraint::Regex { .. } => "regex",
            Constraint::Confirmed { .. } => "confirmed",
            Constraint::Unique { .. } => "unique",
            Constraint::Exists { .. } => "exists",
            Constraint::After { .. } => "after",
            Constraint::Before { .. } => "before",
            Constraint::Mimes { .. } => "mimes",
            Constraint::Image => "image",
            Constraint::Email => "email",
            Constraint::Url => "url",
        }
    }
}

/// All rules for one field after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldRule {
    #[serde(rename = "type")]
    pub base_type: BaseType,
    pub required: bool,
    /// `null` counts as "no value" for this field.
    #[serde(default, skip_serializing_if = "is_false")]
    pub nullable: bool,
    #[serde(rename = "rules", default)]
    pub constraints: Vec<Constraint>, // order matters for first-failure reporting
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Field name → rule, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    fields: IndexMap<String, FieldRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field. A replaced field keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, rule: FieldRule) -> Option<FieldRule> {
        self.fields.insert(name.into(), rule)
    }

    pub fn get(&self, name: &str) -> Option<&FieldRule> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldRule)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Append every field of `other`; fields already present are replaced in place.
    pub fn extend(&mut self, other: RuleSet) {
        self.fields.extend(other.fields);
    }
}

impl FromIterator<(String, FieldRule)> for RuleSet {
    fn from_iter<I: IntoIterator<Item = (String, FieldRule)>>(iter: I) -> Self {
        Self { fields: iter.into_iter().collect() }
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = (&'a String, &'a FieldRule);
    type IntoIter = indexmap::map::Iter<'a, String, FieldRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
