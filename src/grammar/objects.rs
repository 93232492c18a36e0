use serde_json::{Map, Value};

use super::RuleObject;

/// `unique:<table>[,<column>[,<ignore id>,<id column>]]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unique {
    pub table: String,
    pub column: Option<String>,
    pub ignore: Option<(String, String)>,
}

impl Unique {
    pub fn new(table: impl Into<String>) -> Self {
        Self { table: table.into(), column: None, ignore: None }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Skip the row whose `id_column` equals `id` (an edit form's own record).
    pub fn ignore(mut self, id: impl Into<String>, id_column: impl Into<String>) -> Self {
        self.ignore = Some((id.into(), id_column.into()));
        self
    }
}

impl RuleObject for Unique {
    fn render(&self) -> Option<String> {
        let mut out = format!("unique:{}", self.table);
        match (&self.column, &self.ignore) {
            (Some(column), Some((id, id_column))) => out.push_str(&format!(",{column},{id},{id_column}")),
            (None, Some((id, id_column))) => out.push_str(&format!(",NULL,{id},{id_column}")),
            (Some(column), None) => out.push_str(&format!(",{column}")),
            (None, None) => {}
        }
        Some(out)
    }
}

/// `exists:<table>[,<column>]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exists {
    pub table: String,
    pub column: Option<String>,
}

impl Exists {
    pub fn new(table: impl Into<String>) -> Self {
        Self { table: table.into(), column: None }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}

impl RuleObject for Exists {
    fn render(&self) -> Option<String> {
        Some(match &self.column {
            Some(column) => format!("exists:{},{column}", self.table),
            None => format!("exists:{}", self.table),
        })
    }
}

/// `in:<v1>,<v2>,...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct In {
    pub values: Vec<String>,
}

impl In {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { values: values.into_iter().map(Into::into).collect() }
    }
}

impl RuleObject for In {
    fn render(&self) -> Option<String> {
        // `in:` with nothing after it would parse as one empty allowed value
        if self.values.is_empty() {
            return None;
        }
        Some(format!("in:{}", self.values.join(",")))
    }
}

/// `regex:<pattern>`; the pattern may contain `|` and `,`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Regex {
    pub pattern: String,
}

impl Regex {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self { pattern: pattern.into() }
    }
}

impl RuleObject for Regex {
    fn render(&self) -> Option<String> {
        Some(format!("regex:{}", self.pattern))
    }
}

/// Object atom decoded from a JSON rule file. Renders its string `rule` member.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRuleObject(pub Map<String, Value>);

impl RuleObject for JsonRuleObject {
    fn render(&self) -> Option<String> {
        match self.0.get("rule") {
            Some(Value::String(text)) => Some(text.clone()),
            _ => None,
        }
    }
}
