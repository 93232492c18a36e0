// src/schema.rs
//! Compile a `RuleSet` into runtime validators.
//!
//! Each field becomes a `FieldSchema`: a base-type check, then the field's
//! constraints in order, then the required/optional wrapper. Validation reports
//! the first failing check per field. Compilation never fails as a whole: a
//! constraint that cannot be built (e.g. a pattern the regex engine rejects)
//! degrades to a no-op and is recorded as a `CompileIssue`.
pub mod checks;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::ir::{BaseType, Constraint, FieldRule, RuleSet};

pub const REQUIRED_MESSAGE: &str = "This field is required";

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Compiled validator for a whole form.
#[derive(Debug, Clone, Default)]
pub struct SchemaSpec {
    fields: IndexMap<String, FieldSchema>,
    issues: Vec<CompileIssue>,
}

/// Compiled validator for one field.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    base: BaseType,
    required: bool,
    nullable: bool,
    checks: Vec<Check>,
}

#[derive(Debug, Clone)]
enum Check {
    Min(i64),
    Max(i64),
    Size(i64),
    Enum(Vec<String>),
    Pattern(regex::Regex),
    Email,
    Url,
    Image,
    Mimes(Vec<String>),
    Confirmed(String),
    After(DateBound),
    Before(DateBound),
    /// Implicit for required strings: blank is missing.
    NonBlank,
}

#[derive(Debug, Clone)]
enum DateBound {
    At(NaiveDateTime),
    /// Another field of the same record; only checked with record context.
    Field(String),
}

/// A constraint that could not be compiled and was skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileIssue {
    #[error("field `{field}`: pattern `{pattern}` does not compile: {reason}")]
    InvalidPattern {
        field: String,
        pattern: String,
        reason: String,
    },
}

/// Outcome of whole-record validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub ok: bool,
    pub errors: IndexMap<String, String>,
}

/// Builds `SchemaSpec`s. Date keywords (`today`, `now`, ...) resolve against
/// the compiler's clock.
#[derive(Debug, Clone)]
pub struct SchemaCompiler {
    now: NaiveDateTime,
}

// ————————————————————————————————————————————————————————————————————————————
// COMPILER
// ————————————————————————————————————————————————————————————————————————————

impl Default for SchemaCompiler {
    fn default() -> Self {
        Self { now: Utc::now().naive_utc() }
    }
}

impl SchemaCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin "now" to midnight of `today`.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.now = today.and_time(chrono::NaiveTime::MIN);
        self
    }

    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    pub fn compile(&self, rule_set: &RuleSet) -> SchemaSpec {
        let mut spec = SchemaSpec::default();
        for (name, rule) in rule_set.iter() {
            let field = self.compile_field(name, rule, &mut spec.issues);
            spec.fields.insert(name.to_string(), field);
        }
        if !spec.issues.is_empty() {
            tracing::warn!(issues = spec.issues.len(), "schema compiled with skipped constraints");
        }
        spec
    }

    pub fn compile_field(&self, name: &str, rule: &FieldRule, issues: &mut Vec<CompileIssue>) -> FieldSchema {
        let mut checks = Vec::with_capacity(rule.constraints.len() + 1);
        for constraint in &rule.constraints {
            match self.compile_constraint(name, constraint) {
                Ok(Some(check)) => checks.push(check),
                Ok(None) => {}
                Err(issue) => {
                    tracing::warn!(%issue, "constraint skipped");
                    issues.push(issue);
                }
            }
        }
        if rule.required && rule.base_type == BaseType::String {
            checks.push(Check::NonBlank);
        }
        FieldSchema {
            base: rule.base_type,
            required: rule.required,
            nullable: rule.nullable,
            checks,
        }
    }

    fn compile_constraint(&self, field: &str, constraint: &Constraint) -> Result<Option<Check>, CompileIssue> {
        let check = match constraint {
            Constraint::Min { value } => Check::Min(*value),
            Constraint::Max { value } => Check::Max(*value),
            Constraint::Size { value } => Check::Size(*value),
            Constraint::Enum { values } => Check::Enum(values.clone()),
            Constraint::Regex { pattern } => {
                let translated = checks::translate_pattern(pattern);
                let rx = regex::Regex::new(&translated).map_err(|e| CompileIssue::InvalidPattern {
                    field: field.to_string(),
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?;
                Check::Pattern(rx)
            }
            Constraint::Email => Check::Email,
            Constraint::Url => Check::Url,
            Constraint::Image => Check::Image,
            Constraint::Mimes { types } => {
                Check::Mimes(types.iter().map(|t| t.trim().to_ascii_lowercase()).collect())
            }
            Constraint::Confirmed { field } => Check::Confirmed(field.clone()),
            Constraint::After { date } => Check::After(self.date_bound(date)),
            Constraint::Before { date } => Check::Before(self.date_bound(date)),
            // metadata for the server; nothing to check client-side
            Constraint::Unique { .. } | Constraint::Exists { .. } => return Ok(None),
        };
        Ok(Some(check))
    }

    fn date_bound(&self, raw: &str) -> DateBound {
        match checks::resolve_date_param(raw, self.now) {
            Some(at) => DateBound::At(at),
            None => DateBound::Field(raw.trim().to_string()),
        }
    }
}

/// Compile with the current clock.
pub fn compile(rule_set: &RuleSet) -> SchemaSpec {
    SchemaCompiler::new().compile(rule_set)
}

// ————————————————————————————————————————————————————————————————————————————
// VALIDATION
// ————————————————————————————————————————————————————————————————————————————

impl FieldSchema {
    pub fn base_type(&self) -> BaseType {
        self.base
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Validate a value on its own; cross-field checks are skipped.
    /// `None` means the field is absent.
    pub fn validate(&self, value: Option<&Value>) -> Result<(), String> {
        self.run(value, None)
    }

    /// Validate a value with the rest of its record available for cross-field checks.
    pub fn validate_in(&self, value: Option<&Value>, record: &Map<String, Value>) -> Result<(), String> {
        self.run(value, Some(record))
    }

    fn run(&self, value: Option<&Value>, record: Option<&Map<String, Value>>) -> Result<(), String> {
        let value = match value {
            None if self.required => return Err(REQUIRED_MESSAGE.to_string()),
            None => return Ok(()),
            Some(Value::Null) if self.required => return Err(REQUIRED_MESSAGE.to_string()),
            Some(Value::Null) if self.nullable => return Ok(()),
            Some(v) => v,
        };
        checks::check_base(self.base, value)?;
        for check in &self.checks {
            self.apply(check, value, record)?;
        }
        Ok(())
    }

    fn apply(&self, check: &Check, value: &Value, record: Option<&Map<String, Value>>) -> Result<(), String> {
        match check {
            Check::Min(n) => self.bounded(value, |m| m >= *n as f64, || match checks::unit(self.base) {
                Some(unit) => format!("Must be at least {n} {unit}"),
                None => format!("Must be at least {n}"),
            }),
            Check::Max(n) => self.bounded(value, |m| m <= *n as f64, || match checks::unit(self.base) {
                Some(unit) => format!("Must be no more than {n} {unit}"),
                None => format!("Must be no more than {n}"),
            }),
            Check::Size(n) => self.bounded(value, |m| m == *n as f64, || match checks::unit(self.base) {
                Some(unit) => format!("Must be exactly {n} {unit}"),
                None => format!("Must be exactly {n}"),
            }),
            Check::Enum(values) => ensure(checks::enum_contains(values, value), || {
                format!("Must be one of: {}", values.join(", "))
            }),
            Check::Pattern(rx) => match value.as_str() {
                Some(s) => ensure(rx.is_match(s), || "Invalid format".to_string()),
                None => Ok(()),
            },
            Check::Email => match value.as_str() {
                Some(s) => ensure(checks::is_email(s), || "Please enter a valid email address".to_string()),
                None => Ok(()),
            },
            Check::Url => match value.as_str() {
                Some(s) => ensure(checks::is_url(s), || "Please enter a valid URL".to_string()),
                None => Ok(()),
            },
            Check::Image => match checks::FileRef::from_value(value) {
                Some(file) => ensure(file.is_image(), || "Must be an image file".to_string()),
                None => Ok(()),
            },
            Check::Mimes(types) => match checks::FileRef::from_value(value) {
                Some(file) => {
                    let ext = file.extension().unwrap_or_default();
                    ensure(types.iter().any(|t| *t == ext), || {
                        format!("Must be one of: {}", types.join(", "))
                    })
                }
                None => Ok(()),
            },
            Check::Confirmed(other) => match record {
                Some(record) => ensure(record.get(other) == Some(value), || {
                    "Confirmation does not match".to_string()
                }),
                None => Ok(()),
            },
            Check::After(bound) => compare_date(value, bound, record, |v, b| v > b, "after"),
            Check::Before(bound) => compare_date(value, bound, record, |v, b| v < b, "before"),
            Check::NonBlank => match value.as_str() {
                Some(s) => ensure(!s.is_empty(), || REQUIRED_MESSAGE.to_string()),
                None => Ok(()),
            },
        }
    }

    fn bounded(&self, value: &Value, ok: impl Fn(f64) -> bool, message: impl FnOnce() -> String) -> Result<(), String> {
        match checks::measure(self.base, value) {
            Some(m) => ensure(ok(m), message),
            None => Ok(()),
        }
    }
}

fn ensure(ok: bool, message: impl FnOnce() -> String) -> Result<(), String> {
    if ok { Ok(()) } else { Err(message()) }
}

fn compare_date(
    value: &Value,
    bound: &DateBound,
    record: Option<&Map<String, Value>>,
    ok: impl Fn(NaiveDateTime, NaiveDateTime) -> bool,
    relation: &str,
) -> Result<(), String> {
    let Some(actual) = value.as_str().and_then(checks::parse_date) else {
        return Ok(());
    };
    let (limit, label) = match bound {
        DateBound::At(at) => (*at, at.format("%Y-%m-%d").to_string()),
        DateBound::Field(name) => {
            let other = record
                .and_then(|r| r.get(name))
                .and_then(Value::as_str)
                .and_then(checks::parse_date);
            match other {
                Some(at) => (at, name.clone()),
                None => return Ok(()),
            }
        }
    };
    ensure(ok(actual, limit), || format!("Must be a date {relation} {label}"))
}

// ————————————————————————————————————————————————————————————————————————————
// SCHEMA API
// ————————————————————————————————————————————————————————————————————————————

impl SchemaSpec {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSchema)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Constraints skipped during compilation.
    pub fn issues(&self) -> &[CompileIssue] {
        &self.issues
    }

    /// Restrict the schema to the named fields. Unknown names are ignored.
    pub fn subset<S: AsRef<str>>(&self, names: &[S]) -> SchemaSpec {
        let keep = |field: &str| names.iter().any(|n| n.as_ref() == field);
        SchemaSpec {
            fields: self
                .fields
                .iter()
                .filter(|(k, _)| keep(k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            issues: self
                .issues
                .iter()
                .filter(|issue| match issue {
                    CompileIssue::InvalidPattern { field, .. } => keep(field.as_str()),
                })
                .cloned()
                .collect(),
        }
    }

    /// Validate one field in isolation. Unknown fields always pass.
    pub fn validate_field(&self, name: &str, value: Option<&Value>) -> Result<(), String> {
        match self.fields.get(name) {
            Some(field) => field.validate(value),
            None => Ok(()),
        }
    }

    /// Validate every field of the schema against `data`, collecting the first
    /// failure of each field. Keys of `data` not in the schema are ignored.
    pub fn validate_record(&self, data: &Map<String, Value>) -> Validation {
        let mut errors = IndexMap::new();
        for (name, field) in &self.fields {
            if let Err(message) = field.validate_in(data.get(name), data) {
                errors.insert(name.clone(), message);
            }
        }
        tracing::debug!(fields = self.fields.len(), failed = errors.len(), "record validated");
        Validation { ok: errors.is_empty(), errors }
    }

    /// Like `validate_record`; a non-object value is validated as an empty record.
    pub fn validate_value(&self, data: &Value) -> Validation {
        match data {
            Value::Object(map) => self.validate_record(map),
            _ => self.validate_record(&Map::new()),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::RawRuleSet;
    use serde_json::json;

    fn schema(raw: RawRuleSet) -> SchemaSpec {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        SchemaCompiler::new().with_today(today).compile(&RuleSet::from_raw(&raw))
    }

    fn record(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn required_string_rejects_blank() {
        let s = schema(RawRuleSet::new().with("name", "required|string|max:255"));
        assert_eq!(s.validate_field("name", Some(&json!(""))), Err(REQUIRED_MESSAGE.into()));
        assert_eq!(s.validate_field("name", Some(&json!("Ann"))), Ok(()));
        assert_eq!(s.validate_field("name", None), Err(REQUIRED_MESSAGE.into()));
    }

    #[test]
    fn explicit_min_reports_before_blank_check() {
        let s = schema(RawRuleSet::new().with("password", "required|string|min:8"));
        assert_eq!(
            s.validate_field("password", Some(&json!(""))),
            Err("Must be at least 8 characters".into())
        );
    }

    #[test]
    fn optional_fields_accept_absence() {
        let s = schema(RawRuleSet::new().with("bio", "string|max:3"));
        assert_eq!(s.validate_field("bio", None), Ok(()));
        assert!(s.validate_field("bio", Some(&json!("long"))).is_err());
        assert_eq!(
            s.validate_field("bio", Some(&Value::Null)),
            Err("Expected string, received null".into())
        );
    }

    #[test]
    fn nullable_accepts_null_unless_required() {
        let s = schema(
            RawRuleSet::new()
                .with("phone", "nullable|string")
                .with("team", "required|nullable|string"),
        );
        assert_eq!(s.validate_field("phone", Some(&Value::Null)), Ok(()));
        assert_eq!(s.validate_field("team", Some(&Value::Null)), Err(REQUIRED_MESSAGE.into()));
    }

    #[test]
    fn unknown_fields_always_pass() {
        let s = schema(RawRuleSet::new().with("name", "required"));
        assert_eq!(s.validate_field("nope", None), Ok(()));
        assert_eq!(s.validate_field("nope", Some(&json!({"any": 1}))), Ok(()));
        let empty = schema(RawRuleSet::new());
        assert!(empty.validate_value(&json!({"x": 1})).ok);
    }

    #[test]
    fn numeric_bounds_use_value() {
        let s = schema(RawRuleSet::new().with("age", "required|integer|between:18,100"));
        assert_eq!(s.validate_field("age", Some(&json!(17))), Err("Must be at least 18".into()));
        assert_eq!(s.validate_field("age", Some(&json!(101))), Err("Must be no more than 100".into()));
        assert_eq!(s.validate_field("age", Some(&json!(30))), Ok(()));
        assert_eq!(
            s.validate_field("age", Some(&json!("30"))),
            Err("Expected number, received string".into())
        );
    }

    #[test]
    fn string_length_counts_characters() {
        let s = schema(RawRuleSet::new().with("code", "string|size:3"));
        assert_eq!(s.validate_field("code", Some(&json!("äöü"))), Ok(()));
        assert_eq!(
            s.validate_field("code", Some(&json!("ab"))),
            Err("Must be exactly 3 characters".into())
        );
    }

    #[test]
    fn array_bounds_count_items() {
        let s = schema(RawRuleSet::new().with("tags", "array|min:1|max:2"));
        assert_eq!(s.validate_field("tags", Some(&json!([]))), Err("Must be at least 1 items".into()));
        assert_eq!(s.validate_field("tags", Some(&json!(["a"]))), Ok(()));
    }

    #[test]
    fn enum_lists_allowed_values() {
        let s = schema(RawRuleSet::new().with("role", "required|string|in:admin,user"));
        assert_eq!(
            s.validate_field("role", Some(&json!("guest"))),
            Err("Must be one of: admin, user".into())
        );
    }

    #[test]
    fn delimited_patterns_compile() {
        let s = schema(RawRuleSet::new().with("phone", vec![r"regex:/^[0-9]{10}$/"]));
        assert!(s.issues().is_empty());
        assert_eq!(s.validate_field("phone", Some(&json!("0123456789"))), Ok(()));
        assert_eq!(s.validate_field("phone", Some(&json!("12345"))), Err("Invalid format".into()));
    }

    #[test]
    fn comma_quantifier_pattern_validates() {
        let s = schema(RawRuleSet::new().with("year", vec![r"regex:/^\d{2,4}$/"]));
        assert!(s.issues().is_empty());
        assert_eq!(s.validate_field("year", Some(&json!("12"))), Ok(()));
        assert_eq!(s.validate_field("year", Some(&json!("12345"))), Err("Invalid format".into()));
    }

    #[test]
    fn trailing_space_in_pattern_is_significant() {
        let s = schema(RawRuleSet::new().with("p", vec!["regex:^a "]));
        assert_eq!(s.validate_field("p", Some(&json!("a b"))), Ok(()));
        assert_eq!(s.validate_field("p", Some(&json!("ab"))), Err("Invalid format".into()));
    }

    #[test]
    fn bad_pattern_degrades_without_affecting_others() {
        let s = schema(
            RawRuleSet::new()
                .with("code", vec!["required", "string", "regex:/(?<=a)b/", "max:2"])
                .with("name", "required|string"),
        );
        assert_eq!(s.issues().len(), 1);
        assert!(matches!(&s.issues()[0], CompileIssue::InvalidPattern { field, .. } if field == "code"));
        // remaining checks on the same field still run
        assert_eq!(
            s.validate_field("code", Some(&json!("abc"))),
            Err("Must be no more than 2 characters".into())
        );
        assert_eq!(s.validate_field("name", Some(&json!(""))), Err(REQUIRED_MESSAGE.into()));
    }

    #[test]
    fn email_and_url_messages() {
        let s = schema(RawRuleSet::new().with("email", "required|email").with("site", "url"));
        assert_eq!(
            s.validate_field("email", Some(&json!("nope"))),
            Err("Please enter a valid email address".into())
        );
        assert_eq!(s.validate_field("site", Some(&json!("nope"))), Err("Please enter a valid URL".into()));
    }

    #[test]
    fn confirmed_needs_record_context() {
        let s = schema(RawRuleSet::new().with("password", "required|string|confirmed"));
        let bad = record(json!({"password": "secret", "password_confirmation": "other"}));
        let good = record(json!({"password": "secret", "password_confirmation": "secret"}));
        assert_eq!(
            s.validate_record(&bad).errors.get("password").map(String::as_str),
            Some("Confirmation does not match")
        );
        assert!(s.validate_record(&good).ok);
        // single-field validation cannot see the companion
        assert_eq!(s.validate_field("password", Some(&json!("secret"))), Ok(()));
    }

    #[test]
    fn date_rules() {
        let s = schema(
            RawRuleSet::new()
                .with("birth_date", "required|date|before:today")
                .with("start", "date")
                .with("end", "date|after:start"),
        );
        assert_eq!(s.validate_field("birth_date", Some(&json!("1990-01-01"))), Ok(()));
        assert_eq!(
            s.validate_field("birth_date", Some(&json!("2030-01-01"))),
            Err("Must be a date before 2025-06-15".into())
        );
        assert_eq!(s.validate_field("birth_date", Some(&json!("soon"))), Err("Invalid date".into()));

        let bad = record(json!({"start": "2025-02-01", "end": "2025-01-01"}));
        let v = s.validate_record(&bad);
        assert_eq!(v.errors.get("end").map(String::as_str), Some("Must be a date after start"));
        assert_eq!(s.validate_field("end", Some(&json!("2025-01-01"))), Ok(()));
    }

    #[test]
    fn file_rules() {
        let s = schema(RawRuleSet::new().with("avatar", "nullable|file|image|mimes:png,jpg|max:2048"));
        let ok = json!({"name": "me.png", "type": "image/png", "size": 1024 * 100});
        let pdf = json!({"name": "me.pdf", "type": "application/pdf", "size": 10});
        let gif = json!({"name": "me.gif", "type": "image/gif", "size": 10});
        let huge = json!({"name": "me.png", "type": "image/png", "size": 1024 * 4096});
        assert_eq!(s.validate_field("avatar", Some(&ok)), Ok(()));
        assert_eq!(s.validate_field("avatar", Some(&pdf)), Err("Must be an image file".into()));
        assert_eq!(s.validate_field("avatar", Some(&gif)), Err("Must be one of: png, jpg".into()));
        assert_eq!(
            s.validate_field("avatar", Some(&huge)),
            Err("Must be no more than 2048 kilobytes".into())
        );
        assert_eq!(s.validate_field("avatar", Some(&Value::Null)), Ok(()));
        assert_eq!(
            s.validate_field("avatar", Some(&json!("me.png"))),
            Err("Expected file, received string".into())
        );
    }

    #[test]
    fn record_validation_does_not_short_circuit() {
        let s = schema(
            RawRuleSet::new()
                .with("a", "required|string")
                .with("b", "required|integer")
                .with("c", "string"),
        );
        let v = s.validate_record(&record(json!({"a": "", "b": "x", "extra": true})));
        assert!(!v.ok);
        let failed: Vec<_> = v.errors.keys().map(String::as_str).collect();
        assert_eq!(failed, ["a", "b"]);
    }

    #[test]
    fn subset_keeps_named_fields() {
        let s = schema(
            RawRuleSet::new()
                .with("a", "required")
                .with("b", vec!["regex:/(?=x)/"])
                .with("c", "required"),
        );
        let sub = s.subset(&["a"]);
        assert_eq!(sub.len(), 1);
        assert!(sub.issues().is_empty());
        assert!(sub.field("c").is_none());
        assert_eq!(s.subset(&["b", "zzz"]).issues().len(), 1);
    }
}
