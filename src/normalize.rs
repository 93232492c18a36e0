// src/normalize.rs
//! Fold a field's rule tokens into one `FieldRule`.
//!
//! Policy:
//! - Base type defaults to string; the last type-setting token wins.
//! - `required` / `nullable` latch on; nothing turns them off.
//! - Constraints keep token order; `between` expands to `min` then `max`.
//! - Unknown names are ignored so new server-side rules never break the pipeline.
//! - Malformed parameters drop only the affected constraint (logged as a warning).

use crate::grammar::{self, RawRuleSet, RuleToken};
use crate::ir::{BaseType, Constraint, FieldRule, RuleSet};

// -------------------- per-field fold --------------------

/// Normalize the tokens of a single field. Never fails.
pub fn normalize(tokens: &[RuleToken], field: &str) -> FieldRule {
    let mut out = FieldRule::default();
    for token in tokens {
        apply_token(&mut out, token, field);
    }
    out
}

fn apply_token(out: &mut FieldRule, token: &RuleToken, field: &str) {
    let rules = &mut out.constraints;
    match token.name.as_str() {
        "required" => out.required = true,
        "nullable" => out.nullable = true,

        "string" => out.base_type = BaseType::String,
        "integer" | "numeric" => out.base_type = BaseType::Number,
        "boolean" => out.base_type = BaseType::Boolean,
        "date" => out.base_type = BaseType::Date,
        "array" => out.base_type = BaseType::Array,
        "file" => out.base_type = BaseType::File,

        "email" => {
            out.base_type = BaseType::String;
            rules.push(Constraint::Email);
        }
        "url" => {
            out.base_type = BaseType::String;
            rules.push(Constraint::Url);
        }

        "min" => rules.extend(int_param(token, 0, field).map(|value| Constraint::Min { value })),
        "max" => rules.extend(int_param(token, 0, field).map(|value| Constraint::Max { value })),
        "size" => rules.extend(int_param(token, 0, field).map(|value| Constraint::Size { value })),
        "between" => {
            rules.extend(int_param(token, 0, field).map(|value| Constraint::Min { value }));
            rules.extend(int_param(token, 1, field).map(|value| Constraint::Max { value }));
        }

        "in" => rules.push(Constraint::Enum { values: token.parameters.clone() }),
        "regex" => match token.raw_parameters.as_deref() {
            Some(pattern) if !pattern.is_empty() => {
                rules.push(Constraint::Regex { pattern: pattern.to_string() })
            }
            _ => degraded(token, field, "missing pattern"),
        },
        "confirmed" => rules.push(Constraint::Confirmed { field: format!("{field}_confirmation") }),
        "unique" => rules.push(Constraint::Unique {
            table: db_param(token, 0),
            column: db_param(token, 1),
        }),
        "exists" => rules.push(Constraint::Exists {
            table: db_param(token, 0),
            column: db_param(token, 1),
        }),
        "after" => match opt_param(token, 0) {
            Some(date) => rules.push(Constraint::After { date }),
            None => degraded(token, field, "missing date"),
        },
        "before" => match opt_param(token, 0) {
            Some(date) => rules.push(Constraint::Before { date }),
            None => degraded(token, field, "missing date"),
        },
        "image" => rules.push(Constraint::Image),
        "mimes" => rules.push(Constraint::Mimes { types: token.parameters.clone() }),

        other => tracing::trace!(field, rule = other, "unmapped rule ignored"),
    }
}

// -------------------- parameter helpers --------------------

/// Integer parameter with server-style casting: surrounding whitespace is
/// ignored and a fractional part truncates. Anything else yields `None`.
fn int_param(token: &RuleToken, index: usize, field: &str) -> Option<i64> {
    let parsed = token.param(index).and_then(parse_int);
    if parsed.is_none() {
        degraded(token, field, "non-integer parameter");
    }
    parsed
}

fn parse_int(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<i64>() {
        return Some(v);
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() && f.abs() < i64::MAX as f64 => Some(f.trunc() as i64),
        _ => None,
    }
}

fn opt_param(token: &RuleToken, index: usize) -> Option<String> {
    token
        .param(index)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
}

/// Table/column parameter; `NULL` is the placeholder for "default".
fn db_param(token: &RuleToken, index: usize) -> Option<String> {
    opt_param(token, index).filter(|p| !p.eq_ignore_ascii_case("null"))
}

fn degraded(token: &RuleToken, field: &str, reason: &str) {
    tracing::warn!(field, rule = %token, reason, "constraint dropped");
}

// -------------------- whole rule set --------------------

/// Tokenize and normalize every field, keeping declaration order.
pub fn normalize_rule_set(raw: &RawRuleSet) -> RuleSet {
    let rule_set: RuleSet = raw
        .fields
        .iter()
        .map(|(field, spec)| {
            let tokens = grammar::parse(spec);
            (field.clone(), normalize(&tokens, field))
        })
        .collect();
    tracing::debug!(fields = rule_set.len(), "rule set normalized");
    rule_set
}

impl RuleSet {
    pub fn from_raw(raw: &RawRuleSet) -> Self {
        normalize_rule_set(raw)
    }
}

// -------------------- tests --------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{RuleAtom, RuleSpec, Unique};

    fn norm(spec: impl Into<RuleSpec>, field: &str) -> FieldRule {
        normalize(&grammar::parse(&spec.into()), field)
    }

    #[test]
    fn defaults_to_optional_string() {
        let rule = norm("", "x");
        assert_eq!(rule, FieldRule::default());
        assert_eq!(rule.base_type, BaseType::String);
        assert!(!rule.required);
    }

    #[test]
    fn grammar_form_does_not_matter() {
        let pipe = norm("required|integer|min:18|max:100", "age");
        let list = norm(vec!["required", "integer", "min:18", "max:100"], "age");
        assert_eq!(pipe, list);
        assert_eq!(pipe.base_type, BaseType::Number);
        assert!(pipe.required);
    }

    #[test]
    fn last_type_token_wins() {
        assert_eq!(norm("integer|string", "x").base_type, BaseType::String);
        assert_eq!(norm("string|numeric", "x").base_type, BaseType::Number);
        assert_eq!(norm("date|array", "x").base_type, BaseType::Array);
    }

    #[test]
    fn required_latches() {
        let rule = norm("required|nullable|string", "x");
        assert!(rule.required);
        assert!(rule.nullable);
    }

    #[test]
    fn between_expands_to_min_then_max() {
        let rule = norm("between:10,20", "x");
        assert_eq!(
            rule.constraints,
            [Constraint::Min { value: 10 }, Constraint::Max { value: 20 }]
        );
    }

    #[test]
    fn enum_values_are_verbatim() {
        let rule = norm("in:Admin, user ,mod", "role");
        assert_eq!(
            rule.constraints,
            [Constraint::Enum { values: vec!["Admin".into(), " user ".into(), "mod".into()] }]
        );
    }

    #[test]
    fn regex_keeps_commas() {
        let rule = norm(vec![r"regex:/^\d{2,4}$/"], "code");
        assert_eq!(rule.constraints, [Constraint::Regex { pattern: r"/^\d{2,4}$/".into() }]);
    }

    #[test]
    fn confirmed_names_companion_field() {
        let rule = norm("confirmed", "password");
        assert_eq!(
            rule.constraints,
            [Constraint::Confirmed { field: "password_confirmation".into() }]
        );
    }

    #[test]
    fn unique_and_exists_carry_metadata() {
        let rule = norm("unique:users|exists:teams,slug", "x");
        assert_eq!(
            rule.constraints,
            [
                Constraint::Unique { table: Some("users".into()), column: None },
                Constraint::Exists { table: Some("teams".into()), column: Some("slug".into()) },
            ]
        );
    }

    #[test]
    fn rule_objects_normalize_like_text() {
        let spec = RuleSpec::List(vec![
            RuleAtom::from("required"),
            RuleAtom::object(Unique::new("users").column("email").ignore("7", "id")),
        ]);
        let rule = norm(spec, "email");
        assert_eq!(
            rule.constraints,
            [Constraint::Unique { table: Some("users".into()), column: Some("email".into()) }]
        );
    }

    #[test]
    fn file_rules() {
        let rule = norm("nullable|file|image|mimes:jpg,png|max:2048", "avatar");
        assert_eq!(rule.base_type, BaseType::File);
        assert_eq!(
            rule.constraints,
            [
                Constraint::Image,
                Constraint::Mimes { types: vec!["jpg".into(), "png".into()] },
                Constraint::Max { value: 2048 },
            ]
        );
    }

    #[test]
    fn image_does_not_change_type() {
        assert_eq!(norm("array|image", "x").base_type, BaseType::Array);
    }

    #[test]
    fn email_and_url_force_string() {
        let rule = norm("integer|email", "x");
        assert_eq!(rule.base_type, BaseType::String);
        assert_eq!(rule.constraints, [Constraint::Email]);
        assert_eq!(norm("url", "x").constraints, [Constraint::Url]);
    }

    #[test]
    fn dates_are_kept_raw() {
        let rule = norm("date|after:today|before:2030-01-01", "d");
        assert_eq!(rule.base_type, BaseType::Date);
        assert_eq!(
            rule.constraints,
            [
                Constraint::After { date: "today".into() },
                Constraint::Before { date: "2030-01-01".into() },
            ]
        );
    }

    #[test]
    fn malformed_numbers_drop_the_constraint() {
        assert!(norm("min:abc", "x").constraints.is_empty());
        assert!(norm("max", "x").constraints.is_empty());
        assert!(norm("size:", "x").constraints.is_empty());
        assert_eq!(norm("between:5", "x").constraints, [Constraint::Min { value: 5 }]);
        assert_eq!(norm("min: 2.9 ", "x").constraints, [Constraint::Min { value: 2 }]);
    }

    #[test]
    fn null_column_placeholder_is_dropped() {
        let spec = RuleSpec::List(vec![RuleAtom::object(Unique::new("users").ignore("5", "id"))]);
        assert_eq!(
            norm(spec, "email").constraints,
            [Constraint::Unique { table: Some("users".into()), column: None }]
        );
        assert_eq!(
            norm("exists:roles,NULL", "role").constraints,
            [Constraint::Exists { table: Some("roles".into()), column: None }]
        );
    }

    #[test]
    fn unknown_rules_are_ignored() {
        let rule = norm("required|accepted|sometimes|dimensions:min_width=100|string", "x");
        assert!(rule.required);
        assert!(rule.constraints.is_empty());
    }

    #[test]
    fn rule_set_preserves_declaration_order() {
        let raw = RawRuleSet::new()
            .with("name", "required|string")
            .with("age", "integer")
            .with("bio", vec!["nullable"]);
        let set = normalize_rule_set(&raw);
        let names: Vec<_> = set.field_names().collect();
        assert_eq!(names, ["name", "age", "bio"]);
        assert_eq!(set, RuleSet::from_raw(&raw));
    }
}
