//! Value helpers shared by the compiled checks: type probes, measures,
//! date parsing, and pattern translation.
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use serde_json::Value;

use crate::ir::BaseType;

static EMAIL: Lazy<regex::Regex> = Lazy::new(|| {
    regex::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@.]+$").expect("static e-mail pattern")
});

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "svg", "webp"];

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Client-side file handle: `{ "name": "a.png", "type": "image/png", "size": 1024 }`.
#[derive(Debug, Clone, Copy)]
pub struct FileRef<'a> {
    pub name: &'a str,
    pub mime: Option<&'a str>,
    pub size_bytes: Option<u64>,
}

impl<'a> FileRef<'a> {
    pub fn from_value(value: &'a Value) -> Option<Self> {
        let obj = value.as_object()?;
        let name = obj.get("name")?.as_str()?;
        Some(Self {
            name,
            mime: obj.get("type").and_then(Value::as_str),
            size_bytes: obj.get("size").and_then(Value::as_u64),
        })
    }

    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    pub fn is_image(&self) -> bool {
        match self.mime {
            Some(mime) => mime.starts_with("image/"),
            None => self
                .extension()
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str())),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PROBES
// ————————————————————————————————————————————————————————————————————————————

pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Base-type check. `Err` carries the failure message.
pub fn check_base(base: BaseType, value: &Value) -> Result<(), String> {
    let ok = match base {
        BaseType::String => value.is_string(),
        BaseType::Number => value.is_number(),
        BaseType::Boolean => value.is_boolean(),
        BaseType::Array => value.is_array(),
        BaseType::File => FileRef::from_value(value).is_some(),
        BaseType::Date => match value.as_str() {
            Some(s) => return parse_date(s).map(|_| ()).ok_or_else(|| "Invalid date".to_string()),
            None => false,
        },
    };
    if ok {
        Ok(())
    } else {
        Err(format!("Expected {}, received {}", base.as_str(), kind_name(value)))
    }
}

/// Size measure used by `min` / `max` / `size`: characters for strings,
/// the value for numbers, items for arrays, kilobytes for files.
pub fn measure(base: BaseType, value: &Value) -> Option<f64> {
    match (base, value) {
        (BaseType::String, Value::String(s)) => Some(s.chars().count() as f64),
        (BaseType::Number, Value::Number(n)) => n.as_f64(),
        (BaseType::Array, Value::Array(xs)) => Some(xs.len() as f64),
        (BaseType::File, v) => FileRef::from_value(v)?.size_bytes.map(|b| b as f64 / 1024.0),
        _ => None,
    }
}

/// Unit phrase for messages; `None` for numbers, which read bare.
pub fn unit(base: BaseType) -> Option<&'static str> {
    match base {
        BaseType::String => Some("characters"),
        BaseType::Array => Some("items"),
        BaseType::File => Some("kilobytes"),
        _ => None,
    }
}

pub fn is_email(s: &str) -> bool {
    EMAIL.is_match(s)
}

pub fn is_url(s: &str) -> bool {
    url::Url::parse(s).is_ok()
}

/// Membership test for `in`: strings compare exactly, numbers and booleans by
/// their JSON text.
pub fn enum_contains(values: &[String], value: &Value) -> bool {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return false,
    };
    values.iter().any(|v| *v == text)
}

// ————————————————————————————————————————————————————————————————————————————
// DATES
// ————————————————————————————————————————————————————————————————————————————

pub fn parse_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Resolve a date rule parameter: a relative keyword or a literal date.
pub fn resolve_date_param(raw: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let midnight = now.date().and_hms_opt(0, 0, 0)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "now" => Some(now),
        "today" => Some(midnight),
        "tomorrow" => Some(midnight + Duration::days(1)),
        "yesterday" => Some(midnight - Duration::days(1)),
        _ => parse_date(raw),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PATTERNS
// ————————————————————————————————————————————————————————————————————————————

/// Translate a delimited server pattern (`/^a+$/i`) into `regex` syntax
/// (`(?i)^a+$`). Undelimited input is returned unchanged.
pub fn translate_pattern(raw: &str) -> String {
    let mut chars = raw.chars();
    let Some(delim) = chars.next() else {
        return String::new();
    };
    if !"/#~!@%".contains(delim) {
        return raw.to_string();
    }
    let Some(end) = raw.rfind(delim).filter(|&end| end > 0) else {
        return raw.to_string();
    };
    let body = &raw[delim.len_utf8()..end];
    let modifiers = &raw[end + delim.len_utf8()..];
    if !modifiers.chars().all(|c| c.is_ascii_alphabetic()) {
        return raw.to_string();
    }
    let flags: String = modifiers.chars().filter(|c| "imsx".contains(*c)).collect();
    if flags.is_empty() {
        body.to_string()
    } else {
        format!("(?{flags}){body}")
    }
}
