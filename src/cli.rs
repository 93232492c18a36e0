//! CLI: rule files → (wire IR | TypeScript | record checks)
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;

use crate::error::Error;
use crate::grammar::RawRuleSet;
use crate::ir::RuleSet;
use crate::schema::SchemaCompiler;
use crate::source::{validation_action, ValidationPayload};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// translate server-side validation rules into a client schema and a TypeScript declaration
#[derive(Parser, Debug)]
#[command(name = "rule-shape", version)]
pub struct CommandLineInterface {
    /// debug-level logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// print the normalized rule IR (the wire payload) as JSON
    Ir(IrOut),
    /// print the TypeScript interface for the rules
    Types(TypesOut),
    /// validate data records against the rules
    Check(CheckOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// JSON Pointer to select the rule object in each document (e.g. /forms/store)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document; every output is one rule object
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more rule files. May be literal paths or quoted glob patterns.
    /// Later files add fields or replace same-named ones.
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct IrOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// wrap the IR in the page payload for this action (create, edit, store, ...)
    #[arg(long)]
    action: Option<String>,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct TypesOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// interface name
    #[arg(long, default_value = crate::codegen::DEFAULT_DECLARATION_NAME)]
    name: String,

    /// output .ts file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct CheckOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// data files (paths or quoted globs); each holds one record or an array of records
    #[arg(long, short, num_args = 1.., required = true)]
    data: Vec<String>,

    /// treat data files as newline-delimited JSON, one record per line
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// reference date for `today`/`tomorrow`/`yesterday` (YYYY-MM-DD)
    #[arg(long)]
    today: Option<chrono::NaiveDate>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    /// Load every input, select with pointer/jq, and merge into one rule set.
    fn load_rules(&self) -> anyhow::Result<RuleSet> {
        let mut rule_set = RuleSet::new();
        for source_path in resolve_file_path_patterns(&self.input)? {
            let document = read_json(&source_path)?;
            let document = match self.json_pointer.as_deref() {
                None => document,
                Some(pointer) => document.pointer(pointer).cloned().ok_or_else(|| Error::MissingPointer {
                    pointer: pointer.to_string(),
                    origin: source_path.clone(),
                })?,
            };
            let documents = match self.jq_expr.as_deref() {
                None => vec![document],
                Some(jq_expr) => crate::jq_exec::run_jaq(jq_expr, &document).with_context(|| {
                    format!("failed to apply jq expression to {}", source_path.display())
                })?,
            };
            for document in documents {
                let raw = RawRuleSet::from_json(document);
                rule_set.extend(RuleSet::from_raw(&raw));
            }
            tracing::debug!(path = %source_path.display(), fields = rule_set.len(), "rules loaded");
        }
        Ok(rule_set)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    /// Returns `false` when a `check` found invalid records.
    pub fn run(&self) -> anyhow::Result<bool> {
        match &self.cmd {
            Command::Ir(target) => {
                let rule_set = target.input_settings.load_rules()?;
                let value = match target.action.as_deref() {
                    None => serde_json::to_value(&rule_set)?,
                    Some(action) => match validation_action(action) {
                        Some(method) => serde_json::to_value(ValidationPayload::new(rule_set, method, action))?,
                        None => {
                            tracing::info!(action, "action needs no validation");
                            Value::Null
                        }
                    },
                };
                write_output(target.out.as_deref(), &serde_json::to_string_pretty(&value)?)?;
                Ok(true)
            }
            Command::Types(target) => {
                let rule_set = target.input_settings.load_rules()?;
                let ts_src = crate::codegen::emit(&rule_set, &target.name);
                write_output(target.out.as_deref(), &ts_src)?;
                Ok(true)
            }
            Command::Check(target) => {
                let rule_set = target.input_settings.load_rules()?;
                let compiler = match target.today {
                    Some(today) => SchemaCompiler::new().with_today(today),
                    None => SchemaCompiler::new(),
                };
                let schema = compiler.compile(&rule_set);
                for issue in schema.issues() {
                    eprintln!("{} {issue}", "warning:".yellow().bold());
                }

                let mut all_ok = true;
                for data_path in resolve_file_path_patterns(&target.data)? {
                    for (index, record) in load_records(&data_path, target.ndjson)?.iter().enumerate() {
                        let outcome = schema.validate_value(record);
                        let label = format!("{}#{index}", data_path.display());
                        if outcome.ok {
                            println!("{} {label}", "✔".green());
                        } else {
                            all_ok = false;
                            println!("{} {label}", "✘".red());
                            for (field, message) in &outcome.errors {
                                println!("    {}: {message}", field.as_str().bold());
                            }
                        }
                    }
                }
                Ok(all_ok)
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let source = std::fs::read_to_string(path).map_err(|error| Error::Read { path: path.to_path_buf(), error })?;
    let value = crate::path_de::from_str_with_path::<Value>(&source)
        .with_context(|| format!("failed to parse JSON source file ({})", path.display()))?;
    Ok(value)
}

fn load_records(path: &Path, ndjson: bool) -> anyhow::Result<Vec<Value>> {
    if !ndjson {
        return Ok(match read_json(path)? {
            Value::Array(records) => records,
            record => vec![record],
        });
    }
    let source = std::fs::read_to_string(path).map_err(|error| Error::Read { path: path.to_path_buf(), error })?;
    source
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            crate::path_de::from_str_with_path::<Value>(line)
                .with_context(|| format!("{}:{}", path.display(), number + 1))
        })
        .collect()
}

fn write_output(out: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(out, text).with_context(|| format!("failed to write {}", out.display()))?;
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>, Error>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let before = out.len();
            for entry in glob::glob(pattern)? {
                out.push(entry?);
            }
            if out.len() == before {
                return Err(Error::NoMatch(pattern.to_string()));
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
