//! Backend configuration files: field mappings, log source definitions and
//! placeholder values.
//!
//! ```yaml
//! title: Sysmon via ECS
//! order: 20
//! backends:
//!   - github.com/bradleyjkemp/sigma-go
//! fieldmappings:
//!   CommandLine: process.command_line
//!   Image: [process.executable, $.process.image]
//! logsources:
//!   process_creation:
//!     product: windows
//!     category: process_creation
//!     rewrite:
//!       product: ecs
//! placeholders:
//!   admins: [root, Administrator]
//! ```
//!
//! `logsources` may also be a plain list of definitions, and a definition may
//! nest its identity under `logsource:`. Keys not listed above are ignored.

use std::collections::HashMap;
use std::path::Path;

use serde_yaml::Value;
use sigma_test_parser::{LogSource, parse_logsource};

use crate::error::{EvalError, Result};

/// A parsed config document. Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub title: String,
    /// Application order relative to other configs (ascending).
    pub order: i64,
    pub backends: Vec<String>,
    /// Generic field name → backend field names, in document order.
    pub field_mappings: Vec<FieldMapping>,
    /// Log source definitions, in document order.
    pub logsources: Vec<LogsourceMapping>,
    pub placeholders: HashMap<String, Vec<String>>,
}

impl Config {
    /// Whether the config declares the given backend identifier.
    pub fn supports_backend(&self, backend: &str) -> bool {
        self.backends.iter().any(|b| b == backend)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub source: String,
    pub target_names: Vec<String>,
}

/// One entry of a config's `logsources` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogsourceMapping {
    /// Key of the entry when `logsources` is a mapping.
    pub name: Option<String>,
    pub logsource: LogSource,
    /// Identity the log source is rewritten to; all fields absent when the
    /// definition has no `rewrite` block.
    pub rewrite: LogSource,
}

/// Parse a config from a YAML string.
pub fn parse_config(yaml: &str) -> Result<Config> {
    let value: Value = serde_yaml::from_str(yaml)?;
    parse_config_value(&value)
}

/// Read and parse a config file.
pub fn parse_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

fn parse_config_value(value: &Value) -> Result<Config> {
    let obj = value
        .as_mapping()
        .ok_or_else(|| EvalError::InvalidConfig("config YAML must be a mapping".to_string()))?;

    let title = obj
        .get(ykey("title"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let order = obj.get(ykey("order")).and_then(|v| v.as_i64()).unwrap_or(0);

    let backends = match obj.get(ykey("backends")) {
        Some(v) => string_list(v, "backends")?,
        None => Vec::new(),
    };

    let field_mappings = match obj.get(ykey("fieldmappings")) {
        Some(v) => parse_field_mappings(v)?,
        None => Vec::new(),
    };

    let logsources = match obj.get(ykey("logsources")) {
        Some(v) => parse_logsources(v)?,
        None => Vec::new(),
    };

    let placeholders = match obj.get(ykey("placeholders")) {
        Some(v) => parse_placeholders(v)?,
        None => HashMap::new(),
    };

    Ok(Config {
        title,
        order,
        backends,
        field_mappings,
        logsources,
        placeholders,
    })
}

fn parse_field_mappings(value: &Value) -> Result<Vec<FieldMapping>> {
    let Some(m) = value.as_mapping() else {
        return Err(EvalError::InvalidConfig(
            "fieldmappings must be a mapping".to_string(),
        ));
    };

    m.iter()
        .map(|(k, v)| {
            let source = key_str(k, "fieldmappings")?;
            Ok(FieldMapping {
                target_names: string_list(v, &format!("fieldmappings.{source}"))?,
                source,
            })
        })
        .collect()
}

fn parse_logsources(value: &Value) -> Result<Vec<LogsourceMapping>> {
    match value {
        Value::Mapping(m) => m
            .iter()
            .map(|(k, def)| parse_logsource_mapping(Some(key_str(k, "logsources")?), def))
            .collect(),
        Value::Sequence(seq) => seq
            .iter()
            .map(|def| parse_logsource_mapping(None, def))
            .collect(),
        Value::Null => Ok(Vec::new()),
        _ => Err(EvalError::InvalidConfig(
            "logsources must be a mapping or a list".to_string(),
        )),
    }
}

fn parse_logsource_mapping(name: Option<String>, def: &Value) -> Result<LogsourceMapping> {
    let label = name.as_deref().unwrap_or("<unnamed>");
    let Some(obj) = def.as_mapping() else {
        return Err(EvalError::InvalidConfig(format!(
            "logsource definition {label} must be a mapping"
        )));
    };

    let logsource = obj.get(ykey("logsource")).unwrap_or(def);
    let logsource = logsource_of(logsource, label)?;
    let rewrite = match obj.get(ykey("rewrite")) {
        Some(v) => logsource_of(v, label)?,
        None => LogSource::default(),
    };

    Ok(LogsourceMapping {
        name,
        logsource,
        rewrite,
    })
}

fn logsource_of(value: &Value, label: &str) -> Result<LogSource> {
    parse_logsource(value)
        .map_err(|e| EvalError::InvalidConfig(format!("logsource definition {label}: {e}")))
}

fn parse_placeholders(value: &Value) -> Result<HashMap<String, Vec<String>>> {
    let Some(m) = value.as_mapping() else {
        return Err(EvalError::InvalidConfig(
            "placeholders must be a mapping".to_string(),
        ));
    };

    m.iter()
        .map(|(k, v)| {
            let name = key_str(k, "placeholders")?;
            let values = string_list(v, &format!("placeholders.{name}"))?;
            Ok((name, values))
        })
        .collect()
}

// =============================================================================
// YAML Helpers
// =============================================================================

fn ykey(s: &str) -> Value {
    Value::String(s.to_string())
}

fn key_str(k: &Value, section: &str) -> Result<String> {
    k.as_str()
        .map(String::from)
        .ok_or_else(|| EvalError::InvalidConfig(format!("{section} keys must be strings")))
}

/// A scalar or list of scalars, rendered as strings.
fn string_list(value: &Value, what: &str) -> Result<Vec<String>> {
    let scalar = |v: &Value| {
        scalar_string(v).ok_or_else(|| {
            EvalError::InvalidConfig(format!("{what} must hold scalar values, got {v:?}"))
        })
    };
    match value {
        Value::Sequence(seq) => seq.iter().map(scalar).collect(),
        Value::Null => Ok(Vec::new()),
        other => Ok(vec![scalar(other)?]),
    }
}

fn scalar_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
