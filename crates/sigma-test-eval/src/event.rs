//! Read-only view of a JSON event with Sigma-style field lookup.
//!
//! Field names resolve flat key first, then by dot-separated traversal, so
//! `process.command_line` finds either `{"process.command_line": ..}` or
//! `{"process": {"command_line": ..}}`. Names mapped by a config to a
//! `$.`-prefixed target are pure paths and skip the flat-key step.

use serde_json::{Map, Value};

use crate::error::{EvalError, Result};

/// Prefix marking a field mapping target as a JSON path rather than a key.
pub const PATH_PREFIX: &str = "$.";

/// A borrowed JSON object under evaluation.
#[derive(Debug, Clone, Copy)]
pub struct Event<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> Event<'a> {
    /// Wrap a JSON value; anything other than an object is rejected.
    pub fn from_value(value: &'a Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Event { fields }),
            other => Err(EvalError::InvalidEvent(kind_of(other).to_string())),
        }
    }

    pub fn from_map(fields: &'a Map<String, Value>) -> Self {
        Event { fields }
    }

    /// Look a field up by name: exact key, then dot-notation traversal.
    ///
    /// When a path segment yields an array, each element is tried and the
    /// first hit wins.
    pub fn get_field(&self, name: &str) -> Option<&'a Value> {
        if let Some(path) = name.strip_prefix(PATH_PREFIX) {
            return self.get_path(path);
        }
        if let Some(v) = self.fields.get(name) {
            return Some(v);
        }
        if name.contains('.') {
            return self.get_path(name);
        }
        None
    }

    fn get_path(&self, path: &str) -> Option<&'a Value> {
        let parts: Vec<&str> = path.split('.').collect();
        let (head, rest) = parts.split_first()?;
        traverse(self.fields.get(*head)?, rest)
    }

    /// Every string value anywhere in the event, for keyword searches.
    pub fn all_string_values(&self) -> Vec<&'a str> {
        let mut values = Vec::new();
        for v in self.fields.values() {
            collect_string_values(v, &mut values);
        }
        values
    }
}

fn traverse<'a>(current: &'a Value, parts: &[&str]) -> Option<&'a Value> {
    let Some((head, rest)) = parts.split_first() else {
        return Some(current);
    };

    match current {
        Value::Object(map) => traverse(map.get(*head)?, rest),
        Value::Array(arr) => arr.iter().find_map(|item| traverse(item, parts)),
        _ => None,
    }
}

fn collect_string_values<'a>(v: &'a Value, out: &mut Vec<&'a str>) {
    match v {
        Value::String(s) => out.push(s.as_str()),
        Value::Object(map) => map.values().for_each(|val| collect_string_values(val, out)),
        Value::Array(arr) => arr.iter().for_each(|val| collect_string_values(val, out)),
        _ => {}
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
