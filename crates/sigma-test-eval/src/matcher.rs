//! Compiled value matchers.
//!
//! Each `CompiledMatcher` is built once when a rule is compiled. Matching a
//! JSON value is then a plain comparison: string forms are precomputed
//! (lowercased when case-insensitive) and regexes are already compiled.

use std::net::IpAddr;

use ipnet::IpNet;
use regex::Regex;
use serde_json::Value;

use crate::event::Event;

/// How a string matcher compares its needle with the event value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrOp {
    Exact,
    Contains,
    StartsWith,
    EndsWith,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// A pre-compiled matcher for a single value comparison.
#[derive(Debug, Clone)]
pub enum CompiledMatcher {
    /// Plain string comparison. When `case_insensitive`, `value` is stored
    /// lowercased.
    Str {
        op: StrOp,
        value: String,
        case_insensitive: bool,
    },

    /// Compiled regex (wildcards and `|re` values, flags baked in).
    Regex(Regex),

    /// IP address inside a network.
    Cidr(IpNet),

    Numeric { op: NumOp, value: f64 },

    /// Compare against another field of the same event.
    FieldRef {
        field: String,
        case_insensitive: bool,
    },

    /// Matches null and missing values.
    Null,

    Bool(bool),

    /// Any child matches. Empty never matches.
    AnyOf(Vec<CompiledMatcher>),

    /// Every child matches.
    AllOf(Vec<CompiledMatcher>),
}

impl CompiledMatcher {
    /// Build a string matcher, normalising the needle for case-insensitive
    /// comparison.
    pub fn string(op: StrOp, value: &str, case_insensitive: bool) -> Self {
        CompiledMatcher::Str {
            op,
            value: if case_insensitive {
                value.to_lowercase()
            } else {
                value.to_string()
            },
            case_insensitive,
        }
    }

    /// Combine several matchers; a single matcher is returned as is.
    pub fn any_of(mut matchers: Vec<CompiledMatcher>) -> Self {
        if matchers.len() == 1
            && let Some(m) = matchers.pop()
        {
            return m;
        }
        CompiledMatcher::AnyOf(matchers)
    }

    /// Check a JSON value taken from `event`.
    pub fn matches(&self, value: &Value, event: &Event) -> bool {
        match self {
            CompiledMatcher::Str {
                op,
                value: needle,
                case_insensitive,
            } => match_str_value(value, &|s: &str| {
                if *case_insensitive {
                    compare_str(*op, &s.to_lowercase(), needle)
                } else {
                    compare_str(*op, s, needle)
                }
            }),

            CompiledMatcher::Regex(re) => match_str_value(value, &|s: &str| re.is_match(s)),

            CompiledMatcher::Cidr(net) => match_str_value(value, &|s: &str| {
                s.parse::<IpAddr>().is_ok_and(|ip| net.contains(&ip))
            }),

            CompiledMatcher::Numeric { op, value: n } => {
                match_numeric_value(value, &|v: f64| compare_num(*op, v, *n))
            }

            CompiledMatcher::FieldRef {
                field,
                case_insensitive,
            } => {
                let Some(other) = event.get_field(field) else {
                    return false;
                };
                match (scalar_str(value), scalar_str(other)) {
                    (Some(a), Some(b)) if *case_insensitive => a.to_lowercase() == b.to_lowercase(),
                    (Some(a), Some(b)) => a == b,
                    _ => value == other,
                }
            }

            CompiledMatcher::Null => value.is_null(),

            CompiledMatcher::Bool(expected) => match value {
                Value::Bool(b) => b == expected,
                Value::String(s) => match s.to_ascii_lowercase().as_str() {
                    "true" => *expected,
                    "false" => !*expected,
                    _ => false,
                },
                _ => false,
            },

            CompiledMatcher::AnyOf(matchers) => matchers.iter().any(|m| m.matches(value, event)),
            CompiledMatcher::AllOf(matchers) => matchers.iter().all(|m| m.matches(value, event)),
        }
    }

    /// Whether the matcher accepts a field that is absent from the event.
    pub fn matches_missing(&self) -> bool {
        match self {
            CompiledMatcher::Null => true,
            CompiledMatcher::AnyOf(matchers) => matchers.iter().any(Self::matches_missing),
            CompiledMatcher::AllOf(matchers) => {
                !matchers.is_empty() && matchers.iter().all(Self::matches_missing)
            }
            _ => false,
        }
    }

    /// Keyword match: any string value anywhere in the event.
    pub fn matches_keyword(&self, event: &Event) -> bool {
        event.all_string_values().into_iter().any(|s| {
            let v = Value::String(s.to_string());
            self.matches(&v, event)
        })
    }
}

fn compare_str(op: StrOp, haystack: &str, needle: &str) -> bool {
    match op {
        StrOp::Exact => haystack == needle,
        StrOp::Contains => haystack.contains(needle),
        StrOp::StartsWith => haystack.starts_with(needle),
        StrOp::EndsWith => haystack.ends_with(needle),
    }
}

fn compare_num(op: NumOp, actual: f64, expected: f64) -> bool {
    match op {
        NumOp::Eq => (actual - expected).abs() < f64::EPSILON,
        NumOp::Gt => actual > expected,
        NumOp::Gte => actual >= expected,
        NumOp::Lt => actual < expected,
        NumOp::Lte => actual <= expected,
    }
}

/// Apply a string predicate, coercing numbers and booleans to their string
/// form. Arrays match if any element does.
fn match_str_value(value: &Value, pred: &dyn Fn(&str) -> bool) -> bool {
    match value {
        Value::String(s) => pred(s),
        Value::Number(n) => pred(&n.to_string()),
        Value::Bool(b) => pred(if *b { "true" } else { "false" }),
        Value::Array(arr) => arr.iter().any(|v| match_str_value(v, pred)),
        _ => false,
    }
}

/// Apply a numeric predicate; numeric strings are parsed.
fn match_numeric_value(value: &Value, pred: &dyn Fn(f64) -> bool) -> bool {
    match value {
        Value::Number(n) => n.as_f64().is_some_and(pred),
        Value::String(s) => s.trim().parse::<f64>().is_ok_and(pred),
        Value::Array(arr) => arr.iter().any(|v| match_numeric_value(v, pred)),
        _ => false,
    }
}

fn scalar_str(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
