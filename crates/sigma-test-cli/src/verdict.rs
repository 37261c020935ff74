//! Scoring a rule against its test cases.

use std::fmt;

use serde_json::{Map, Value};
use sigma_test_eval::{Config, PlaceholderExpander, RuleEvaluator};
use sigma_test_parser::SigmaRule;

use crate::testcase::TestCase;

/// Outcome for one rule file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// No test cases to run.
    Skip,
    /// Configs were loaded but none covers the rule's log source.
    Error,
    /// One message per test case whose outcome differed from its expectation.
    Fail(Vec<String>),
    /// Every test case met its expectation.
    Pass,
}

impl Verdict {
    pub fn tag(&self) -> &'static str {
        match self {
            Verdict::Skip => "SKIP",
            Verdict::Error => "ERROR: No relevant logsource configurations",
            Verdict::Fail(_) => "FAIL",
            Verdict::Pass => "PASS",
        }
    }

    pub fn failures(&self) -> &[String] {
        match self {
            Verdict::Fail(failures) => failures,
            _ => &[],
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Pass | Verdict::Skip)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Run every test case against `rule` compiled with the `relevant` configs.
///
/// `loaded` is the number of configs loaded for the run; when it is zero the
/// rule is evaluated without field mappings. Evaluator errors score as a
/// non-match.
pub fn evaluate(
    rule: &SigmaRule,
    loaded: usize,
    relevant: &[&Config],
    cases: &[TestCase],
    expander: &dyn PlaceholderExpander,
) -> Verdict {
    if cases.is_empty() {
        return Verdict::Skip;
    }
    if loaded > 0 && relevant.is_empty() {
        return Verdict::Error;
    }

    let evaluator = match RuleEvaluator::with_expander(rule, relevant, expander) {
        Ok(evaluator) => Some(evaluator),
        Err(e) => {
            log::debug!("rule '{}' failed to compile: {e}", rule.title);
            None
        }
    };

    let mut failures = Vec::new();
    for case in cases {
        let event = case.event.clone().unwrap_or_default();
        let rendered = render_event(&event);
        let event = Value::Object(event);

        let matched = match evaluator.as_ref().map(|ev| ev.matches(&event)) {
            Some(Ok(result)) => result.matched,
            Some(Err(e)) => {
                log::debug!("rule '{}' failed on {rendered}: {e}", rule.title);
                false
            }
            None => false,
        };

        match (case.should_match(), matched) {
            (true, false) => failures.push(format!("{rendered} should have matched")),
            (false, true) => failures.push(format!("{rendered} shouldn't have matched")),
            _ => {}
        }
    }

    if failures.is_empty() {
        Verdict::Pass
    } else {
        Verdict::Fail(failures)
    }
}

/// Render an event as a YAML flow mapping with sorted keys.
pub fn render_event(event: &Map<String, Value>) -> String {
    let mut out = String::new();
    render_map(event, &mut out);
    out
}

fn render_map(map: &Map<String, Value>, out: &mut String) {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    out.push('{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        render_str(key, out);
        out.push_str(": ");
        render_value(value, out);
    }
    out.push('}');
}

fn render_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => render_str(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                render_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => render_map(map, out),
    }
}

fn render_str(s: &str, out: &mut String) {
    if needs_quotes(s) {
        out.push_str(&Value::String(s.to_string()).to_string());
    } else {
        out.push_str(s);
    }
}

/// Strings a YAML reader would not read back as the same plain scalar.
fn needs_quotes(s: &str) -> bool {
    const INDICATORS: &[char] = &[
        ',', ':', '{', '}', '[', ']', '#', '&', '*', '!', '|', '>', '\'', '"', '%', '@', '`',
    ];
    s.is_empty()
        || s.trim() != s
        || s.contains(INDICATORS)
        || s.starts_with(['-', '?'])
        || s.chars().any(char::is_control)
        || matches!(
            s.to_ascii_lowercase().as_str(),
            "true" | "false" | "null" | "~" | "yes" | "no"
        )
        || s.parse::<f64>().is_ok()
}
