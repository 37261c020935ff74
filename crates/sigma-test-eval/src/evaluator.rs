//! A single rule bound to its configs, ready to be matched against events.

use serde_json::Value;
use sigma_test_parser::SigmaRule;

use crate::compiler::{CompileContext, CompiledRule, compile_rule, evaluate_rule};
use crate::config::Config;
use crate::error::Result;
use crate::event::Event;
use crate::result::MatchResult;

/// Supplies values for `|expand` placeholders that no config defines.
pub trait PlaceholderExpander {
    fn expand(&self, name: &str) -> Vec<String>;
}

/// Expander that knows no placeholders; `|expand` items relying on it never
/// match.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPlaceholders;

impl PlaceholderExpander for NoPlaceholders {
    fn expand(&self, _name: &str) -> Vec<String> {
        Vec::new()
    }
}

impl<F> PlaceholderExpander for F
where
    F: Fn(&str) -> Vec<String>,
{
    fn expand(&self, name: &str) -> Vec<String> {
        self(name)
    }
}

/// A compiled rule plus the configs it was compiled against.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use sigma_test_eval::RuleEvaluator;
/// use sigma_test_parser::parse_rule;
///
/// let rule = parse_rule(r#"
/// detection:
///     selection:
///         dst_port: 22
///     condition: selection
/// "#).unwrap();
/// let evaluator = RuleEvaluator::new(&rule, &[]).unwrap();
/// assert!(evaluator.matches(&json!({"dst_port": 22})).unwrap().matched);
/// assert!(!evaluator.matches(&json!({"dst_port": 80})).unwrap().matched);
/// ```
#[derive(Debug, Clone)]
pub struct RuleEvaluator {
    compiled: CompiledRule,
}

impl RuleEvaluator {
    /// Compile `rule` against `configs` with no placeholder fallback.
    pub fn new(rule: &SigmaRule, configs: &[&Config]) -> Result<Self> {
        Self::with_expander(rule, configs, &NoPlaceholders)
    }

    /// Compile `rule` against `configs`, asking `expander` for placeholders
    /// the configs do not define.
    pub fn with_expander(
        rule: &SigmaRule,
        configs: &[&Config],
        expander: &dyn PlaceholderExpander,
    ) -> Result<Self> {
        let cc = CompileContext::new(configs, expander);
        let compiled = compile_rule(rule, &cc)?;
        log::debug!(
            "compiled rule '{}' ({}) against {} config(s)",
            compiled.title,
            compiled.logsource,
            configs.len()
        );
        Ok(RuleEvaluator { compiled })
    }

    /// Evaluate the rule against one event, which must be a JSON object.
    pub fn matches(&self, event: &Value) -> Result<MatchResult> {
        let event = Event::from_value(event)?;
        Ok(evaluate_rule(&self.compiled, &event))
    }

    pub fn compiled(&self) -> &CompiledRule {
        &self.compiled
    }
}
