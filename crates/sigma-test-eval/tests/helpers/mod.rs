#![allow(dead_code)]

use serde_json::Value;
use sigma_test_eval::{Config, MatchResult, RuleEvaluator, parse_config};
use sigma_test_parser::parse_rule;

pub fn evaluator(rule_yaml: &str) -> RuleEvaluator {
    evaluator_with_configs(rule_yaml, &[])
}

pub fn evaluator_with_configs(rule_yaml: &str, configs: &[&Config]) -> RuleEvaluator {
    let rule = parse_rule(rule_yaml).unwrap();
    RuleEvaluator::new(&rule, configs).unwrap()
}

pub fn config(yaml: &str) -> Config {
    parse_config(yaml).unwrap()
}

pub fn eval(rule_yaml: &str, event: Value) -> MatchResult {
    evaluator(rule_yaml).matches(&event).unwrap()
}

pub fn is_match(rule_yaml: &str, event: Value) -> bool {
    eval(rule_yaml, event).matched
}
