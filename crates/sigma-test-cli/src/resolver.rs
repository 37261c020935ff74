//! Selecting the configs whose log source definitions cover a rule.

use sigma_test_eval::{Config, LogsourceMapping};
use sigma_test_parser::LogSource;

/// Configs with at least one log source definition matching the rule's
/// product and category, in input order. Service is not compared.
pub fn relevant_configs<'a>(rule: &LogSource, configs: &'a [Config]) -> Vec<&'a Config> {
    configs
        .iter()
        .filter(|config| config.logsources.iter().any(|def| covers(def, rule)))
        .collect()
}

fn covers(def: &LogsourceMapping, rule: &LogSource) -> bool {
    let product =
        def.logsource.product == rule.product || def.rewrite.product == rule.product;
    let category =
        def.logsource.category == rule.category || def.rewrite.category == rule.category;
    product && category
}
