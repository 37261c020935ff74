//! Match result types for rule evaluation.

use std::collections::BTreeMap;

use serde::Serialize;

/// The outcome of evaluating a rule against one event.
///
/// `matched` is the verdict. The remaining fields explain it: every named
/// search with its own result, and the result of each condition in the order
/// the rule lists them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    /// Whether any condition of the rule was satisfied.
    pub matched: bool,
    /// Result of every named search, keyed by search name.
    pub search_results: BTreeMap<String, bool>,
    /// Result of each condition expression.
    pub condition_results: Vec<bool>,
}

impl MatchResult {
    /// Names of the searches that matched, in name order.
    pub fn matched_searches(&self) -> impl Iterator<Item = &str> {
        self.search_results
            .iter()
            .filter(|(_, matched)| **matched)
            .map(|(name, _)| name.as_str())
    }
}
