//! Example events stored next to a rule in its `_test` companion file.
//!
//! A companion holds a stream of YAML documents, one test case each:
//!
//! ```yaml
//! event:
//!   dst_port: 22
//! ---
//! match: false
//! event:
//!   dst_port: 443
//! ```

use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Result, RunError};

/// One example event and whether the rule is expected to match it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TestCase {
    #[serde(rename = "match")]
    pub expected: Option<bool>,
    pub event: Option<Map<String, Value>>,
}

impl TestCase {
    /// Expectation, defaulting to a match when the document omits it.
    pub fn should_match(&self) -> bool {
        self.expected.unwrap_or(true)
    }
}

/// `rules/ssh.yaml` → `rules/ssh_test.yaml`.
pub fn companion_path(rule_path: &Path) -> PathBuf {
    let stem = rule_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match rule_path.extension() {
        Some(ext) => format!("{stem}_test.{}", ext.to_string_lossy()),
        None => format!("{stem}_test"),
    };
    rule_path.with_file_name(name)
}

/// Load the test cases for a rule. A missing companion file yields none.
pub fn load_test_cases(rule_path: &Path) -> Result<Vec<TestCase>> {
    let path = companion_path(rule_path);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::debug!("no test file for {}", rule_path.display());
            return Ok(Vec::new());
        }
        Err(source) => return Err(RunError::Read { path, source }),
    };
    parse_test_cases(&content).map_err(|source| RunError::TestCases { path, source })
}

/// Decode a multi-document test stream.
///
/// A final document without an `event` is the artifact of a trailing `---`
/// and is dropped.
pub fn parse_test_cases(content: &str) -> std::result::Result<Vec<TestCase>, serde_yaml::Error> {
    let mut cases = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        let value = serde_yaml::Value::deserialize(document)?;
        let case = match value {
            serde_yaml::Value::Null => TestCase::default(),
            other => serde_yaml::from_value(other)?,
        };
        cases.push(case);
    }

    if cases.last().is_some_and(|c| c.event.is_none()) {
        cases.pop();
    }
    Ok(cases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(v: Value) -> Option<Map<String, Value>> {
        match v {
            Value::Object(m) => Some(m),
            _ => None,
        }
    }

    #[test]
    fn test_companion_path() {
        assert_eq!(
            companion_path(Path::new("rules/ssh.yaml")),
            PathBuf::from("rules/ssh_test.yaml")
        );
        assert_eq!(
            companion_path(Path::new("a.b.yml")),
            PathBuf::from("a.b_test.yml")
        );
    }

    #[test]
    fn test_parse_stream() {
        let cases = parse_test_cases(
            "event:\n  dst_port: 22\n---\nmatch: false\nevent:\n  dst_port: 443\n",
        )
        .unwrap();
        assert_eq!(
            cases,
            vec![
                TestCase {
                    expected: None,
                    event: event(json!({"dst_port": 22})),
                },
                TestCase {
                    expected: Some(false),
                    event: event(json!({"dst_port": 443})),
                },
            ]
        );
        assert!(cases[0].should_match());
        assert!(!cases[1].should_match());
    }

    #[test]
    fn test_trailing_separator_is_dropped() {
        let cases = parse_test_cases("event:\n  a: 1\n---\n").unwrap();
        assert_eq!(cases.len(), 1);
    }

    #[test]
    fn test_only_last_eventless_record_is_dropped() {
        let cases = parse_test_cases("match: false\n---\nevent:\n  a: 1\n---\nmatch: true\n").unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].event, None);
        assert_eq!(cases[0].expected, Some(false));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let cases = parse_test_cases("note: legacy\nevent: {x: y}\n").unwrap();
        assert_eq!(cases[0].event, event(json!({"x": "y"})));
    }

    #[test]
    fn test_empty_stream() {
        assert!(parse_test_cases("").unwrap().is_empty());
        assert!(parse_test_cases("---\n").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_stream_is_an_error() {
        assert!(parse_test_cases("event: [unclosed\n").is_err());
        assert!(parse_test_cases("match: sometimes\nevent: {}\n").is_err());
        assert!(parse_test_cases("event: just a string\n").is_err());
    }

    #[test]
    fn test_load_missing_companion_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let rule = dir.path().join("rule.yaml");
        std::fs::write(&rule, "title: x\n").unwrap();
        assert!(load_test_cases(&rule).unwrap().is_empty());
    }

    #[test]
    fn test_load_malformed_companion_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let rule = dir.path().join("rule.yaml");
        std::fs::write(dir.path().join("rule_test.yaml"), "event: [\n").unwrap();
        let err = load_test_cases(&rule).unwrap_err();
        assert!(matches!(err, RunError::TestCases { ref path, .. } if path.ends_with("rule_test.yaml")));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn render(cases: &[(Option<bool>, u16)]) -> String {
            cases
                .iter()
                .map(|(expected, port)| {
                    let mut doc = String::new();
                    if let Some(m) = expected {
                        doc.push_str(&format!("match: {m}\n"));
                    }
                    doc.push_str(&format!("event:\n  dst_port: {port}\n"));
                    doc
                })
                .collect::<Vec<_>>()
                .join("---\n")
        }

        proptest! {
            #[test]
            fn trailing_separator_never_changes_cases(
                cases in prop::collection::vec((any::<Option<bool>>(), any::<u16>()), 1..8)
            ) {
                let stream = render(&cases);
                let plain = parse_test_cases(&stream).unwrap();
                let trailing = parse_test_cases(&format!("{stream}---\n")).unwrap();
                prop_assert_eq!(plain.len(), cases.len());
                prop_assert_eq!(plain, trailing);
            }
        }
    }
}
