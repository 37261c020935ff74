//! # sigma-test-eval
//!
//! Evaluates Sigma detection rules against JSON events, with backend configs
//! supplying field mappings and placeholder values.
//!
//! Rules are compiled once into matchers ([`compile_rule`]) and then matched
//! against any number of events. [`RuleEvaluator`] wraps both steps:
//!
//! ```rust
//! use serde_json::json;
//! use sigma_test_eval::{RuleEvaluator, parse_config};
//! use sigma_test_parser::parse_rule;
//!
//! let rule = parse_rule(r#"
//! title: Detect Whoami
//! logsource:
//!     product: windows
//!     category: process_creation
//! detection:
//!     selection:
//!         CommandLine|contains: 'whoami'
//!     condition: selection
//! "#).unwrap();
//!
//! let config = parse_config(r#"
//! backends: [github.com/bradleyjkemp/sigma-go]
//! fieldmappings:
//!     CommandLine: process.command_line
//! "#).unwrap();
//!
//! let evaluator = RuleEvaluator::new(&rule, &[&config]).unwrap();
//! let result = evaluator
//!     .matches(&json!({"process": {"command_line": "cmd /c whoami"}}))
//!     .unwrap();
//! assert!(result.matched);
//! ```

pub mod compiler;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod event;
pub mod matcher;
pub mod result;

pub use compiler::{
    CompileContext, CompiledDetection, CompiledDetectionItem, CompiledRule, compile_rule,
    evaluate_rule,
};
pub use config::{Config, FieldMapping, LogsourceMapping, parse_config, parse_config_file};
pub use error::{EvalError, Result};
pub use evaluator::{NoPlaceholders, PlaceholderExpander, RuleEvaluator};
pub use event::Event;
pub use matcher::CompiledMatcher;
pub use result::MatchResult;
