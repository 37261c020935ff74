//! # sigma-test-parser
//!
//! Parses Sigma detection rules into a strongly-typed AST.
//!
//! - **Detection rules**: field matching, wildcards, boolean conditions, field modifiers
//! - **Condition expressions**: `and`, `or`, `not`, `1 of`, `all of`, parenthesized groups
//! - **File classification**: tells rules apart from config files and test companions
//!
//! Condition strings are parsed with a [`pest`] PEG grammar and a Pratt parser
//! (`NOT` > `AND` > `OR`); the surrounding YAML structure goes through `serde_yaml`.
//!
//! ## Quick Start
//!
//! ```rust
//! use sigma_test_parser::{FileType, infer_file_type, parse_rule};
//!
//! let yaml = r#"
//! title: Detect Whoami
//! logsource:
//!     product: windows
//!     category: process_creation
//! detection:
//!     selection:
//!         CommandLine|contains: 'whoami'
//!     condition: selection
//! level: medium
//! "#;
//!
//! assert_eq!(infer_file_type(yaml), FileType::Rule);
//! let rule = parse_rule(yaml).unwrap();
//! assert_eq!(rule.title, "Detect Whoami");
//! ```

pub mod ast;
pub mod condition;
pub mod error;
pub mod parser;
pub mod value;

pub use ast::{
    ConditionExpr, Detection, DetectionItem, Detections, FieldSpec, FileType, LogSource, Modifier,
    Quantifier, SelectorPattern, SigmaRule,
};
pub use condition::parse_condition;
pub use error::{Result, SigmaParserError};
pub use parser::{infer_file_type, parse_field_spec, parse_logsource, parse_rule, parse_rule_file};
pub use value::{SigmaString, SigmaValue, SpecialChar, StringPart};
