//! # sigma-test
//!
//! Checks Sigma rules against example events kept next to them. For a rule
//! `rules/ssh.yaml`, the events live in `rules/ssh_test.yaml`:
//!
//! ```yaml
//! event:
//!   dst_port: 22
//! ---
//! match: false
//! event:
//!   dst_port: 443
//! ```
//!
//! Each rule gets one verdict (`PASS`, `FAIL`, `SKIP` or `ERROR`) written as a
//! tab-separated line. Backend configs selected with a glob supply field
//! mappings; only configs whose log sources cover a rule are applied to it.
//!
//! ```rust,no_run
//! use sigma_test::{RunOptions, run};
//!
//! let options = RunOptions {
//!     paths: vec!["rules".into()],
//!     recursive: true,
//!     config_pattern: Some("configs/*.yml".into()),
//! };
//! let all_passed = run(&options, std::io::stdout().lock()).unwrap();
//! ```

pub mod configs;
pub mod error;
pub mod report;
pub mod resolver;
pub mod runner;
pub mod testcase;
pub mod verdict;
pub mod walker;

pub use configs::{BACKEND_ID, load_configs};
pub use error::{Result, RunError};
pub use report::Reporter;
pub use resolver::relevant_configs;
pub use runner::{RunOptions, run};
pub use testcase::{TestCase, companion_path, load_test_cases, parse_test_cases};
pub use verdict::{Verdict, evaluate, render_event};
pub use walker::PathWalker;
