//! The run loop: configs once, then every rule file under every root.

use std::io::Write;
use std::path::{Path, PathBuf};

use sigma_test_eval::{Config, NoPlaceholders};
use sigma_test_parser::{FileType, infer_file_type, parse_rule};

use crate::configs::load_configs;
use crate::error::{Result, RunError};
use crate::report::Reporter;
use crate::resolver::relevant_configs;
use crate::testcase::load_test_cases;
use crate::verdict::{Verdict, evaluate};
use crate::walker::PathWalker;

/// Settings for one run, built once from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub paths: Vec<PathBuf>,
    pub recursive: bool,
    /// Glob selecting backend config files.
    pub config_pattern: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            paths: vec![PathBuf::from(".")],
            recursive: true,
            config_pattern: None,
        }
    }
}

/// Test every rule under `options.paths`, writing the report to `out`.
///
/// Returns whether every rule passed or was skipped. A fatal error stops the
/// run; lines already written stay in `out`.
pub fn run<W: Write>(options: &RunOptions, out: W) -> Result<bool> {
    let configs = load_configs(options.config_pattern.as_deref())?;
    let mut reporter = Reporter::new(out);

    for root in &options.paths {
        for path in PathWalker::new(root, options.recursive) {
            let path = path?;
            if let Some(verdict) = check_file(&path, &configs)? {
                reporter.record(&path, &verdict)?;
            }
        }
    }

    log::info!("checked {} rule file(s)", reporter.recorded());
    Ok(reporter.finish()?)
}

/// Verdict for one walked file, or `None` when it is not a rule.
fn check_file(path: &Path, configs: &[Config]) -> Result<Option<Verdict>> {
    let content = std::fs::read_to_string(path).map_err(|source| RunError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    match infer_file_type(&content) {
        FileType::Rule => {}
        other => {
            log::debug!("skipping {} ({other:?})", path.display());
            return Ok(None);
        }
    }

    let rule = parse_rule(&content).map_err(|source| RunError::ParseRule {
        path: path.to_path_buf(),
        source,
    })?;
    let cases = load_test_cases(path)?;
    let relevant = relevant_configs(&rule.logsource, configs);
    log::debug!(
        "{}: {} test case(s), {} relevant config(s)",
        path.display(),
        cases.len(),
        relevant.len()
    );

    Ok(Some(evaluate(
        &rule,
        configs.len(),
        &relevant,
        &cases,
        &NoPlaceholders,
    )))
}
