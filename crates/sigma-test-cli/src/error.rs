use std::path::PathBuf;

use sigma_test_eval::EvalError;
use sigma_test_parser::SigmaParserError;
use thiserror::Error;

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("{0}: no such file or directory")]
    NotFound(PathBuf),

    #[error("error walking directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("invalid config file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("error matching config files: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("failed to read config file {}: {source}", path.display())]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    ParseConfig { path: PathBuf, source: EvalError },

    #[error("error reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error parsing {}: {source}", path.display())]
    ParseRule {
        path: PathBuf,
        source: SigmaParserError,
    },

    #[error("error decoding test cases {}: {source}", path.display())]
    TestCases {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("error writing report: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RunError>;
