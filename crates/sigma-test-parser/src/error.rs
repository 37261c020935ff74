use thiserror::Error;

/// Why a rule could not be turned into a [`SigmaRule`](crate::SigmaRule).
#[derive(Debug, Error)]
pub enum SigmaParserError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid condition: {0}")]
    Condition(String),

    #[error("unknown modifier '{0}'")]
    UnknownModifier(String),

    #[error("invalid rule: {0}")]
    InvalidRule(String),

    #[error("rule has no '{0}' section")]
    MissingField(String),

    #[error("invalid detection: {0}")]
    InvalidDetection(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SigmaParserError>;
