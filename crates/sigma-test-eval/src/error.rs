use thiserror::Error;

/// Failure to load a config, compile a rule against configs, or accept an
/// event.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("bad regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    #[error("bad CIDR network: {0}")]
    InvalidCidr(#[from] ipnet::AddrParseError),

    /// A condition names a search the detection section does not define.
    #[error("condition references unknown search '{0}'")]
    UnknownDetection(String),

    #[error("modifiers cannot be combined: {0}")]
    InvalidModifiers(String),

    #[error("value does not suit its modifiers: {0}")]
    IncompatibleValue(String),

    /// `gt`/`gte`/`lt`/`lte` with a non-numeric value.
    #[error("not a number: {0}")]
    ExpectedNumeric(String),

    #[error("event must be a JSON object, got {0}")]
    InvalidEvent(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EvalError>;
