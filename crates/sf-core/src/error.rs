use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A state vector did not have the fixed dimension.
    DimensionMismatch { expected: usize, actual: usize },
    InvalidConfig(String),
    Parse(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::DimensionMismatch { expected, actual } => write!(
                f,
                "state vector has {actual} dimensions; expected {expected}"
            ),
            CoreError::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            CoreError::Parse(msg) => write!(f, "parse error: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Parse(e.to_string())
    }
}

impl From<toml::de::Error> for CoreError {
    fn from(e: toml::de::Error) -> Self {
        CoreError::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
