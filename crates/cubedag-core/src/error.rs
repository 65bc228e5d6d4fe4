use thiserror::Error;

/// Canonical result for core.
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors. All of them surface before any execution starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("unknown measure '{0}'")]
    UnknownMeasure(String),

    #[error("cycle detected through measures: {}", .path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    #[error("unsupported filter shape: {0}")]
    UnsupportedFilterShape(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("hashing error: {0}")]
    Hash(String),

    #[error("internal invariant failed: {0}")]
    Invariant(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Hash(e.to_string())
    }
}
