use cubedag_operators::OpError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlanError>;

/// Build-time failures. They mean the measure configuration (or the query)
/// is wrong; retrying cannot help.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error(transparent)]
    Core(#[from] cubedag_core::Error),

    #[error("operator: {0}")]
    Operator(#[from] OpError),

    #[error("yaml: {0}")]
    Yaml(String),
}

impl From<serde_yaml::Error> for PlanError {
    fn from(e: serde_yaml::Error) -> Self {
        PlanError::Yaml(e.to_string())
    }
}

impl PlanError {
    /// The core error underneath, when there is one.
    pub fn as_core(&self) -> Option<&cubedag_core::Error> {
        match self {
            PlanError::Core(e) => Some(e),
            _ => None,
        }
    }
}
