use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhiError {
    #[error("domain error: {0}")]
    Domain(String),

    #[error("coefficient index {index} out of range 1..={len}")]
    Index { index: usize, len: usize },

    #[error("phi_{order} is undefined at a zero argument")]
    ZeroArgument { order: u32 },

    #[error("non-finite value {0} has no extended-precision representation")]
    NonFinite(f64),

    #[error("series did not converge after {0} terms")]
    NoConvergence(usize),

    #[error("shapes {lhs:?} and {rhs:?} do not broadcast")]
    Shape { lhs: Vec<usize>, rhs: Vec<usize> },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<toml::de::Error> for PhiError {
    fn from(e: toml::de::Error) -> Self {
        PhiError::InvalidConfig(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PhiError>;
