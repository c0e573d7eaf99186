use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("document context is missing required field `{0}`")]
    MissingField(&'static str),
}

/// Runtime failures inside confidence computation. The engine turns these into
/// a fallback report; they never reach callers of `compute_confidence`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfidenceError {
    #[error("non-finite value in {0}")]
    NonFinite(String),
    #[error(transparent)]
    Context(#[from] ContextError),
}

pub type Result<T> = std::result::Result<T, ConfidenceError>;

pub(crate) fn ensure_finite(field: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfidenceError::NonFinite(field.to_string()))
    }
}
