// src/error.rs
//! Typed outcomes of the engine contract calls. None of these is fatal to the
//! hosting process; the HTTP layer maps them to status codes.

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The observation source could not be read.
    #[error("observation source unavailable: {0}")]
    Configuration(String),

    /// Synthesis produced zero ratings, so there is nothing to train on.
    #[error("synthesis produced no ratings")]
    EmptyData,

    /// No snapshot has been published yet.
    #[error("recommendation engine is not ready")]
    NotReady,

    #[error("model training failed: {0}")]
    Training(String),

    /// A refresh failed; the previously published snapshot is still live.
    #[error("refresh failed, previous state retained: {0}")]
    RefreshFailed(#[source] Box<EngineError>),
}

impl EngineError {
    /// Unwraps a `RefreshFailed` to its cause.
    pub fn root(&self) -> &EngineError {
        match self {
            EngineError::RefreshFailed(inner) => inner.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_failure_reports_cause() {
        let e = EngineError::RefreshFailed(Box::new(EngineError::EmptyData));
        assert!(matches!(e.root(), EngineError::EmptyData));
        assert_eq!(
            e.to_string(),
            "refresh failed, previous state retained: synthesis produced no ratings"
        );
    }
}
