//! Error kinds surfaced by the exam-result engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad request parameters or an unresolvable reference in input data.
    #[error("{0}")]
    Validation(String),

    /// An id that does not (or no longer) exists.
    #[error("{0}")]
    NotFound(String),

    /// The request contradicts stored state (e.g. editing subjects of an exam with results).
    #[error("{0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("stored data is not valid json: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The coaching collaborator failed; the message is shown to the user verbatim.
    #[error("{0}")]
    ExternalService(String),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "bad_params",
            EngineError::NotFound(_) => "not_found",
            EngineError::Conflict(_) => "conflict",
            EngineError::Storage(_) | EngineError::Serialization(_) => "db_query_failed",
            EngineError::ExternalService(_) => "external_service_failed",
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
