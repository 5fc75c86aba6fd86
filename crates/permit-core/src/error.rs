//! Error types for the permit pipeline

use thiserror::Error;

/// Failure of a single call to an external collaborator
/// (database/storage, PDF service, language model).
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{service} request failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} response could not be decoded: {detail}")]
    Decode {
        service: &'static str,
        detail: String,
    },

    #[error("{service} is unavailable: {detail}")]
    Unavailable {
        service: &'static str,
        detail: String,
    },
}

impl ServiceError {
    pub fn transport(service: &'static str, source: reqwest::Error) -> Self {
        ServiceError::Transport { service, source }
    }

    pub fn decode(service: &'static str, detail: impl Into<String>) -> Self {
        ServiceError::Decode {
            service,
            detail: detail.into(),
        }
    }

    pub fn unavailable(service: &'static str, detail: impl Into<String>) -> Self {
        ServiceError::Unavailable {
            service,
            detail: detail.into(),
        }
    }
}

/// Errors surfaced by [`crate::PermitPipeline`] operations
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("File too large: {size} bytes (maximum {limit} bytes)")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Field {field_id} not found in session {session_id}")]
    FieldNotFound {
        session_id: String,
        field_id: String,
    },

    #[error("Failed to synthesize questionnaire: {0}")]
    Synthesis(String),

    #[error(transparent)]
    Upstream(#[from] ServiceError),
}
