use axum::http::StatusCode;
use thiserror::Error;

/// Failures of the ingest, analyze and report operations.
///
/// The HTTP status of each variant is part of the API contract.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed request: missing field, unusable URL.
    #[error("{0}")]
    InvalidInput(String),

    /// The requested record, transcript or report input does not exist.
    #[error("{0}")]
    NotFound(String),

    #[error("No captions found for this video.")]
    NoCaptions,

    #[error("LLM client not configured")]
    LlmUnavailable,

    #[error("external service failure: {0:#}")]
    ExternalService(anyhow::Error),

    #[error("model response is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::NoCaptions => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::LlmUnavailable
            | PipelineError::ExternalService(_)
            | PipelineError::Parse(_)
            | PipelineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine readable code for errors callers branch on.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            PipelineError::NoCaptions => Some("NO_CAPTIONS"),
            _ => None,
        }
    }
}
