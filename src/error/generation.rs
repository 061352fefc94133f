use reqwest::StatusCode;
use thiserror::Error as ThisError;
use yonkoma_schema::GeminiErrorBody;

use super::IsRetryable;
use super::store::StoreError;

#[derive(Debug, ThisError)]
pub enum GenerationError {
    #[error("Gemini API key is not set; save one under `gemini_api_key` first")]
    MissingApiKey,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    /// Upstream returned the structured Gemini error envelope.
    #[error("Gemini error {status}: {}", .body.inner.message)]
    UpstreamMapped {
        status: StatusCode,
        body: GeminiErrorBody,
    },

    /// Upstream error whose body was not the Gemini envelope.
    #[error("Upstream error with status {status}: {body:.200}")]
    UpstreamStatus { status: StatusCode, body: String },

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("No image was generated")]
    NoImage,

    #[error("Invalid upstream response: {0}")]
    InvalidResponse(String),
}

impl GenerationError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GenerationError::UpstreamMapped { status, .. }
            | GenerationError::UpstreamStatus { status, .. } => Some(*status),
            GenerationError::ReqwestError(e) => e.status(),
            _ => None,
        }
    }
}

impl IsRetryable for GenerationError {
    fn is_retryable(&self) -> bool {
        match self {
            GenerationError::ReqwestError(e) => !e.is_builder() && !e.is_decode(),
            GenerationError::UpstreamMapped { status, .. }
            | GenerationError::UpstreamStatus { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }
}
