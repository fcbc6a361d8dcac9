//! Remote AI services.

pub mod gemini;

use thiserror::Error;

pub use gemini::GeminiClient;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Gemini API key is not configured (set GEMINI_API_KEY or api_key in config)")]
    MissingApiKey,
    #[error("service quota exceeded")]
    QuotaExceeded,
    #[error("service rejected request ({status}): {body}")]
    Status { status: u16, body: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service returned no usable content")]
    EmptyResponse,
    #[error("invalid response payload: {0}")]
    InvalidResponse(#[from] serde_json::Error),
    #[error("invalid audio payload: {0}")]
    InvalidAudio(#[from] base64::DecodeError),
}

impl ServiceError {
    /// Quota exhaustion gets its own user-facing banner.
    pub fn is_quota(&self) -> bool {
        matches!(self, ServiceError::QuotaExceeded)
            || matches!(self, ServiceError::Status { status: 429, .. })
    }
}
