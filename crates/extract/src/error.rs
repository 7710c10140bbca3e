use std::time::Duration;
use thiserror::Error;

/// Failure at the model service boundary.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Model request failed: {0}")]
    Request(String),

    #[error("Model request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Model returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode model response: {0}")]
    Decode(String),

    #[error("Model service unavailable: {0}")]
    Unavailable(String),
}

impl LlmError {
    /// Transport problems, timeouts, throttling and server errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Request(_) | LlmError::Timeout(_) => true,
            LlmError::Status { status, .. } => *status == 429 || *status >= 500,
            LlmError::Decode(_) | LlmError::Unavailable(_) => false,
        }
    }
}

/// Why a key-concept list could not be produced.
#[derive(Error, Debug)]
pub enum KeyConceptError {
    #[error(transparent)]
    Model(#[from] LlmError),

    #[error("Failed to parse key concepts: {0}")]
    Parse(String),

    #[error("Model returned no key concepts")]
    Empty,
}
