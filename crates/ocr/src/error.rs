use extract::LlmError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DrawingError {
    #[error("Unsupported drawing input: {0}")]
    UnsupportedInput(String),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid image data: {0}")]
    InvalidImage(String),

    #[error("Vision model call failed: {0}")]
    Model(#[from] LlmError),

    #[error("Invalid JSON from vision model: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid drawing structure: {0}")]
    Validation(String),
}
