use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// Still loading or failed to load; the client should retry later.
    #[error("AI model is not loaded yet. Please try again in a moment.")]
    ModelNotReady,
    #[error("{0}")]
    InvalidInput(String),
    #[error("Uploaded image is too large: {0}")]
    PayloadTooLarge(String),
    #[error("Failed to analyze image. Error: {0}")]
    InternalError(String),
}
