//! Error types and handling
//!
//! Common error types used across the bridge.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bridge-wide error type
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to create encoder: {0}")]
    EncoderCreation(String),

    #[error("Failed to create output: {0}")]
    OutputCreation(String),

    #[error("Failed to create service: {0}")]
    ServiceCreation(String),

    #[error("Failed to start output: {0}")]
    OutputStart(String),

    #[error("Video reset failed with engine code {0}")]
    VideoReset(i32),

    #[error("No free file name found for {0}")]
    FilenameExhausted(String),
}

/// Error response sent back over the transport
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<BridgeError> for ErrorResponse {
    fn from(error: BridgeError) -> Self {
        let code = match &error {
            BridgeError::Io(_) => "IO_ERROR",
            BridgeError::Serialization(_) => "SERIALIZATION_ERROR",
            BridgeError::Config(_) => "CONFIG_ERROR",
            BridgeError::EncoderCreation(_) => "ENCODER_ERROR",
            BridgeError::OutputCreation(_) => "OUTPUT_ERROR",
            BridgeError::ServiceCreation(_) => "SERVICE_ERROR",
            BridgeError::OutputStart(_) => "START_ERROR",
            BridgeError::VideoReset(_) => "VIDEO_RESET_ERROR",
            BridgeError::FilenameExhausted(_) => "FILENAME_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using BridgeError
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_code() {
        let response = ErrorResponse::from(BridgeError::VideoReset(-2));
        assert_eq!(response.code, "VIDEO_RESET_ERROR");
        assert!(response.message.contains("-2"));
    }
}
