//! Error types for script-forge operations.
//!
//! Defines the error types for the subsystems that can fail outright:
//! - Dataset storage (JSONL partitions)
//! - LLM API interactions
//! - Candidate generation
//!
//! Gate failures on individual samples are not errors; they are modelled as
//! [`crate::pipeline::Rejection`] values and routed to partitions.

use thiserror::Error;

/// Errors that can occur during dataset storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to create storage directory: {0}")]
    DirectoryCreationFailed(String),

    #[error("Failed to replace '{path}': {reason}")]
    RewriteFailed { path: String, reason: String },
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API base URL: SCRIPT_FORGE_LLM_API_BASE environment variable not set")]
    MissingApiBase,

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },
}

/// Errors raised by a candidate generator.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Generator returned empty output")]
    EmptyOutput,

    #[error("Generator failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_error_wraps_llm_error() {
        let err: GenerationError = LlmError::RateLimited("slow down".to_string()).into();
        assert!(err.to_string().contains("slow down"));
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::RewriteFailed {
            path: "data/accepted.jsonl".to_string(),
            reason: "disk full".to_string(),
        };
        assert!(err.to_string().contains("data/accepted.jsonl"));
        assert!(err.to_string().contains("disk full"));
    }
}
