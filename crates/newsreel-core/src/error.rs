use thiserror::Error;

/// Application-wide error types for newsreel.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (fetching a page).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Headless browser session failed to start, render, or close.
    #[error("Browser error: {0}")]
    BrowserError(String),

    /// Candidate extraction from fetched markup failed.
    #[error("Extraction error: {0}")]
    ExtractError(String),

    /// Invalid source or selector configuration.
    #[error("Config error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error is transient and a later run may succeed.
    ///
    /// Used only for log severity at the per-source boundary; nothing in
    /// the orchestrator retries within a run.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) => true,
            AppError::HttpError(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("reset")
            }
            AppError::BrowserError(msg) => msg.contains("launch") || msg.contains("timeout"),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(AppError::NetworkError("reset".into()).is_transient());
        assert!(AppError::Timeout(30).is_transient());
        assert!(AppError::HttpError("connect refused".into()).is_transient());
        assert!(!AppError::ConfigError("bad selector".into()).is_transient());
        assert!(!AppError::ExtractError("no container".into()).is_transient());
    }
}
