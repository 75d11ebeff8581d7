//! Sidekick Common Error Types
//!
//! Centralized error handling for all Sidekick components

use std::fmt;

/// Main error type for Sidekick operations
#[derive(Debug)]
pub enum SidekickError {
    /// IO-related errors
    Io(std::io::Error),
    /// Serialization/deserialization errors
    Serde(serde_json::Error),
    /// Transport-level HTTP failures (connect, timeout, body read)
    Http(reqwest::Error),
    /// Backend answered with a non-success status
    Status { status: u16, message: String },
    /// Missing or rejected credentials
    Auth(String),
    /// Input rejected before any request was made
    Validation(String),
}

impl fmt::Display for SidekickError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SidekickError::Io(err) => write!(f, "IO error: {}", err),
            SidekickError::Serde(err) => write!(f, "Serialization error: {}", err),
            SidekickError::Http(err) => write!(f, "HTTP error: {}", err),
            SidekickError::Status { status, message } => {
                write!(f, "Backend returned {}: {}", status, message)
            }
            SidekickError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            SidekickError::Validation(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for SidekickError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SidekickError::Io(err) => Some(err),
            SidekickError::Serde(err) => Some(err),
            SidekickError::Http(err) => Some(err),
            _ => None,
        }
    }
}

/// Convenience result type for Sidekick operations
pub type Result<T> = std::result::Result<T, SidekickError>;

// Implement From traits for common error types
impl From<std::io::Error> for SidekickError {
    fn from(err: std::io::Error) -> Self {
        SidekickError::Io(err)
    }
}

impl From<serde_json::Error> for SidekickError {
    fn from(err: serde_json::Error) -> Self {
        SidekickError::Serde(err)
    }
}

impl From<reqwest::Error> for SidekickError {
    fn from(err: reqwest::Error) -> Self {
        SidekickError::Http(err)
    }
}
