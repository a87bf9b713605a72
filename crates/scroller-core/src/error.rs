//! Scroller error types

use thiserror::Error;

/// Errors surfaced to the host while creating or driving a scroller
#[derive(Debug, Error)]
pub enum ScrollerError {
    /// Configuration value out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be constructed
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Container rejected an operation
    #[error("container error: {0}")]
    Container(String),

    /// Scheduler task ended abnormally
    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Failure of a single segment request
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network level failure, no response was received
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP {status}")]
    Status { status: u16, body: String },

    /// Generated URL could not be resolved against the base
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl FetchError {
    /// Response body, if the server sent one
    pub fn body(&self) -> Option<&str> {
        match self {
            FetchError::Transport(_) | FetchError::InvalidUrl { .. } => None,
            FetchError::Status { body, .. } => Some(body),
        }
    }

    /// HTTP status, if a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Transport(e) => e.status().map(|s| s.as_u16()),
            FetchError::Status { status, .. } => Some(*status),
            FetchError::InvalidUrl { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScrollerError>;
