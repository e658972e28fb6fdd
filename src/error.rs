//! Error types for the verification harness
//!
//! This module provides the error hierarchy using `thiserror`, split by
//! component so that scenario code can tell a recoverable wait timeout apart
//! from a fatal engine failure.

use thiserror::Error;

/// The main error type for harness operations
#[derive(Error, Debug)]
pub enum Error {
    /// Browser session lifecycle errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Navigation errors
    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    /// Condition wait errors
    #[error("Wait error: {0}")]
    Wait(#[from] WaitError),

    /// Capture errors (screenshots, log sinks)
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// ChromiumOxide errors
    #[error("CDP error: {0}")]
    Cdp(String),
}

/// Browser session lifecycle errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// Failed to launch the browser. Fatal: indicates environment
    /// misconfiguration, never retried.
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    /// Session configuration error
    #[error("Invalid session configuration: {0}")]
    ConfigError(String),

    /// Failed to create the scenario page
    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),

    /// Session already released
    #[error("Session already released")]
    Released,
}

/// Navigation errors
#[derive(Error, Debug)]
pub enum NavigationError {
    /// Invalid navigation target
    #[error("Invalid navigation target: {0}")]
    InvalidTarget(String),

    /// Navigation timeout
    #[error("Navigation timed out after {0}ms")]
    Timeout(u64),

    /// Page load failed
    #[error("Page load failed: {0}")]
    LoadFailed(String),
}

/// Condition wait errors
#[derive(Error, Debug)]
pub enum WaitError {
    /// The condition never became true within the bound. Terminal for that
    /// condition; recoverable at the scenario level.
    #[error("Timed out after {timeout_ms}ms waiting for {condition}")]
    Timeout {
        /// Description of the condition that was being waited on
        condition: String,
        /// The timeout bound in milliseconds
        timeout_ms: u64,
    },
}

/// Capture errors (screenshots, log sinks, summaries)
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Screenshot failed
    #[error("Screenshot capture failed: {0}")]
    ScreenshotFailed(String),

    /// Failed to attach the console/error log sink
    #[error("Log sink attach failed: {0}")]
    SinkFailed(String),

    /// Failed to write an artifact to disk
    #[error("Failed to write artifact {path}: {message}")]
    WriteFailed {
        /// Destination path of the artifact
        path: String,
        /// Underlying failure
        message: String,
    },
}

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a CDP error from a string
    pub fn cdp<S: Into<String>>(msg: S) -> Self {
        Error::Cdp(msg.into())
    }

    /// Whether this error is a condition-wait timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Wait(WaitError::Timeout { .. }))
    }
}

/// Convert chromiumoxide errors
impl From<chromiumoxide::error::CdpError> for Error {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Error::Cdp(err.to_string())
    }
}
