//! Error types for pipequeue operations.
//!
//! This module defines [`PipequeueError`], the primary error type used
//! throughout the engine, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - The merger, evaluator and request builder degrade to safe defaults
//!   and log instead of returning errors for bad input
//! - Only the session manager and the orchestrator surface user-visible
//!   failures
//! - Use `anyhow::Error` (via `PipequeueError::Other`) for unexpected errors

use thiserror::Error;

/// Core error type for pipequeue operations.
#[derive(Debug, Error)]
pub enum PipequeueError {
    /// No target is selected or the backend is not marked connected.
    #[error("Not connected to a {target}; select a target before starting")]
    NotConnected { target: String },

    /// The resource bundle is invalid or missing.
    #[error("Failed to load resources: {message}")]
    ResourceLoad { message: String },

    /// Connecting to the automation target failed.
    #[error("Failed to connect to {target}: {message}")]
    ControllerInit { target: String, message: String },

    /// One backend step did not succeed.
    #[error("Task '{task}' failed: {message}")]
    StepFailed { task: String, message: String },

    /// A frame could not be captured from the target.
    #[error("Screen capture failed: {message}")]
    Capture { message: String },

    /// The in-flight backend step could not be aborted.
    #[error("Failed to abort the running task")]
    AbortFailed,

    /// The orchestrator is not idle.
    #[error("Engine is busy ({state}); wait for the current run to finish")]
    Busy { state: String },

    /// A persisted blob could not be parsed.
    #[error("Failed to parse '{name}': {message}")]
    ConfigParse { name: String, message: String },

    /// The same task is defined by two catalog sources.
    #[error("Task '{name}' is defined in both '{first}' and '{second}'")]
    DuplicateTask {
        name: String,
        first: String,
        second: String,
    },

    /// A referenced task or interface item does not exist.
    #[error("Unknown task: {name}")]
    UnknownTask { name: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for pipequeue operations.
pub type Result<T> = std::result::Result<T, PipequeueError>;
