//! Automation backend capability.
//!
//! The engine treats screen capture, input injection and recognition as an
//! opaque backend. This module defines:
//! - [`AutomationBackend`] trait the engine drives
//! - Opaque handles for loaded resources and connected controllers
//! - [`StepStatus`] and [`ImageBuffer`] results
//! - [`ScriptedBackend`] for tests and dry runs

pub mod mock;

pub use mock::{ScriptedBackend, StepCall};

use std::path::PathBuf;

use thiserror::Error;

use crate::config::schema::TargetConfig;
use crate::runner::cancel::CancelToken;
use crate::session::Session;

/// Errors reported by a backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The resource bundle was rejected.
    #[error("resource bundle rejected: {0}")]
    Resource(String),

    /// The controller could not reach the target.
    #[error("controller connection failed: {0}")]
    Controller(String),

    /// A frame could not be captured.
    #[error("screen capture failed: {0}")]
    Capture(String),
}

/// Result type for backend calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Handle to a loaded resource bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle(pub u64);

/// Handle to a connected controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControllerHandle(pub u64);

/// Outcome of one backend step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// The pipeline ran to completion.
    Succeeded,
    /// The pipeline ran and failed.
    Failed,
    /// The step was aborted before finishing.
    Aborted,
}

impl StepStatus {
    /// Whether the step succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, StepStatus::Succeeded)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepStatus::Succeeded => "succeeded",
            StepStatus::Failed => "failed",
            StepStatus::Aborted => "aborted",
        };
        write!(f, "{}", s)
    }
}

/// An encoded screen frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    /// Encoded image bytes (PNG).
    pub encoded: Vec<u8>,
}

impl ImageBuffer {
    /// Whether the buffer carries no image data.
    pub fn is_empty(&self) -> bool {
        self.encoded.is_empty()
    }
}

/// Capabilities the engine needs from an automation backend.
///
/// Implementations must tolerate `abort` being called from another thread
/// while `run_step` is in flight.
pub trait AutomationBackend: Send + Sync {
    /// Load and validate the resource bundle at `paths`.
    fn load_resources(&self, paths: &[PathBuf]) -> BackendResult<ResourceHandle>;

    /// Connect a controller to `target`.
    fn connect(&self, target: &TargetConfig) -> BackendResult<ControllerHandle>;

    /// Register custom recognitions and actions on a new session.
    fn register_extensions(&self, _session: &Session) -> BackendResult<()> {
        Ok(())
    }

    /// Run one pipeline from `entry` with the serialized parameters.
    ///
    /// Implementations should return early once `cancel` is cancelled.
    fn run_step(
        &self,
        session: &Session,
        entry: &str,
        params: &str,
        cancel: &CancelToken,
    ) -> StepStatus;

    /// Abort whatever step is in flight. Returns whether it stopped.
    fn abort(&self, session: &Session) -> bool;

    /// Capture the current frame from a controller.
    fn capture_frame(&self, controller: ControllerHandle) -> BackendResult<ImageBuffer>;

    /// Release a session's resources. Best effort; may be deferred.
    fn dispose(&self, _session: &Session) {}
}
