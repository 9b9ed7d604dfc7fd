//! Queue execution.
//!
//! - [`Orchestrator`] drains queued entries through the backend
//! - [`CancelToken`] carries cooperative cancellation into a run
//! - [`spawn_named`] runs background work on a named, logged thread

pub mod cancel;
pub mod orchestrator;
pub mod task;

pub use cancel::CancelToken;
pub use orchestrator::{
    Orchestrator, QueueEvent, RunOutcome, RunReport, RunState, StepFailure, StopOutcome,
};
pub use task::spawn_named;
