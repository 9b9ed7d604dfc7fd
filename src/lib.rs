//! Pipequeue - Task queue engine for screen automation pipelines.
//!
//! Pipequeue turns user-selected tasks into resolved parameter blobs and
//! drives them, one backend step at a time, through an automation backend
//! that owns capture, input and recognition.
//!
//! # Modules
//!
//! - [`backend`] - Automation backend capability and a scripted test double
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Pipeline data model, override merging and counter expressions
//! - [`error`] - Error types and result aliases
//! - [`runner`] - Queue orchestration, cancellation and background tasks
//! - [`session`] - Backend session lifecycle
//! - [`state`] - Persistence of named JSON blobs
//! - [`steps`] - Resolution of interface items into queue entries
//! - [`ui`] - User-facing notifications and spinners
//!
//! # Example
//!
//! ```
//! use pipequeue::config::{CounterTable, ExpressionEvaluator};
//!
//! let counters = CounterTable::new();
//! counters.set("x", 5);
//! let evaluator = ExpressionEvaluator::new(counters.clone());
//!
//! assert_eq!(evaluator.evaluate("round {x++}"), "round 5");
//! assert_eq!(counters.get("x"), Some(6));
//! ```
//!
//! For full runs against the scripted backend, see the integration tests.

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod runner;
pub mod session;
pub mod state;
pub mod steps;
pub mod ui;

pub use error::{PipequeueError, Result};
