//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! # Architecture
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands to their implementations:
//! - `pipequeue plan` resolves tasks into queue entries
//! - `pipequeue eval` evaluates counter placeholders
//! - `pipequeue run` drives the queue against the dry-run backend

pub mod dispatcher;
pub mod eval;
pub mod plan;
pub mod run;

pub use dispatcher::{select_items, Command, CommandDispatcher, CommandResult};
