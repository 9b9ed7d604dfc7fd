//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::args::{Cli, Commands};
use crate::config::schema::{InterfaceDefinition, TaskInterfaceItem};
use crate::error::{PipequeueError, Result};
use crate::ui::Notifier;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
pub trait Command {
    /// Execute the command.
    ///
    /// # Arguments
    ///
    /// * `out` - Where command output (plans, values, summaries) goes
    /// * `notifier` - Status messages for the user
    ///
    /// # Returns
    ///
    /// A [`CommandResult`] indicating success/failure and exit code.
    fn execute(&self, out: &mut dyn Write, notifier: &Arc<dyn Notifier>) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    project_root: PathBuf,
}

impl CommandDispatcher {
    /// Create a new dispatcher for the given project root.
    pub fn new(project_root: PathBuf) -> Self {
        Self { project_root }
    }

    /// Get the project root path.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Dispatch and execute a command.
    pub fn dispatch(
        &self,
        cli: &Cli,
        out: &mut dyn Write,
        notifier: &Arc<dyn Notifier>,
    ) -> Result<CommandResult> {
        match &cli.command {
            Commands::Plan(args) => {
                let cmd = super::plan::PlanCommand::new(&self.project_root, args.clone());
                cmd.execute(out, notifier)
            }
            Commands::Eval(args) => {
                let cmd = super::eval::EvalCommand::new(args.clone());
                cmd.execute(out, notifier)
            }
            Commands::Run(args) => {
                let cmd = super::run::RunCommand::new(&self.project_root, args.clone());
                cmd.execute(out, notifier)
            }
        }
    }
}

/// Pick interface items by name, or the checked ones when `names` is empty.
///
/// # Errors
///
/// Returns `UnknownTask` for a name the interface doesn't define.
pub fn select_items(
    interface: &InterfaceDefinition,
    names: &[String],
) -> Result<Vec<TaskInterfaceItem>> {
    if names.is_empty() {
        return Ok(interface.checked_items().into_iter().cloned().collect());
    }
    names
        .iter()
        .map(|name| {
            interface
                .find_item(name)
                .cloned()
                .ok_or_else(|| PipequeueError::UnknownTask { name: name.clone() })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interface() -> InterfaceDefinition {
        let mut daily = TaskInterfaceItem::new("Daily", "StartUp");
        daily.check = true;
        InterfaceDefinition {
            task: vec![daily, TaskInterfaceItem::new("Weekly", "Weekly")],
            ..Default::default()
        }
    }

    #[test]
    fn command_result_success() {
        let result = CommandResult::success();
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn command_result_failure() {
        let result = CommandResult::failure(1);
        assert!(!result.success);
        assert_eq!(result.exit_code, 1);
    }

    #[test]
    fn dispatcher_creation() {
        let dispatcher = CommandDispatcher::new(PathBuf::from("/test"));
        assert_eq!(dispatcher.project_root(), Path::new("/test"));
    }

    #[test]
    fn empty_selection_uses_checked_items() {
        let items = select_items(&interface(), &[]).unwrap();
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Daily"]);
    }

    #[test]
    fn named_selection_keeps_order() {
        let items = select_items(&interface(), &["Weekly".into(), "Daily".into()]).unwrap();
        assert_eq!(items[0].name, "Weekly");
        assert_eq!(items[1].name, "Daily");
    }

    #[test]
    fn unknown_name_is_an_error() {
        let err = select_items(&interface(), &["Monthly".into()]).unwrap_err();
        assert!(matches!(err, PipequeueError::UnknownTask { ref name } if name == "Monthly"));
    }
}
