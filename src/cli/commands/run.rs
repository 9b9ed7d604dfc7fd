//! Run command implementation.
//!
//! The `pipequeue run` command drives the selected tasks through the
//! orchestrator using the scripted dry-run backend.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::ScriptedBackend;
use crate::cli::args::RunArgs;
use crate::config::loader::load_project;
use crate::error::{PipequeueError, Result};
use crate::runner::{Orchestrator, QueueEvent, RunOutcome};
use crate::state::FileBlobStore;
use crate::steps::TaskRequestBuilder;
use crate::ui::{Notifier, ProgressSpinner};

use super::dispatcher::{select_items, Command, CommandResult};

const EVENT_POLL: Duration = Duration::from_millis(50);

/// The run command implementation.
pub struct RunCommand {
    project_root: PathBuf,
    args: RunArgs,
}

impl RunCommand {
    /// Create a new run command.
    pub fn new(project_root: &Path, args: RunArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            args,
        }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &RunArgs {
        &self.args
    }
}

impl Command for RunCommand {
    fn execute(&self, out: &mut dyn Write, notifier: &Arc<dyn Notifier>) -> Result<CommandResult> {
        let store = FileBlobStore::new(&self.project_root);
        let project = load_project(&store)?;
        let items = select_items(&project.interface, &self.args.tasks)?;

        let mut settings = project.settings.clone();
        if self.args.connect {
            settings.connection.connected = true;
        }

        let backend = Arc::new(
            ScriptedBackend::new().with_step_delay(Duration::from_millis(self.args.step_delay)),
        );
        let orchestrator = Orchestrator::new(
            backend,
            &settings,
            TaskRequestBuilder::from_project(&project),
            Arc::clone(notifier),
        );
        let events = orchestrator.subscribe();

        let handle = match orchestrator.start(&items) {
            Ok(handle) => handle,
            Err(PipequeueError::NotConnected { .. }) => return Ok(CommandResult::failure(1)),
            Err(e) => return Err(e),
        };

        let spinner = ProgressSpinner::new(&format!("Running {} task(s)", items.len()));
        while !handle.is_finished() {
            match events.recv_timeout(EVENT_POLL) {
                Ok(QueueEvent::Dequeued { name, remaining }) => {
                    spinner.set_message(&format!("Finished {} ({} left)", name, remaining));
                }
                Ok(_) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let report = handle
            .join()
            .map_err(|_| anyhow::anyhow!("run worker panicked"))?;
        for failure in &report.failures {
            notifier.warning(&PipequeueError::from(failure.clone()).to_string());
        }

        let summary = format!(
            "{} step(s) across {} task(s) in {}ms",
            report.steps_run,
            report.entries_finished,
            report.duration().num_milliseconds()
        );
        match &report.outcome {
            RunOutcome::Completed => spinner.finish_success(&summary),
            RunOutcome::StoppedByUser | RunOutcome::Stopped => spinner.finish_warning(&summary),
            RunOutcome::SessionFailed(err) => {
                spinner.finish_error(&err.to_string());
                return Ok(CommandResult::failure(1));
            }
        }

        writeln!(out, "{}", summary)?;
        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::RecordingNotifier;
    use std::fs;
    use tempfile::TempDir;

    fn project(connected: bool) -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("pipeline")).unwrap();
        fs::write(temp.path().join("pipeline/main.json"), r#"{"StartUp": {}}"#).unwrap();
        fs::write(
            temp.path().join("interface.json"),
            r#"{"task": [{"name": "Daily", "entry": "StartUp", "check": true, "repeatable": true, "repeat_count": 2}]}"#,
        )
        .unwrap();
        fs::write(
            temp.path().join("config.json"),
            format!(r#"{{"connection": {{"connected": {}}}}}"#, connected),
        )
        .unwrap();
        temp
    }

    #[test]
    fn runs_checked_tasks() {
        let temp = project(true);
        let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::new());
        let mut out = Vec::new();

        let result = RunCommand::new(temp.path(), RunArgs::default())
            .execute(&mut out, &notifier)
            .unwrap();

        assert!(result.success);
        assert!(String::from_utf8(out).unwrap().contains("2 step(s) across 1 task(s)"));
    }

    #[test]
    fn disconnected_target_fails_with_warning() {
        let temp = project(false);
        let recorder = Arc::new(RecordingNotifier::new());
        let notifier: Arc<dyn Notifier> = recorder.clone();
        let mut out = Vec::new();

        let result = RunCommand::new(temp.path(), RunArgs::default())
            .execute(&mut out, &notifier)
            .unwrap();

        assert_eq!(result.exit_code, 1);
        assert_eq!(recorder.warnings().len(), 1);
    }

    #[test]
    fn connect_flag_overrides_settings() {
        let temp = project(false);
        let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::new());
        let mut out = Vec::new();
        let args = RunArgs {
            connect: true,
            ..Default::default()
        };

        let result = RunCommand::new(temp.path(), args)
            .execute(&mut out, &notifier)
            .unwrap();
        assert!(result.success);
    }
}
