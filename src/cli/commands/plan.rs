//! Plan command implementation.
//!
//! The `pipequeue plan` command resolves interface items into queue
//! entries without running anything.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use console::Term;

use crate::cli::args::PlanArgs;
use crate::config::loader::load_project;
use crate::error::Result;
use crate::state::FileBlobStore;
use crate::steps::TaskRequestBuilder;
use crate::ui::theme::PipequeueTheme;
use crate::ui::Notifier;

use super::dispatcher::{select_items, Command, CommandResult};

/// The plan command implementation.
pub struct PlanCommand {
    project_root: PathBuf,
    args: PlanArgs,
}

impl PlanCommand {
    /// Create a new plan command.
    pub fn new(project_root: &Path, args: PlanArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            args,
        }
    }
}

impl Command for PlanCommand {
    fn execute(&self, out: &mut dyn Write, notifier: &Arc<dyn Notifier>) -> Result<CommandResult> {
        let store = FileBlobStore::new(&self.project_root);
        let project = load_project(&store)?;
        let items = select_items(&project.interface, &self.args.tasks)?;

        if items.is_empty() {
            notifier.warning("No tasks selected; pass --task or check items in the interface");
            return Ok(CommandResult::failure(1));
        }

        let entries = TaskRequestBuilder::from_project(&project).build_all(items.iter());

        if self.args.json {
            let json = serde_json::to_string_pretty(&entries)
                .map_err(|e| anyhow::anyhow!("failed to serialize plan: {}", e))?;
            writeln!(out, "{}", json)?;
            return Ok(CommandResult::success());
        }

        let theme = PipequeueTheme::detect_for(&Term::stdout());
        for entry in &entries {
            writeln!(out, "{}", theme.format_entry(&entry.name, &entry.entry, entry.repeat))?;
            for line in entry.params.lines() {
                writeln!(out, "    {}", theme.dim.apply_to(line))?;
            }
        }
        Ok(CommandResult::success())
    }
}
