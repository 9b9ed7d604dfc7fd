//! Eval command implementation.
//!
//! The `pipequeue eval` command evaluates counter placeholders, which is
//! handy when writing pipeline parameters.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use crate::cli::args::EvalArgs;
use crate::config::expression::{CounterTable, ExpressionEvaluator};
use crate::error::Result;
use crate::ui::Notifier;

use super::dispatcher::{Command, CommandResult};

/// The eval command implementation.
pub struct EvalCommand {
    args: EvalArgs,
}

impl EvalCommand {
    /// Create a new eval command.
    pub fn new(args: EvalArgs) -> Self {
        Self { args }
    }
}

impl Command for EvalCommand {
    fn execute(&self, out: &mut dyn Write, notifier: &Arc<dyn Notifier>) -> Result<CommandResult> {
        if !ExpressionEvaluator::has_expression(&self.args.expression) {
            notifier.warning("No placeholders found; the text is printed unchanged");
        }

        let counters = CounterTable::new();
        for (name, value) in &self.args.counters {
            counters.set(name, *value);
        }
        let evaluator = ExpressionEvaluator::new(counters);

        for _ in 0..self.args.times.max(1) {
            writeln!(out, "{}", evaluator.evaluate(&self.args.expression))?;
        }

        let sorted: BTreeMap<_, _> = evaluator.counters().snapshot().into_iter().collect();
        for (name, value) in sorted {
            writeln!(out, "{} = {}", name, value)?;
        }
        Ok(CommandResult::success())
    }
}
