//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Pipequeue - Task orchestration engine for screen-automation pipelines.
#[derive(Debug, Parser)]
#[command(name = "pipequeue")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding the project blobs (config, interface, pipeline/)
    #[arg(short, long, global = true, env = "PIPEQUEUE_ROOT")]
    pub root: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve the selected tasks into queue entries and print them
    Plan(PlanArgs),

    /// Evaluate a counter expression
    Eval(EvalArgs),

    /// Run the selected tasks against the dry-run backend
    Run(RunArgs),
}

/// Arguments for the `plan` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct PlanArgs {
    /// Tasks to resolve (defaults to the checked interface items)
    #[arg(short, long = "task", value_name = "NAME")]
    pub tasks: Vec<String>,

    /// Output entries as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `eval` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct EvalArgs {
    /// Text containing `{...}` placeholders
    pub expression: String,

    /// Seed a counter before evaluating (name=value, repeatable)
    #[arg(short = 's', long = "set", value_name = "NAME=VALUE", value_parser = parse_counter)]
    pub counters: Vec<(String, i64)>,

    /// Evaluate the expression this many times
    #[arg(short, long, default_value_t = 1)]
    pub times: u32,
}

/// Arguments for the `run` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct RunArgs {
    /// Tasks to run (defaults to the checked interface items)
    #[arg(short, long = "task", value_name = "NAME")]
    pub tasks: Vec<String>,

    /// Treat the target as connected even if the settings say otherwise
    #[arg(long)]
    pub connect: bool,

    /// Simulated duration of each step, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 0)]
    pub step_delay: u64,
}

fn parse_counter(s: &str) -> Result<(String, i64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))?;
    let value = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not an integer", value))?;
    Ok((name.trim().to_string(), value))
}
