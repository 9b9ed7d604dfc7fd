//! Pipequeue CLI entry point.

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use pipequeue::cli::{Cli, CommandDispatcher};
use pipequeue::ui::{ConsoleNotifier, Notifier};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging.
///
/// Log level is controlled by:
/// 1. `--debug` flag sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. Default is INFO
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("pipequeue=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pipequeue=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    tracing::debug!("Pipequeue starting with args: {:?}", cli);

    let project_root = cli
        .root
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier::new());
    let dispatcher = CommandDispatcher::new(project_root);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let code = match dispatcher.dispatch(&cli, &mut out, &notifier) {
        Ok(result) => ExitCode::from(result.exit_code as u8),
        Err(e) => {
            notifier.error(&format!("Error: {}", e));
            ExitCode::from(1)
        }
    };
    let _ = out.flush();
    code
}
