//! Library integration tests.

use pipequeue::PipequeueError;

#[test]
fn error_types_are_public() {
    let err = PipequeueError::UnknownTask {
        name: "Daily".into(),
    };
    assert!(err.to_string().contains("Daily"));
}

#[test]
fn result_type_alias_is_public() {
    fn test_fn() -> pipequeue::Result<()> {
        Ok(())
    }
    assert!(test_fn().is_ok());
}

#[test]
fn cli_types_are_public() {
    use clap::Parser;
    use pipequeue::cli::{Cli, Commands};

    let cli = Cli::parse_from(["pipequeue", "plan", "--json"]);

    if let Commands::Plan(args) = cli.command {
        assert!(args.json);
        assert!(args.tasks.is_empty());
    } else {
        panic!("Expected Plan command");
    }
}

#[test]
fn capability_traits_are_object_safe() {
    use pipequeue::backend::{AutomationBackend, ScriptedBackend};
    use pipequeue::state::{BlobStore, MemoryBlobStore};
    use pipequeue::ui::{Notifier, RecordingNotifier};
    use std::sync::Arc;

    let _backend: Arc<dyn AutomationBackend> = Arc::new(ScriptedBackend::new());
    let _store: Box<dyn BlobStore> = Box::new(MemoryBlobStore::new());
    let _notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::new());
}
