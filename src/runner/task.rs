//! Named background tasks.
//!
//! Runs a closure on its own thread and logs when it starts, finishes or
//! panics, so background work shows up in the log with a readable name.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use tracing::{error, info};

/// Spawn `work` on a thread named `name`.
///
/// A panic inside `work` is logged and then resumed, so joining the
/// handle still reports it.
///
/// # Errors
///
/// Returns an IO error if the thread could not be created.
pub fn spawn_named<T, F>(name: &str, work: F) -> std::io::Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let task_name = name.to_string();
    thread::Builder::new().name(name.to_string()).spawn(move || {
        info!("Task '{}' started", task_name);
        match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(value) => {
                info!("Task '{}' finished", task_name);
                value
            }
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("Task '{}' panicked: {}", task_name, reason);
                panic::resume_unwind(payload)
            }
        }
    })
}
