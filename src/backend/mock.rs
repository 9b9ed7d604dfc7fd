//! Scripted backend for tests and dry runs.
//!
//! `ScriptedBackend` implements [`AutomationBackend`] without touching any
//! device. It records every call for later assertion and can be scripted
//! to fail resource loading, controller connection, individual steps or
//! aborts.
//!
//! # Example
//!
//! ```
//! use pipequeue::backend::{ScriptedBackend, StepStatus};
//!
//! let backend = ScriptedBackend::new()
//!     .with_outcomes([StepStatus::Succeeded, StepStatus::Failed]);
//! assert_eq!(backend.step_count(), 0);
//! ```

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use crate::config::schema::TargetConfig;
use crate::runner::cancel::CancelToken;
use crate::session::Session;

use super::{
    AutomationBackend, BackendError, BackendResult, ControllerHandle, ImageBuffer,
    ResourceHandle, StepStatus,
};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// One recorded `run_step` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCall {
    /// Id of the session the step ran on.
    pub session: u64,
    pub entry: String,
    pub params: String,
}

#[derive(Debug, Default)]
struct Script {
    resource_error: Option<String>,
    connect_error: Option<String>,
    outcomes: VecDeque<StepStatus>,
    block_steps: bool,
    step_delay: Duration,
    abort_fails: bool,
    frame: Option<ImageBuffer>,
    step_listener: Option<Sender<String>>,
    connect_listener: Option<Sender<()>>,
    next_handle: u64,
    resource_loads: usize,
    connects: Vec<TargetConfig>,
    aborts: usize,
    disposed: Vec<u64>,
    calls: Vec<StepCall>,
}

/// Backend that follows a script instead of driving a device.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
    /// Released once to let the first `connect` finish.
    connect_gate: Mutex<Option<Receiver<()>>>,
    abort_requested: AtomicBool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedBackend {
    /// Create a backend where everything succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make resource loading fail with `message`.
    pub fn fail_resources(self, message: &str) -> Self {
        self.script().resource_error = Some(message.to_string());
        self
    }

    /// Make controller connection fail with `message`.
    pub fn fail_connect(self, message: &str) -> Self {
        self.script().connect_error = Some(message.to_string());
        self
    }

    /// Queue step outcomes; once exhausted, steps succeed.
    pub fn with_outcomes(self, outcomes: impl IntoIterator<Item = StepStatus>) -> Self {
        self.script().outcomes.extend(outcomes);
        self
    }

    /// Make every step block until it is aborted or cancelled.
    pub fn blocking_steps(self) -> Self {
        self.script().block_steps = true;
        self
    }

    /// Make every step take `delay` before reporting its outcome.
    pub fn with_step_delay(self, delay: Duration) -> Self {
        self.script().step_delay = delay;
        self
    }

    /// Make `abort` report failure.
    pub fn failing_abort(self) -> Self {
        self.script().abort_fails = true;
        self
    }

    /// Frame returned by `capture_frame`.
    pub fn with_frame(self, frame: ImageBuffer) -> Self {
        self.script().frame = Some(frame);
        self
    }

    /// Send each step's entry name to `listener` when the step starts.
    pub fn notify_step_start(self, listener: Sender<String>) -> Self {
        self.script().step_listener = Some(listener);
        self
    }

    /// Hold the first `connect` until `release` yields or is dropped.
    ///
    /// `started` is signalled when that connect begins.
    pub fn hold_connect(self, started: Sender<()>, release: Receiver<()>) -> Self {
        self.script().connect_listener = Some(started);
        *self
            .connect_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(release);
        self
    }

    /// Most steps that were ever in flight at the same time.
    pub fn max_concurrent_steps(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// All recorded step calls, in order.
    pub fn calls(&self) -> Vec<StepCall> {
        self.script().calls.clone()
    }

    /// Number of steps run.
    pub fn step_count(&self) -> usize {
        self.script().calls.len()
    }

    /// Number of resource loads.
    pub fn resource_loads(&self) -> usize {
        self.script().resource_loads
    }

    /// Targets connected to, in order.
    pub fn connects(&self) -> Vec<TargetConfig> {
        self.script().connects.clone()
    }

    /// Number of abort requests.
    pub fn abort_count(&self) -> usize {
        self.script().aborts
    }

    /// Ids of disposed sessions.
    pub fn disposed(&self) -> Vec<u64> {
        self.script().disposed.clone()
    }

    fn next_handle(&self) -> u64 {
        let mut script = self.script();
        script.next_handle += 1;
        script.next_handle
    }

    fn step(&self, session: &Session, entry: &str, params: &str, cancel: &CancelToken) -> StepStatus {
        let (block, delay, outcome) = {
            let mut script = self.script();
            script.calls.push(StepCall {
                session: session.id(),
                entry: entry.to_string(),
                params: params.to_string(),
            });
            if let Some(listener) = &script.step_listener {
                let _ = listener.send(entry.to_string());
            }
            let outcome = script.outcomes.pop_front().unwrap_or(StepStatus::Succeeded);
            (script.block_steps, script.step_delay, outcome)
        };

        if block {
            while !cancel.is_cancelled() && !self.abort_requested.load(Ordering::SeqCst) {
                thread::sleep(POLL_INTERVAL);
            }
            self.abort_requested.store(false, Ordering::SeqCst);
            return StepStatus::Aborted;
        }

        if !delay.is_zero() {
            thread::sleep(delay);
        }
        outcome
    }
}

impl AutomationBackend for ScriptedBackend {
    fn load_resources(&self, _paths: &[PathBuf]) -> BackendResult<ResourceHandle> {
        let error = {
            let mut script = self.script();
            script.resource_loads += 1;
            script.resource_error.clone()
        };
        match error {
            Some(message) => Err(BackendError::Resource(message)),
            None => Ok(ResourceHandle(self.next_handle())),
        }
    }

    fn connect(&self, target: &TargetConfig) -> BackendResult<ControllerHandle> {
        let error = {
            let mut script = self.script();
            script.connects.push(target.clone());
            if let Some(listener) = &script.connect_listener {
                let _ = listener.send(());
            }
            script.connect_error.clone()
        };
        let gate = self
            .connect_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(release) = gate {
            let _ = release.recv();
        }
        match error {
            Some(message) => Err(BackendError::Controller(message)),
            None => Ok(ControllerHandle(self.next_handle())),
        }
    }

    fn run_step(
        &self,
        session: &Session,
        entry: &str,
        params: &str,
        cancel: &CancelToken,
    ) -> StepStatus {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        // an abort that arrived between steps targets no step
        self.abort_requested.store(false, Ordering::SeqCst);

        let status = self.step(session, entry, params, cancel);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        status
    }

    fn abort(&self, _session: &Session) -> bool {
        let fails = {
            let mut script = self.script();
            script.aborts += 1;
            script.abort_fails
        };
        if fails {
            return false;
        }
        self.abort_requested.store(true, Ordering::SeqCst);
        true
    }

    fn capture_frame(&self, _controller: ControllerHandle) -> BackendResult<ImageBuffer> {
        Ok(self.script().frame.clone().unwrap_or_default())
    }

    fn dispose(&self, session: &Session) {
        self.script().disposed.push(session.id());
    }
}
