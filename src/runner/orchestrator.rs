//! Task queue orchestration.
//!
//! The [`Orchestrator`] owns the queue of resolved entries and drives them
//! through the backend on a background worker. Its state machine is
//! `Idle -> Starting -> Running -> Idle`, with `Stopping` while a stop is
//! in progress and `Faulted` when an in-flight step could not be aborted.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use pipequeue::backend::ScriptedBackend;
//! use pipequeue::config::{EngineSettings, TaskInterfaceItem};
//! use pipequeue::runner::{Orchestrator, RunOutcome};
//! use pipequeue::steps::TaskRequestBuilder;
//! use pipequeue::ui::RecordingNotifier;
//!
//! let mut settings = EngineSettings::default();
//! settings.connection.connected = true;
//!
//! let orchestrator = Orchestrator::new(
//!     Arc::new(ScriptedBackend::new()),
//!     &settings,
//!     TaskRequestBuilder::default(),
//!     Arc::new(RecordingNotifier::new()),
//! );
//!
//! let handle = orchestrator.start(&[TaskInterfaceItem::new("Daily", "StartUp")]).unwrap();
//! let report = handle.join().unwrap();
//! assert_eq!(report.outcome, RunOutcome::Completed);
//! assert_eq!(report.steps_run, 1);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::backend::{AutomationBackend, ImageBuffer, StepStatus};
use crate::config::expression::{CounterTable, ExpressionEvaluator};
use crate::config::schema::{EngineSettings, TaskInterfaceItem};
use crate::error::{PipequeueError, Result};
use crate::session::{capture_from, Session, SessionError, SessionLookup, SessionManager};
use crate::steps::request::{QueueEntry, TaskRequestBuilder};
use crate::ui::Notifier;

use super::cancel::CancelToken;
use super::task::spawn_named;

/// Lifecycle state of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    /// Nothing is running; `start` is accepted.
    #[default]
    Idle,
    /// A session is being acquired for a new run.
    Starting,
    /// The queue is being drained.
    Running,
    /// A stop was requested and the in-flight step is being aborted.
    Stopping,
    /// An abort failed; `reset` is required before the next run.
    Faulted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Starting => "starting",
            RunState::Running => "running",
            RunState::Stopping => "stopping",
            RunState::Faulted => "faulted",
        };
        write!(f, "{}", s)
    }
}

/// Change to the pending queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// Entries were added.
    Enqueued { count: usize },
    /// An entry finished (or was abandoned) and left the queue.
    Dequeued { name: String, remaining: usize },
    /// The queue was emptied without running its entries.
    Cleared,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The queue drained naturally.
    Completed,
    /// The user asked to stop.
    StoppedByUser,
    /// The run was stopped or reset for another reason.
    Stopped,
    /// No session could be built; nothing ran.
    SessionFailed(SessionError),
}

/// Summary of one run, returned by the worker thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Backend steps invoked, including failed ones.
    pub steps_run: usize,
    /// Entries that left the queue after running.
    pub entries_finished: usize,
    /// Entries cut short by a step that did not succeed.
    pub failures: Vec<StepFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Whether the queue drained naturally.
    pub fn is_completed(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }

    /// Wall-clock time the run took.
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// An entry whose remaining repetitions were skipped after a step failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    /// Display name of the queue entry.
    pub task: String,
    /// Entry-point task the step ran from.
    pub entry: String,
    /// 1-based repetition that failed.
    pub repetition: u32,
    pub status: StepStatus,
}

impl From<StepFailure> for PipequeueError {
    fn from(failure: StepFailure) -> Self {
        PipequeueError::StepFailed {
            task: failure.task,
            message: format!(
                "'{}' {} on repetition {}",
                failure.entry, failure.status, failure.repetition
            ),
        }
    }
}

/// Result of [`Orchestrator::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No run was active. A user stop still clears the queue.
    NothingToStop,
    /// The run was cancelled and the engine is idle again.
    Stopped,
    /// The in-flight step could not be aborted; the engine is faulted.
    AbortFailed,
}

/// Per-run cancellation context.
#[derive(Debug)]
struct RunContext {
    id: u64,
    cancel: CancelToken,
    user_stopped: AtomicBool,
}

impl RunContext {
    fn stop_outcome(&self) -> RunOutcome {
        if self.user_stopped.load(Ordering::SeqCst) {
            RunOutcome::StoppedByUser
        } else {
            RunOutcome::Stopped
        }
    }
}

#[derive(Debug, Default)]
struct Control {
    state: RunState,
    queue: VecDeque<QueueEntry>,
    active: Option<Arc<RunContext>>,
    /// Session the active run is using, once acquired.
    session: Option<Arc<Session>>,
    next_run: u64,
}

impl Control {
    fn is_active(&self, run: &RunContext) -> bool {
        self.active.as_ref().is_some_and(|a| a.id == run.id)
    }

    fn finish_run(&mut self) {
        self.active = None;
        self.session = None;
        self.state = RunState::Idle;
    }
}

/// Counters a worker accumulates into its report.
struct Tally {
    started_at: DateTime<Utc>,
    steps_run: usize,
    entries_finished: usize,
    failures: Vec<StepFailure>,
}

impl Tally {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            steps_run: 0,
            entries_finished: 0,
            failures: Vec::new(),
        }
    }

    fn finish(self, outcome: RunOutcome) -> RunReport {
        RunReport {
            outcome,
            steps_run: self.steps_run,
            entries_finished: self.entries_finished,
            failures: self.failures,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

struct Shared {
    control: Mutex<Control>,
    sessions: Mutex<SessionManager>,
    requests: TaskRequestBuilder,
    backend: Arc<dyn AutomationBackend>,
    evaluator: ExpressionEvaluator,
    notifier: Arc<dyn Notifier>,
    subscribers: Mutex<Vec<Sender<QueueEvent>>>,
    /// Held by a worker for its whole run so steps never overlap.
    run_lock: Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn control(&self) -> MutexGuard<'_, Control> {
        lock(&self.control)
    }

    fn sessions(&self) -> MutexGuard<'_, SessionManager> {
        lock(&self.sessions)
    }

    /// Current session, built without holding the session manager.
    ///
    /// Retries if the settings change while the backend is connecting.
    fn acquire_session(&self) -> std::result::Result<Arc<Session>, SessionError> {
        loop {
            let build = match self.sessions().lookup() {
                SessionLookup::Live(session) => return Ok(session),
                SessionLookup::Build(build) => build,
            };
            let session = build.run()?;
            if let Some(session) = self.sessions().install(&build, session) {
                return Ok(session);
            }
            debug!("Session settings changed while connecting; rebuilding");
        }
    }

    fn emit(&self, event: QueueEvent) {
        debug!("Queue event: {:?}", event);
        lock(&self.subscribers).retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Worker body for one run.
    fn drive(&self, run: Arc<RunContext>) -> RunReport {
        let mut tally = Tally::new();
        let _exclusive = lock(&self.run_lock);

        if run.cancel.is_cancelled() {
            return tally.finish(run.stop_outcome());
        }

        let session = match self.acquire_session() {
            Ok(session) => session,
            Err(err) => {
                let outcome = self.abandon_start(&run, err);
                return tally.finish(outcome);
            }
        };

        {
            let mut control = self.control();
            if !control.is_active(&run) || run.cancel.is_cancelled() {
                return tally.finish(run.stop_outcome());
            }
            control.session = Some(Arc::clone(&session));
            control.state = RunState::Running;
        }
        info!("Run {} using session {}", run.id, session.id());

        loop {
            let entry = {
                let control = self.control();
                if !control.is_active(&run) {
                    return tally.finish(run.stop_outcome());
                }
                match control.queue.front() {
                    Some(entry) => entry.clone(),
                    None => break,
                }
            };

            for repetition in 1..=entry.repeat {
                if run.cancel.is_cancelled() {
                    return tally.finish(run.stop_outcome());
                }
                let params = self.evaluator.evaluate(&entry.params);
                debug!(
                    "Running '{}' ({}/{}) from '{}'",
                    entry.name, repetition, entry.repeat, entry.entry
                );
                let status = self
                    .backend
                    .run_step(&session, &entry.entry, &params, &run.cancel);
                tally.steps_run += 1;

                if !status.is_success() {
                    if run.cancel.is_cancelled() {
                        return tally.finish(run.stop_outcome());
                    }
                    warn!(
                        "Task '{}' {} on repetition {}/{}; moving to the next entry",
                        entry.name, status, repetition, entry.repeat
                    );
                    tally.failures.push(StepFailure {
                        task: entry.name.clone(),
                        entry: entry.entry.clone(),
                        repetition,
                        status,
                    });
                    break;
                }
            }

            let remaining = {
                let mut control = self.control();
                if !control.is_active(&run) {
                    return tally.finish(run.stop_outcome());
                }
                control.queue.pop_front();
                control.queue.len()
            };
            tally.entries_finished += 1;
            self.emit(QueueEvent::Dequeued {
                name: entry.name,
                remaining,
            });
        }

        {
            let mut control = self.control();
            if !control.is_active(&run) {
                return tally.finish(run.stop_outcome());
            }
            control.finish_run();
        }
        info!("Run {} completed after {} steps", run.id, tally.steps_run);
        self.notifier.info("All tasks completed");
        tally.finish(RunOutcome::Completed)
    }

    /// Unwind a run whose session could not be built.
    fn abandon_start(&self, run: &RunContext, err: SessionError) -> RunOutcome {
        {
            let mut control = self.control();
            if !control.is_active(run) {
                return run.stop_outcome();
            }
            control.queue.clear();
            control.finish_run();
        }
        self.emit(QueueEvent::Cleared);

        if let SessionError::ControllerInitFailed { target, .. } = &err {
            self.notifier
                .warning(&format!("Check the {} settings and try again", target));
        }
        self.notifier.error(&err.to_string());
        RunOutcome::SessionFailed(err)
    }
}

/// Drives queued entries through the backend one run at a time.
///
/// Cloning yields another handle to the same orchestrator.
#[derive(Clone)]
pub struct Orchestrator {
    shared: Arc<Shared>,
}

impl Orchestrator {
    /// Create an orchestrator with a fresh counter table.
    pub fn new(
        backend: Arc<dyn AutomationBackend>,
        settings: &EngineSettings,
        requests: TaskRequestBuilder,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::with_counters(backend, settings, requests, notifier, CounterTable::new())
    }

    /// Create an orchestrator sharing an existing counter table.
    pub fn with_counters(
        backend: Arc<dyn AutomationBackend>,
        settings: &EngineSettings,
        requests: TaskRequestBuilder,
        notifier: Arc<dyn Notifier>,
        counters: CounterTable,
    ) -> Self {
        let sessions = SessionManager::new(Arc::clone(&backend), settings, counters.clone());
        Self {
            shared: Arc::new(Shared {
                control: Mutex::new(Control::default()),
                sessions: Mutex::new(sessions),
                requests,
                backend,
                evaluator: ExpressionEvaluator::new(counters),
                notifier,
                subscribers: Mutex::new(Vec::new()),
                run_lock: Mutex::new(()),
            }),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        self.shared.control().state
    }

    /// Number of entries still queued.
    pub fn queue_len(&self) -> usize {
        self.shared.control().queue.len()
    }

    /// Snapshot of the queued entries, head first.
    pub fn queued(&self) -> Vec<QueueEntry> {
        self.shared.control().queue.iter().cloned().collect()
    }

    /// Counter table the evaluator works on.
    pub fn counters(&self) -> CounterTable {
        self.shared.evaluator.counters().clone()
    }

    /// Receive queue events from now on.
    pub fn subscribe(&self) -> Receiver<QueueEvent> {
        let (tx, rx) = mpsc::channel();
        lock(&self.shared.subscribers).push(tx);
        rx
    }

    /// Run `f` against the session manager, e.g. to switch targets.
    pub fn with_sessions<R>(&self, f: impl FnOnce(&mut SessionManager) -> R) -> R {
        f(&mut self.shared.sessions())
    }

    /// Capture a frame from the current target, building a session if needed.
    pub fn capture_frame(&self) -> Result<ImageBuffer> {
        let session = self.shared.acquire_session()?;
        capture_from(self.shared.backend.as_ref(), &session)
    }

    /// Queue `items` and start draining them on a background worker.
    ///
    /// The returned handle yields the run's report.
    ///
    /// # Errors
    ///
    /// - `NotConnected` if no target is connected (a warning is sent too)
    /// - `Busy` if the orchestrator is not idle
    /// - `Io` if the worker thread cannot be spawned
    pub fn start(&self, items: &[TaskInterfaceItem]) -> Result<JoinHandle<RunReport>> {
        let (connected, target) = {
            let sessions = self.shared.sessions();
            (sessions.is_connected(), sessions.connection().target)
        };
        if !connected {
            warn!("Start refused: no {} connected", target);
            self.shared
                .notifier
                .warning(&format!("No {} connected; connect one before starting", target));
            return Err(PipequeueError::NotConnected {
                target: target.to_string(),
            });
        }

        let entries = self.shared.requests.build_all(items.iter());

        let run = {
            let mut control = self.shared.control();
            if control.state != RunState::Idle {
                return Err(PipequeueError::Busy {
                    state: control.state.to_string(),
                });
            }
            control.next_run += 1;
            let run = Arc::new(RunContext {
                id: control.next_run,
                cancel: CancelToken::new(),
                user_stopped: AtomicBool::new(false),
            });
            control.queue.extend(entries.iter().cloned());
            control.active = Some(Arc::clone(&run));
            control.state = RunState::Starting;
            run
        };
        info!("Run {} starting with {} entries", run.id, entries.len());
        self.shared.emit(QueueEvent::Enqueued {
            count: entries.len(),
        });

        let shared = Arc::clone(&self.shared);
        let worker = Arc::clone(&run);
        let name = format!("pipequeue-run-{}", run.id);
        match spawn_named(&name, move || shared.drive(worker)) {
            Ok(handle) => Ok(handle),
            Err(e) => {
                error!("Failed to spawn run worker: {}", e);
                {
                    let mut control = self.shared.control();
                    control.queue.clear();
                    control.finish_run();
                }
                self.shared.emit(QueueEvent::Cleared);
                Err(e.into())
            }
        }
    }

    /// Stop the active run.
    ///
    /// `user_stopped` marks the run as abandoned by the user, which changes
    /// how its end is reported.
    pub fn stop(&self, user_stopped: bool) -> StopOutcome {
        let (run, session) = {
            let mut control = self.shared.control();
            let Some(run) = control.active.clone() else {
                if user_stopped {
                    control.queue.clear();
                    drop(control);
                    self.shared.emit(QueueEvent::Cleared);
                    self.shared.notifier.warning("Nothing to stop");
                }
                return StopOutcome::NothingToStop;
            };
            if user_stopped {
                run.user_stopped.store(true, Ordering::SeqCst);
            }
            run.cancel.cancel();
            control.state = RunState::Stopping;
            control.queue.clear();
            (run, control.session.clone())
        };
        info!("Stopping run {}", run.id);
        self.shared.emit(QueueEvent::Cleared);

        let aborted = match &session {
            Some(session) => self.shared.backend.abort(session),
            None => true,
        };

        let mut control = self.shared.control();
        if !aborted {
            control.active = None;
            control.session = None;
            control.state = RunState::Faulted;
            drop(control);
            error!("Abort failed for run {}", run.id);
            self.shared
                .notifier
                .error(&PipequeueError::AbortFailed.to_string());
            return StopOutcome::AbortFailed;
        }

        if control.is_active(&run) {
            control.finish_run();
        }
        drop(control);
        if user_stopped {
            self.shared.notifier.info("Stopped by user");
        } else {
            self.shared.notifier.info("All tasks completed");
        }
        StopOutcome::Stopped
    }

    /// Return to `Idle` from any state, dropping the queue and the session.
    ///
    /// An active run is cancelled without calling the backend's abort.
    pub fn reset(&self) {
        let cleared = {
            let mut control = self.shared.control();
            if let Some(run) = &control.active {
                run.cancel.cancel();
            }
            let had_entries = !control.queue.is_empty();
            control.queue.clear();
            control.finish_run();
            had_entries
        };
        if cleared {
            self.shared.emit(QueueEvent::Cleared);
        }
        self.shared.sessions().reset();
        info!("Orchestrator reset");
    }
}
