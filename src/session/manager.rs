//! Backend session lifecycle.
//!
//! A session binds a connected controller to a loaded resource bundle.
//! The manager builds one lazily, hands out shared references to it, and
//! throws it away whenever the target or resources change.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::backend::{AutomationBackend, ControllerHandle, ImageBuffer, ResourceHandle};
use crate::config::expression::CounterTable;
use crate::config::schema::{
    AdbDeviceConfig, ConnectionSettings, DesktopWindowConfig, EngineSettings, TargetConfig,
    TargetKind,
};
use crate::error::{PipequeueError, Result};

/// Why a session could not be built.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The resource bundle failed to load.
    #[error("failed to load resources: {0}")]
    ResourceLoadFailed(String),

    /// The controller failed to connect.
    #[error("failed to connect to {target}: {message}")]
    ControllerInitFailed { target: TargetKind, message: String },

    /// Custom extensions could not be registered.
    #[error("failed to register extensions: {0}")]
    BindFailed(String),
}

impl From<SessionError> for PipequeueError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::ResourceLoadFailed(message) => PipequeueError::ResourceLoad { message },
            SessionError::ControllerInitFailed { target, message } => {
                PipequeueError::ControllerInit {
                    target: target.to_string(),
                    message,
                }
            }
            SessionError::BindFailed(message) => {
                PipequeueError::Other(anyhow::anyhow!("failed to register extensions: {message}"))
            }
        }
    }
}

/// A live controller + resource binding.
#[derive(Debug)]
pub struct Session {
    id: u64,
    target: TargetConfig,
    controller: ControllerHandle,
    resource: ResourceHandle,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Bind a controller and a resource bundle.
    pub fn new(
        id: u64,
        target: TargetConfig,
        controller: ControllerHandle,
        resource: ResourceHandle,
    ) -> Self {
        Self {
            id,
            target,
            controller,
            resource,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn target(&self) -> &TargetConfig {
        &self.target
    }

    pub fn controller(&self) -> ControllerHandle {
        self.controller
    }

    pub fn resource(&self) -> ResourceHandle {
        self.resource
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Snapshot of the settings a new session is built from.
///
/// Obtained from [`SessionManager::lookup`] and built with
/// [`SessionBuild::run`], which does not need the manager. The result is
/// handed back through [`SessionManager::install`].
pub struct SessionBuild {
    id: u64,
    generation: u64,
    target: TargetConfig,
    resources: Vec<PathBuf>,
    backend: Arc<dyn AutomationBackend>,
    counters: CounterTable,
}

impl SessionBuild {
    /// Load resources, connect the controller and register extensions.
    ///
    /// Clears the counter table first. On failure nothing is retained.
    pub fn run(&self) -> std::result::Result<Session, SessionError> {
        self.counters.clear();

        info!("Loading resources from {:?}", self.resources);
        let resource = self.backend.load_resources(&self.resources).map_err(|e| {
            error!("Resource loading failed: {}", e);
            SessionError::ResourceLoadFailed(e.to_string())
        })?;
        info!("Resources loaded");

        let kind = self.target.kind();
        info!("Connecting to {}", kind);
        let controller = self.backend.connect(&self.target).map_err(|e| {
            warn!("Controller initialization failed for {}", kind);
            error!("Connection failed: {}", e);
            SessionError::ControllerInitFailed {
                target: kind,
                message: e.to_string(),
            }
        })?;
        info!("Connected to {}", kind);

        let session = Session::new(self.id, self.target.clone(), controller, resource);
        self.backend.register_extensions(&session).map_err(|e| {
            error!("Extension registration failed: {}", e);
            SessionError::BindFailed(e.to_string())
        })?;
        Ok(session)
    }
}

/// Result of [`SessionManager::lookup`].
pub enum SessionLookup {
    /// A session is live.
    Live(Arc<Session>),
    /// No session is live; build one from this snapshot.
    Build(SessionBuild),
}

/// Owns the current session and the settings it is built from.
pub struct SessionManager {
    backend: Arc<dyn AutomationBackend>,
    connection: ConnectionSettings,
    resources: Vec<PathBuf>,
    counters: CounterTable,
    current: Option<Arc<Session>>,
    next_id: u64,
    /// Bumped whenever the current session is invalidated.
    generation: u64,
}

impl SessionManager {
    /// Create a manager; no session is built until first use.
    pub fn new(
        backend: Arc<dyn AutomationBackend>,
        settings: &EngineSettings,
        counters: CounterTable,
    ) -> Self {
        Self {
            backend,
            connection: settings.connection.clone(),
            resources: settings.resources.clone(),
            counters,
            current: None,
            next_id: 0,
            generation: 0,
        }
    }

    /// The backend sessions are built on.
    pub fn backend(&self) -> &Arc<dyn AutomationBackend> {
        &self.backend
    }

    /// Current connection settings.
    pub fn connection(&self) -> &ConnectionSettings {
        &self.connection
    }

    /// Whether the user has connected a target.
    pub fn is_connected(&self) -> bool {
        self.connection.connected
    }

    /// Mark the target as connected or disconnected.
    ///
    /// Disconnecting drops the current session.
    pub fn set_connected(&mut self, connected: bool) {
        self.connection.connected = connected;
        if !connected {
            self.reset();
        }
    }

    /// Switch between adb and desktop targets.
    pub fn set_target(&mut self, kind: TargetKind) {
        if self.connection.target != kind {
            self.connection.target = kind;
            self.reset();
        }
    }

    /// Replace the adb device settings.
    pub fn set_adb(&mut self, adb: AdbDeviceConfig) {
        if self.connection.adb != adb {
            self.connection.adb = adb;
            self.reset();
        }
    }

    /// Replace the desktop window settings.
    pub fn set_desktop(&mut self, desktop: DesktopWindowConfig) {
        if self.connection.desktop != desktop {
            self.connection.desktop = desktop;
            self.reset();
        }
    }

    /// Replace the resource bundle paths.
    pub fn set_resources(&mut self, resources: Vec<PathBuf>) {
        if self.resources != resources {
            self.resources = resources;
            self.reset();
        }
    }

    /// The current session, if one is live.
    pub fn current(&self) -> Option<Arc<Session>> {
        self.current.clone()
    }

    /// The current session, or a snapshot to build one from.
    pub fn lookup(&mut self) -> SessionLookup {
        if let Some(session) = &self.current {
            return SessionLookup::Live(Arc::clone(session));
        }
        self.next_id += 1;
        SessionLookup::Build(SessionBuild {
            id: self.next_id,
            generation: self.generation,
            target: self.connection.target_config(),
            resources: self.resources.clone(),
            backend: Arc::clone(&self.backend),
            counters: self.counters.clone(),
        })
    }

    /// Make a session built from `build` current.
    ///
    /// Returns `None` if the settings changed since the snapshot was taken;
    /// the session is disposed and the caller should look up again. If
    /// another session was installed first, that one is returned instead.
    pub fn install(&mut self, build: &SessionBuild, session: Session) -> Option<Arc<Session>> {
        if build.generation != self.generation {
            debug!("Session {} built from stale settings", session.id());
            self.backend.dispose(&session);
            return None;
        }
        if let Some(current) = &self.current {
            self.backend.dispose(&session);
            return Some(Arc::clone(current));
        }
        let session = Arc::new(session);
        self.current = Some(Arc::clone(&session));
        Some(session)
    }

    /// Return the current session, building one if needed.
    ///
    /// Building clears the counter table. On failure nothing is retained.
    pub fn get_or_create(&mut self) -> std::result::Result<Arc<Session>, SessionError> {
        loop {
            let build = match self.lookup() {
                SessionLookup::Live(session) => return Ok(session),
                SessionLookup::Build(build) => build,
            };
            let session = build.run()?;
            if let Some(session) = self.install(&build, session) {
                return Ok(session);
            }
        }
    }

    /// Drop the current session.
    ///
    /// Teardown is left to the backend's `dispose`, which may defer it.
    /// Sessions still being built from older settings will not be installed.
    pub fn reset(&mut self) {
        self.generation += 1;
        if let Some(session) = self.current.take() {
            debug!("Discarding session {}", session.id());
            self.backend.dispose(&session);
        }
    }

    /// Capture a frame from the current target.
    ///
    /// # Errors
    ///
    /// Returns the session error if no session can be built, and
    /// `Capture` if the backend fails or returns an empty frame.
    pub fn capture_frame(&mut self) -> Result<ImageBuffer> {
        let session = self.get_or_create()?;
        capture_from(self.backend.as_ref(), &session)
    }
}

/// Capture a frame through `session`'s controller.
///
/// An empty frame is reported as a `Capture` error.
pub fn capture_from(backend: &dyn AutomationBackend, session: &Session) -> Result<ImageBuffer> {
    let frame = backend
        .capture_frame(session.controller())
        .map_err(|e| PipequeueError::Capture {
            message: e.to_string(),
        })?;
    if frame.is_empty() {
        return Err(PipequeueError::Capture {
            message: "backend returned an empty frame".to_string(),
        });
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ScriptedBackend;

    fn manager_with(backend: Arc<ScriptedBackend>) -> SessionManager {
        let mut settings = EngineSettings::default();
        settings.connection.connected = true;
        SessionManager::new(backend, &settings, CounterTable::new())
    }

    #[test]
    fn session_is_built_once_and_reused() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut manager = manager_with(backend.clone());

        let first = manager.get_or_create().unwrap();
        let second = manager.get_or_create().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(backend.resource_loads(), 1);
        assert_eq!(backend.connects().len(), 1);
    }

    #[test]
    fn resource_failure_retains_nothing() {
        let backend = Arc::new(ScriptedBackend::new().fail_resources("missing model"));
        let mut manager = manager_with(backend.clone());

        let err = manager.get_or_create().unwrap_err();
        assert!(matches!(err, SessionError::ResourceLoadFailed(ref m) if m.contains("missing model")));
        assert!(manager.current().is_none());
        // the controller is never attempted
        assert!(backend.connects().is_empty());
    }

    #[test]
    fn controller_failure_names_target_kind() {
        let backend = Arc::new(ScriptedBackend::new().fail_connect("no device"));
        let mut manager = manager_with(backend);
        manager.set_target(TargetKind::Desktop);

        let err = manager.get_or_create().unwrap_err();
        assert_eq!(
            err,
            SessionError::ControllerInitFailed {
                target: TargetKind::Desktop,
                message: "controller connection failed: no device".into(),
            }
        );
        assert!(manager.current().is_none());
    }

    #[test]
    fn switching_target_invalidates_session() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut manager = manager_with(backend.clone());

        let first = manager.get_or_create().unwrap();
        manager.set_target(TargetKind::Desktop);
        assert!(manager.current().is_none());

        let second = manager.get_or_create().unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(second.target().kind(), TargetKind::Desktop);
        assert_eq!(backend.disposed(), vec![first.id()]);
    }

    #[test]
    fn unchanged_settings_keep_session() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut manager = manager_with(backend);
        manager.get_or_create().unwrap();

        manager.set_target(TargetKind::Adb);
        manager.set_adb(AdbDeviceConfig::default());
        assert!(manager.current().is_some());

        let mut adb = AdbDeviceConfig::default();
        adb.serial = "emulator-5554".into();
        manager.set_adb(adb);
        assert!(manager.current().is_none());
    }

    #[test]
    fn disconnect_drops_session() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut manager = manager_with(backend);
        manager.get_or_create().unwrap();

        manager.set_connected(false);
        assert!(!manager.is_connected());
        assert!(manager.current().is_none());
    }

    #[test]
    fn new_session_clears_counters() {
        let backend = Arc::new(ScriptedBackend::new());
        let counters = CounterTable::new();
        counters.set("round", 9);
        let mut manager = SessionManager::new(backend, &EngineSettings::default(), counters.clone());

        manager.get_or_create().unwrap();
        assert!(counters.is_empty());

        counters.set("round", 3);
        manager.get_or_create().unwrap();
        assert_eq!(counters.get("round"), Some(3));
    }

    #[test]
    fn capture_rejects_empty_frames() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut manager = manager_with(backend);
        assert!(matches!(
            manager.capture_frame(),
            Err(PipequeueError::Capture { .. })
        ));
    }

    #[test]
    fn capture_returns_frame() {
        let frame = ImageBuffer {
            width: 1,
            height: 1,
            encoded: vec![0x89, 0x50],
        };
        let backend = Arc::new(ScriptedBackend::new().with_frame(frame.clone()));
        let mut manager = manager_with(backend);
        assert_eq!(manager.capture_frame().unwrap(), frame);
    }

    #[test]
    fn build_from_stale_settings_is_not_installed() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut manager = manager_with(backend.clone());

        let SessionLookup::Build(build) = manager.lookup() else {
            panic!("expected a build snapshot");
        };
        let session = build.run().unwrap();
        manager.set_target(TargetKind::Desktop);

        assert!(manager.install(&build, session).is_none());
        assert!(manager.current().is_none());
        assert_eq!(backend.disposed().len(), 1);

        let rebuilt = manager.get_or_create().unwrap();
        assert_eq!(rebuilt.target().kind(), TargetKind::Desktop);
    }

    #[test]
    fn second_build_yields_to_installed_session() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut manager = manager_with(backend.clone());

        let SessionLookup::Build(first) = manager.lookup() else {
            panic!("expected a build snapshot");
        };
        let SessionLookup::Build(second) = manager.lookup() else {
            panic!("expected a build snapshot");
        };
        let installed = manager.install(&first, first.run().unwrap()).unwrap();
        let late = second.run().unwrap();
        let late_id = late.id();

        let current = manager.install(&second, late).unwrap();
        assert!(Arc::ptr_eq(&installed, &current));
        assert_eq!(backend.disposed(), vec![late_id]);
    }

    #[test]
    fn lookup_returns_live_session() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut manager = manager_with(backend);
        let session = manager.get_or_create().unwrap();

        assert!(matches!(manager.lookup(), SessionLookup::Live(s) if Arc::ptr_eq(&s, &session)));
    }

    #[test]
    fn session_errors_map_to_engine_errors() {
        let err: PipequeueError = SessionError::ControllerInitFailed {
            target: TargetKind::Adb,
            message: "offline".into(),
        }
        .into();
        assert!(matches!(err, PipequeueError::ControllerInit { ref target, .. } if target == "emulator"));
    }
}
