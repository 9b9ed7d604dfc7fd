//! Backend sessions.
//!
//! This module provides the session manager that owns the connection to
//! the automation backend:
//! - Lazily builds a session from the configured resources and target
//! - Reuses it until the target, resources or connection change
//! - Builds sessions from a settings snapshot so callers can connect
//!   without holding the manager
//! - Classifies build failures as resource or controller errors

mod manager;

pub use manager::{capture_from, Session, SessionBuild, SessionError, SessionLookup, SessionManager};
