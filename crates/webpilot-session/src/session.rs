//! A live automation session.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use webpilot_core::{BackendKind, SessionId, SessionInfo, SessionStatus};
use webpilot_driver::BrowserSession;

/// One live connection to a browser.
///
/// Owned by [`SessionManager`](crate::SessionManager), which is the only
/// component allowed to change its status. Everything else borrows the
/// driver through [`Session::driver`].
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    driver: Box<dyn BrowserSession>,
    backend: BackendKind,
    created_at: DateTime<Utc>,
    status: Mutex<SessionStatus>,
}

impl Session {
    pub(crate) fn new(driver: Box<dyn BrowserSession>, backend: BackendKind) -> Self {
        Self {
            id: SessionId::new(),
            driver,
            backend,
            created_at: Utc::now(),
            status: Mutex::new(SessionStatus::Ready),
        }
    }

    /// Get the session ID.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Backend-assigned handle.
    pub fn handle(&self) -> &str {
        self.driver.handle()
    }

    /// Browser connection.
    pub fn driver(&self) -> &dyn BrowserSession {
        self.driver.as_ref()
    }

    /// Browser kind.
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current status.
    pub fn status(&self) -> SessionStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the session can accept actions.
    pub fn is_ready(&self) -> bool {
        self.status() == SessionStatus::Ready
    }

    /// Replace the status, returning the previous one.
    pub(crate) fn set_status(&self, status: SessionStatus) -> SessionStatus {
        let mut current = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, status)
    }

    /// Snapshot for reporting.
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            handle: self.handle().to_string(),
            status: self.status(),
            backend: self.backend,
            created_at: self.created_at.to_rfc3339(),
        }
    }
}
