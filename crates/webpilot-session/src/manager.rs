//! Session manager owning the single active browser session.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tracing::{debug, info, warn};

use webpilot_core::{Error, PilotConfig, Result, SessionConfig, SessionStatus};
use webpilot_driver::Backend;

use crate::session::Session;

/// Configuration for session manager.
#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    /// Parameters passed to the backend on every handshake
    pub session: SessionConfig,

    /// Handshake attempts per acquisition
    pub connect_attempts: u32,

    /// Delay after the first failed handshake, grows linearly
    pub connect_backoff: Duration,

    /// Budget for one liveness probe
    pub health_timeout: Duration,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            connect_attempts: 3,
            connect_backoff: Duration::from_millis(500),
            health_timeout: Duration::from_secs(2),
        }
    }
}

impl From<&PilotConfig> for SessionManagerConfig {
    fn from(config: &PilotConfig) -> Self {
        Self {
            session: config.session_config(),
            connect_attempts: config.browser.connect_attempts,
            connect_backoff: Duration::from_millis(config.browser.connect_backoff_ms),
            health_timeout: config.timeouts.health_check(),
        }
    }
}

/// Owner of the single active session.
///
/// At most one session is `Ready` at any time. All status changes go
/// through this type.
pub struct SessionManager {
    backend: Arc<dyn Backend>,
    config: SessionManagerConfig,
    active: RwLock<Option<Arc<Session>>>,
}

impl SessionManager {
    /// Create a manager for a backend.
    pub fn new(backend: Arc<dyn Backend>, config: SessionManagerConfig) -> Self {
        Self {
            backend,
            config,
            active: RwLock::new(None),
        }
    }

    /// Manager configuration.
    pub fn config(&self) -> &SessionManagerConfig {
        &self.config
    }

    /// The active session, whatever its status.
    pub fn current(&self) -> Option<Arc<Session>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The active session if it is `Ready`.
    pub fn ready_session(&self) -> Option<Arc<Session>> {
        self.current().filter(|s| s.is_ready())
    }

    /// Create and validate a new session.
    ///
    /// Retries the handshake up to `connect_attempts` times. Fails if a
    /// session is already ready.
    pub async fn acquire(&self) -> Result<Arc<Session>> {
        if let Some(existing) = self.ready_session() {
            return Err(Error::SessionInit(format!(
                "session {} is already active",
                existing.id()
            )));
        }

        let attempts = self.config.connect_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.backend.connect(&self.config.session).await {
                Ok(driver) => {
                    let session = Arc::new(Session::new(driver, self.config.session.backend));
                    info!(
                        "Session acquired: id={}, handle={}, backend={}, browser={}",
                        session.id(),
                        session.handle(),
                        self.backend.name(),
                        session.backend()
                    );
                    *self.active.write().unwrap_or_else(PoisonError::into_inner) =
                        Some(Arc::clone(&session));
                    return Ok(session);
                }
                Err(e) => {
                    warn!("Session handshake failed (attempt {}/{}): {}", attempt, attempts, e);
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.config.connect_backoff * attempt).await;
                    }
                }
            }
        }

        Err(Error::SessionInit(format!(
            "could not start a {} session after {} attempts: {}",
            self.config.session.backend,
            attempts,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// Lightweight liveness probe.
    ///
    /// Queries the current URL under the health-check budget. Does not
    /// change the session status.
    pub async fn health_check(&self, session: &Session) -> bool {
        if !matches!(
            session.status(),
            SessionStatus::Ready | SessionStatus::Degraded
        ) {
            return false;
        }

        match tokio::time::timeout(self.config.health_timeout, session.driver().current_url())
            .await
        {
            Ok(Ok(url)) => {
                debug!("Health check passed: session={}, url={}", session.id(), url);
                true
            }
            Ok(Err(e)) => {
                debug!("Health check failed: session={}: {}", session.id(), e);
                false
            }
            Err(_) => {
                debug!("Health check timed out: session={}", session.id());
                false
            }
        }
    }

    /// Flag a ready session that failed its health check.
    pub fn mark_degraded(&self, session: &Session) {
        if session.status() == SessionStatus::Ready {
            session.set_status(SessionStatus::Degraded);
            warn!("Session degraded: id={}", session.id());
        }
    }

    /// Close a session. Safe to call any number of times.
    ///
    /// Backend errors are logged, never returned.
    pub async fn release(&self, session: &Session) {
        let previous = session.set_status(SessionStatus::Closed);
        if previous == SessionStatus::Closed {
            debug!("Session already released: id={}", session.id());
            return;
        }

        if let Err(e) = session.driver().close().await {
            warn!("Error while closing session {}: {}", session.id(), e);
        }

        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        if active.as_ref().is_some_and(|a| a.id() == session.id()) {
            *active = None;
        }
        info!("Session released: id={}", session.id());
    }

    /// Replace a session with a fresh one using the same configuration.
    pub async fn recreate(&self, session: &Session) -> Result<Arc<Session>> {
        info!("Recreating session: id={}", session.id());
        self.release(session).await;
        self.acquire().await
    }

    /// Replace whatever session is active, or start one if none is.
    pub async fn reconnect(&self) -> Result<Arc<Session>> {
        match self.current() {
            Some(session) => self.recreate(&session).await,
            None => self.acquire().await,
        }
    }

    /// Release the active session, if any.
    ///
    /// Intended for process-exit paths.
    pub async fn shutdown(&self) {
        let active = self
            .active
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(session) = active {
            self.release(&session).await;
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .field("active", &self.current().map(|s| *s.id()))
            .finish()
    }
}
