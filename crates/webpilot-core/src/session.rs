//! Session types for browser-automation session management.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// Unique identifier for an automation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of an automation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Created but the handshake has not completed
    Uninitialized,
    /// Live and usable
    Ready,
    /// Failed a health check; awaiting recreation
    Degraded,
    /// Torn down
    Closed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SessionStatus::Uninitialized => "uninitialized",
            SessionStatus::Ready => "ready",
            SessionStatus::Degraded => "degraded",
            SessionStatus::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// Browser driven by the automation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Google Chrome / Chromium
    #[default]
    Chrome,
    /// Mozilla Firefox
    Firefox,
    /// Microsoft Edge
    Edge,
    /// Apple Safari
    Safari,
}

impl BackendKind {
    /// WebDriver `browserName` capability value.
    pub fn browser_name(self) -> &'static str {
        match self {
            BackendKind::Chrome => "chrome",
            BackendKind::Firefox => "firefox",
            BackendKind::Edge => "MicrosoftEdge",
            BackendKind::Safari => "safari",
        }
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chrome" | "chromium" => Ok(BackendKind::Chrome),
            "firefox" => Ok(BackendKind::Firefox),
            "edge" => Ok(BackendKind::Edge),
            "safari" => Ok(BackendKind::Safari),
            other => Err(Error::Config(format!(
                "unsupported browser '{other}' (expected chrome, firefox, edge or safari)"
            ))),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackendKind::Chrome => "chrome",
            BackendKind::Firefox => "firefox",
            BackendKind::Edge => "edge",
            BackendKind::Safari => "safari",
        };
        f.write_str(name)
    }
}

/// Parameters used to acquire a session from a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Which browser to drive
    pub backend: BackendKind,
    /// Run without a visible window
    pub headless: bool,
    /// Page-load budget for navigations
    pub navigation_timeout: Duration,
    /// Default element-resolution budget
    pub element_timeout: Duration,
    /// Browser window size (width, height)
    pub window_size: (u32, u32),
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            headless: false,
            navigation_timeout: Duration::from_secs(30),
            element_timeout: Duration::from_secs(10),
            window_size: (1920, 1080),
        }
    }
}

/// Information about a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Session identifier
    pub id: SessionId,
    /// Backend-assigned handle
    pub handle: String,
    /// Current status
    pub status: SessionStatus,
    /// Browser kind
    pub backend: BackendKind,
    /// Creation time as RFC 3339
    pub created_at: String,
}
