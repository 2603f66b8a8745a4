//! Configuration types for webpilot.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{BackendKind, Error, SessionConfig};

/// Top-level configuration loaded from YAML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PilotConfig {
    /// Browser/backend settings
    pub browser: BrowserSettings,
    /// Timeout settings
    pub timeouts: TimeoutSettings,
    /// Retry and escalation settings
    pub retry: RetrySettings,
    /// Screenshot artifact settings
    pub artifacts: ArtifactSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

impl PilotConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> crate::Result<Self> {
        let config: PilotConfig =
            serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> crate::Result<()> {
        let url = url::Url::parse(&self.browser.webdriver_url).map_err(|e| {
            Error::Config(format!(
                "browser.webdriver_url '{}' is invalid: {e}",
                self.browser.webdriver_url
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(
                "browser.webdriver_url must use http or https".to_string(),
            ));
        }

        if self.browser.connect_attempts == 0 {
            return Err(Error::Config(
                "browser.connect_attempts must be > 0".to_string(),
            ));
        }

        if self.timeouts.navigation_ms == 0
            || self.timeouts.element_ms == 0
            || self.timeouts.health_check_ms == 0
        {
            return Err(Error::Config("timeouts must be > 0".to_string()));
        }

        if self.timeouts.poll_interval_ms == 0
            || self.timeouts.poll_interval_ms > self.timeouts.element_ms
        {
            return Err(Error::Config(
                "timeouts.poll_interval_ms must be > 0 and <= timeouts.element_ms".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be > 0".to_string()));
        }

        if self.retry.escalation_threshold == 0 {
            return Err(Error::Config(
                "retry.escalation_threshold must be > 0".to_string(),
            ));
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(Error::Config(
                "retry.base_delay_ms must be <= retry.max_delay_ms".to_string(),
            ));
        }

        Ok(())
    }

    /// Session acquisition parameters derived from this configuration.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            backend: self.browser.backend,
            headless: self.browser.headless,
            navigation_timeout: Duration::from_millis(self.timeouts.navigation_ms),
            element_timeout: Duration::from_millis(self.timeouts.element_ms),
            window_size: (self.browser.window_width, self.browser.window_height),
        }
    }
}

/// Browser settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Browser to drive
    pub backend: BackendKind,
    /// Run without a visible window
    pub headless: bool,
    /// WebDriver server endpoint (chromedriver, geckodriver, ...)
    pub webdriver_url: String,
    /// Window width in pixels
    pub window_width: u32,
    /// Window height in pixels
    pub window_height: u32,
    /// Handshake attempts before session creation fails
    pub connect_attempts: u32,
    /// Pause between handshake attempts in milliseconds
    pub connect_backoff_ms: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Chrome,
            headless: false,
            webdriver_url: "http://localhost:9515".to_string(),
            window_width: 1920,
            window_height: 1080,
            connect_attempts: 3,
            connect_backoff_ms: 500,
        }
    }
}

/// Timeout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    /// Page-load budget in milliseconds
    pub navigation_ms: u64,
    /// Element-resolution budget in milliseconds
    pub element_ms: u64,
    /// Resolver polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Liveness probe budget in milliseconds
    pub health_check_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            navigation_ms: 30_000,
            element_ms: 10_000,
            poll_interval_ms: 200,
            health_check_ms: 2_000,
        }
    }
}

impl TimeoutSettings {
    /// Resolver polling interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Liveness probe budget.
    pub fn health_check(&self) -> Duration {
        Duration::from_millis(self.health_check_ms)
    }
}

/// Retry and escalation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Attempts per action request
    pub max_attempts: u32,
    /// Backoff before the second attempt in milliseconds
    pub base_delay_ms: u64,
    /// Backoff cap in milliseconds
    pub max_delay_ms: u64,
    /// Consecutive failed requests before the session is recreated
    pub escalation_threshold: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            escalation_threshold: 3,
        }
    }
}

/// Screenshot artifact settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactSettings {
    /// Directory screenshots are written to
    pub screenshot_dir: PathBuf,
    /// Capture a screenshot when an element action finally fails
    pub screenshot_on_error: bool,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            screenshot_dir: PathBuf::from("screenshots"),
            screenshot_on_error: true,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
