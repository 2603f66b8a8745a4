//! Screenshot artifacts on disk.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::debug;

use webpilot_core::{ArtifactSettings, Result};

/// Writes screenshots under one directory with timestamped names.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    screenshot_on_error: bool,
}

impl ArtifactStore {
    /// Store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>, screenshot_on_error: bool) -> Self {
        Self {
            dir: dir.into(),
            screenshot_on_error,
        }
    }

    /// Target directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether failed element actions should be captured.
    pub fn screenshot_on_error(&self) -> bool {
        self.screenshot_on_error
    }

    /// Write PNG bytes to `screenshot_<YYYYmmdd_HHMMSS_mmm>.png`.
    ///
    /// The directory is created on demand. A name already taken within the
    /// same millisecond gets a numeric suffix.
    pub fn save_screenshot(&self, png: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S_%3f").to_string();
        let mut path = self.dir.join(format!("screenshot_{stamp}.png"));
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(format!("screenshot_{stamp}_{n}.png"));
            n += 1;
        }

        std::fs::write(&path, png)?;
        debug!("Wrote {} bytes to {}", png.len(), path.display());
        Ok(path)
    }
}

impl From<&ArtifactSettings> for ArtifactStore {
    fn from(settings: &ArtifactSettings) -> Self {
        Self::new(settings.screenshot_dir.clone(), settings.screenshot_on_error)
    }
}
