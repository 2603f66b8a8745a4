//! Backend and session traits.
//!
//! A [`Backend`] creates sessions; a [`BrowserSession`] is one live
//! connection through which every page and element operation flows. Each
//! method is a single round trip: nothing here waits for elements or retries.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use webpilot_core::{Result, SessionConfig};

/// Opaque reference to an element located in the current page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef {
    /// Backend-assigned element id
    pub id: String,
    /// Selector the element was located with
    pub selector: String,
}

impl ElementRef {
    /// Create a new element reference.
    pub fn new(id: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            selector: selector.into(),
        }
    }
}

/// Interactability probe of a located element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElementState {
    /// Rendered and visible
    pub displayed: bool,
    /// Not disabled
    pub enabled: bool,
}

impl ElementState {
    /// Able to receive a click or keyboard input.
    pub fn is_interactable(&self) -> bool {
        self.displayed && self.enabled
    }
}

/// Factory for automation sessions.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    /// Perform one session handshake.
    ///
    /// Connection-level retries belong to the caller.
    async fn connect(&self, config: &SessionConfig) -> Result<Box<dyn BrowserSession>>;
}

/// One live connection to a browser.
#[async_trait]
pub trait BrowserSession: Send + Sync + Debug {
    /// Backend-assigned session handle.
    fn handle(&self) -> &str;

    /// Load a URL and wait for the document to finish loading.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Look up the first element matching a CSS selector.
    ///
    /// Returns `Ok(None)` when nothing matches right now.
    async fn find_element(&self, selector: &str) -> Result<Option<ElementRef>>;

    /// Number of elements currently matching a CSS selector.
    async fn count_elements(&self, selector: &str) -> Result<usize>;

    /// Probe whether an element is displayed and enabled.
    ///
    /// Fails with `Error::StaleElement` when the element has detached.
    async fn element_state(&self, element: &ElementRef) -> Result<ElementState>;

    /// Click an element.
    async fn click(&self, element: &ElementRef) -> Result<()>;

    /// Clear an editable element.
    async fn clear(&self, element: &ElementRef) -> Result<()>;

    /// Send text (or WebDriver key code points) to an element.
    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()>;

    /// Visible text of an element.
    async fn text(&self, element: &ElementRef) -> Result<String>;

    /// Attribute value of an element.
    async fn attribute(&self, element: &ElementRef, name: &str) -> Result<Option<String>>;

    /// PNG screenshot of the current viewport.
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// URL of the current page.
    async fn current_url(&self) -> Result<String>;

    /// Title of the current page.
    async fn title(&self) -> Result<String>;

    /// Tear the session down on the backend.
    async fn close(&self) -> Result<()>;
}
