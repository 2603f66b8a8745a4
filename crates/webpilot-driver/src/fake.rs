//! Scripted in-memory backend.
//!
//! Drives the engine without a browser. Elements appear, become
//! interactable, or go stale on a schedule measured from session creation
//! with `tokio::time`, so tests running on a paused clock are deterministic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use webpilot_core::{Error, Result, SessionConfig};

use crate::backend::{Backend, BrowserSession, ElementRef, ElementState};

/// Scripted behaviour of one element.
#[derive(Debug, Clone)]
pub struct FakeElement {
    text: String,
    attributes: HashMap<String, String>,
    appears_after: Duration,
    interactable_after: Option<Duration>,
    stale_probes: u32,
    click_failures: u32,
    click_delay: Duration,
}

impl FakeElement {
    /// Element present and interactable from the start.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attributes: HashMap::new(),
            appears_after: Duration::ZERO,
            interactable_after: Some(Duration::ZERO),
            stale_probes: 0,
            click_failures: 0,
            click_delay: Duration::ZERO,
        }
    }

    /// Element is absent until `delay` after session creation.
    pub fn appears_after(mut self, delay: Duration) -> Self {
        self.appears_after = delay;
        self
    }

    /// Element is displayed but not interactable until `delay`.
    pub fn interactable_after(mut self, delay: Duration) -> Self {
        self.interactable_after = Some(delay);
        self
    }

    /// Element never becomes interactable.
    pub fn never_interactable(mut self) -> Self {
        self.interactable_after = None;
        self
    }

    /// The first `probes` state checks report a detached element.
    pub fn stale_for(mut self, probes: u32) -> Self {
        self.stale_probes = probes;
        self
    }

    /// The first `count` clicks fail as intercepted.
    pub fn failing_clicks(mut self, count: u32) -> Self {
        self.click_failures = count;
        self
    }

    /// Each click takes `delay` before it lands.
    pub fn click_delay(mut self, delay: Duration) -> Self {
        self.click_delay = delay;
        self
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// Mutable script shared by every session the backend creates.
#[derive(Debug, Default)]
struct FakeScript {
    elements: HashMap<String, FakeElement>,
    counts: HashMap<String, usize>,
    navigate_delay: Duration,
    navigate_failures: u32,
    connect_failures: u32,
    unreachable: bool,
    title: String,
}

/// Call counters, shared across sessions and recreations.
#[derive(Debug, Default)]
pub struct FakeStats {
    connects: AtomicU32,
    closes: AtomicU32,
    navigations: AtomicU32,
    clicks: AtomicU32,
    screenshots: AtomicU32,
    lookups: Mutex<HashMap<String, u32>>,
    typed: Mutex<Vec<String>>,
}

impl FakeStats {
    /// Successful and failed handshakes.
    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    /// Sessions closed.
    pub fn closes(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }

    /// Navigation calls.
    pub fn navigations(&self) -> u32 {
        self.navigations.load(Ordering::SeqCst)
    }

    /// Click calls.
    pub fn clicks(&self) -> u32 {
        self.clicks.load(Ordering::SeqCst)
    }

    /// Screenshot calls.
    pub fn screenshots(&self) -> u32 {
        self.screenshots.load(Ordering::SeqCst)
    }

    /// Lookups performed for one selector.
    pub fn lookups(&self, selector: &str) -> u32 {
        lock(&self.lookups).get(selector).copied().unwrap_or(0)
    }

    /// Text sent through `send_keys`, in order.
    pub fn typed(&self) -> Vec<String> {
        lock(&self.typed).clone()
    }

    /// Session-facing calls that perform a primitive action.
    pub fn primitive_calls(&self) -> u32 {
        self.navigations() + self.clicks() + self.screenshots() + lock(&self.typed).len() as u32
    }
}

/// Backend whose sessions follow a shared script.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    script: Arc<Mutex<FakeScript>>,
    stats: Arc<FakeStats>,
}

impl FakeBackend {
    /// Empty page, instant navigation.
    pub fn new() -> Self {
        let backend = Self::default();
        lock(&backend.script).title = "Fake Page".to_string();
        backend
    }

    /// Register an element under a selector.
    pub fn with_element(self, selector: impl Into<String>, element: FakeElement) -> Self {
        lock(&self.script).elements.insert(selector.into(), element);
        self
    }

    /// `selector` matches `count` elements when counted.
    pub fn with_count(self, selector: impl Into<String>, count: usize) -> Self {
        lock(&self.script).counts.insert(selector.into(), count);
        self
    }

    /// Navigations take `delay`.
    pub fn with_navigate_delay(self, delay: Duration) -> Self {
        lock(&self.script).navigate_delay = delay;
        self
    }

    /// Set the document title.
    pub fn with_title(self, title: impl Into<String>) -> Self {
        lock(&self.script).title = title.into();
        self
    }

    /// The next `count` navigations time out.
    pub fn fail_navigations(&self, count: u32) {
        lock(&self.script).navigate_failures = count;
    }

    /// The next `count` handshakes fail.
    pub fn fail_connects(&self, count: u32) {
        lock(&self.script).connect_failures = count;
    }

    /// Make every live session stop answering.
    pub fn set_unreachable(&self, unreachable: bool) {
        lock(&self.script).unreachable = unreachable;
    }

    /// Call counters.
    pub fn stats(&self) -> Arc<FakeStats> {
        Arc::clone(&self.stats)
    }
}

#[async_trait]
impl Backend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    async fn connect(&self, config: &SessionConfig) -> Result<Box<dyn BrowserSession>> {
        let n = self.stats.connects.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut script = lock(&self.script);
            if script.connect_failures > 0 {
                script.connect_failures -= 1;
                return Err(Error::SessionInit("fake handshake refused".to_string()));
            }
            // A fresh browser answers again
            script.unreachable = false;
        }

        debug!("Fake session {} created for {}", n, config.backend);
        Ok(Box::new(FakeSession {
            handle: format!("fake-{n}"),
            started: Instant::now(),
            script: Arc::clone(&self.script),
            stats: Arc::clone(&self.stats),
            current_url: Mutex::new("about:blank".to_string()),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Session created by [`FakeBackend`].
#[derive(Debug)]
pub struct FakeSession {
    handle: String,
    started: Instant,
    script: Arc<Mutex<FakeScript>>,
    stats: Arc<FakeStats>,
    current_url: Mutex<String>,
    closed: AtomicBool,
}

impl FakeSession {
    fn ensure_live(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Unreachable(format!("session {} is closed", self.handle)));
        }
        if lock(&self.script).unreachable {
            return Err(Error::Unreachable(format!(
                "session {} stopped answering",
                self.handle
            )));
        }
        Ok(())
    }

    fn age(&self) -> Duration {
        Instant::now().duration_since(self.started)
    }

    fn element<T>(&self, element: &ElementRef, f: impl FnOnce(&mut FakeElement) -> T) -> Result<T> {
        let mut script = lock(&self.script);
        let found = script
            .elements
            .get_mut(&element.selector)
            .ok_or_else(|| Error::StaleElement(element.selector.clone()))?;
        Ok(f(found))
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    fn handle(&self) -> &str {
        &self.handle
    }

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        self.ensure_live()?;
        self.stats.navigations.fetch_add(1, Ordering::SeqCst);

        let (delay, fail) = {
            let mut script = lock(&self.script);
            let fail = script.navigate_failures > 0;
            if fail && script.navigate_failures != u32::MAX {
                script.navigate_failures -= 1;
            }
            (script.navigate_delay, fail)
        };

        if fail || delay > timeout {
            tokio::time::sleep(timeout).await;
            return Err(Error::Timeout(timeout.as_millis() as u64));
        }

        tokio::time::sleep(delay).await;
        *lock(&self.current_url) = url.to_string();
        Ok(())
    }

    async fn find_element(&self, selector: &str) -> Result<Option<ElementRef>> {
        self.ensure_live()?;
        *lock(&self.stats.lookups)
            .entry(selector.to_string())
            .or_insert(0) += 1;

        let age = self.age();
        let script = lock(&self.script);
        Ok(script
            .elements
            .get(selector)
            .filter(|e| age >= e.appears_after)
            .map(|_| ElementRef::new(format!("{}:{}", self.handle, selector), selector)))
    }

    async fn count_elements(&self, selector: &str) -> Result<usize> {
        self.ensure_live()?;
        let age = self.age();
        let script = lock(&self.script);
        if let Some(count) = script.counts.get(selector) {
            return Ok(*count);
        }
        // Registered elements count once they have appeared
        Ok(script
            .elements
            .get(selector)
            .filter(|e| age >= e.appears_after)
            .map_or(0, |_| 1))
    }

    async fn element_state(&self, element: &ElementRef) -> Result<ElementState> {
        self.ensure_live()?;
        let age = self.age();
        let stale = self.element(element, |e| {
            if e.stale_probes > 0 {
                e.stale_probes -= 1;
                return None;
            }
            let interactable = e.interactable_after.is_some_and(|after| age >= after);
            Some(ElementState {
                displayed: true,
                enabled: interactable,
            })
        })?;
        stale.ok_or_else(|| Error::StaleElement(element.selector.clone()))
    }

    async fn click(&self, element: &ElementRef) -> Result<()> {
        self.ensure_live()?;
        self.stats.clicks.fetch_add(1, Ordering::SeqCst);
        let delay = self.element(element, |e| e.click_delay)?;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let intercepted = self.element(element, |e| {
            if e.click_failures > 0 {
                e.click_failures -= 1;
                true
            } else {
                false
            }
        })?;
        if intercepted {
            return Err(Error::Interaction(format!(
                "element click intercepted: {}",
                element.selector
            )));
        }
        Ok(())
    }

    async fn clear(&self, element: &ElementRef) -> Result<()> {
        self.ensure_live()?;
        self.element(element, |e| e.text.clear())
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()> {
        self.ensure_live()?;
        lock(&self.stats.typed).push(text.to_string());
        self.element(element, |e| e.text.push_str(text))
    }

    async fn text(&self, element: &ElementRef) -> Result<String> {
        self.ensure_live()?;
        self.element(element, |e| e.text.clone())
    }

    async fn attribute(&self, element: &ElementRef, name: &str) -> Result<Option<String>> {
        self.ensure_live()?;
        self.element(element, |e| e.attributes.get(name).cloned())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.ensure_live()?;
        self.stats.screenshots.fetch_add(1, Ordering::SeqCst);
        Ok(b"\x89PNG\r\n\x1a\nfake".to_vec())
    }

    async fn current_url(&self) -> Result<String> {
        self.ensure_live()?;
        Ok(lock(&self.current_url).clone())
    }

    async fn title(&self) -> Result<String> {
        self.ensure_live()?;
        Ok(lock(&self.script).title.clone())
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.stats.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
