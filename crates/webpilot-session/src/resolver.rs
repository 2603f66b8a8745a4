//! Element resolution across a list of candidate selectors.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use webpilot_core::{CandidateSelectors, Error, Result};
use webpilot_driver::{BrowserSession, ElementRef};

/// Default delay between two lookups of the same candidate.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Element located by [`SelectorResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// The element
    pub element: ElementRef,
    /// Position of the matching candidate in the list
    pub candidate_index: usize,
    /// Candidates polled, including the matching one
    pub candidates_tried: usize,
}

/// Polls candidate selectors in order under a shared budget.
///
/// Each candidate gets `remaining / candidates_left` at the moment it is
/// tried, so time not used by an early candidate carries over to later
/// ones.
#[derive(Debug, Clone)]
pub struct SelectorResolver {
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl Default for SelectorResolver {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl SelectorResolver {
    /// Create a resolver polling at `poll_interval`.
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort waits when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Poll interval.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Resolve the first satisfying candidate within `total_timeout`.
    ///
    /// With `require_interactable`, a present but hidden or disabled element
    /// keeps its candidate polling. A stale element counts as not found yet.
    /// Fails with `Error::NotFound` listing the candidates tried, or
    /// `Error::Cancelled` if cancelled while waiting.
    pub async fn resolve(
        &self,
        session: &dyn BrowserSession,
        candidates: &CandidateSelectors,
        total_timeout: Duration,
        require_interactable: bool,
    ) -> Result<Resolved> {
        let start = Instant::now();
        let deadline = start + total_timeout;
        let count = candidates.len();
        let mut tried: Vec<String> = Vec::with_capacity(count);

        for (index, selector) in candidates.as_slice().iter().enumerate() {
            let now = Instant::now();
            if index > 0 && now >= deadline {
                break;
            }

            let share = deadline.saturating_duration_since(now) / (count - index) as u32;
            let sub_deadline = now + share;
            tried.push(selector.clone());
            debug!(
                "Resolving candidate {}/{} '{}' with {:?}",
                index + 1,
                count,
                selector,
                share
            );

            loop {
                if let Some(element) = self.probe(session, selector, require_interactable).await? {
                    debug!(
                        "Resolved '{}' after {:?}",
                        selector,
                        Instant::now().duration_since(start)
                    );
                    return Ok(Resolved {
                        element,
                        candidate_index: index,
                        candidates_tried: tried.len(),
                    });
                }

                let now = Instant::now();
                if now >= sub_deadline {
                    break;
                }
                self.pause(self.poll_interval.min(sub_deadline - now)).await?;
            }
        }

        Err(Error::NotFound {
            candidates: tried,
            elapsed_ms: Instant::now().duration_since(start).as_millis() as u64,
        })
    }

    async fn probe(
        &self,
        session: &dyn BrowserSession,
        selector: &str,
        require_interactable: bool,
    ) -> Result<Option<ElementRef>> {
        let element = match session.find_element(selector).await {
            Ok(Some(element)) => element,
            Ok(None) => return Ok(None),
            Err(Error::StaleElement(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        if !require_interactable {
            return Ok(Some(element));
        }

        match session.element_state(&element).await {
            Ok(state) if state.is_interactable() => Ok(Some(element)),
            Ok(state) => {
                trace!("'{}' present but not interactable: {:?}", selector, state);
                Ok(None)
            }
            Err(Error::StaleElement(_)) => {
                trace!("'{}' went stale, polling again", selector);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn pause(&self, duration: Duration) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
