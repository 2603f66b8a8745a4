//! Single-attempt execution of action requests.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use webpilot_core::{
    ActionRequest, ActionResult, ActionValue, CandidateSelectors, Error, PageAnalysis, Result,
    SessionConfig,
};
use webpilot_driver::BrowserSession;

use crate::resolver::{Resolved, SelectorResolver};

/// Performs one attempt of an [`ActionRequest`] against a session.
///
/// Automation failures never escape as `Err`; they are encoded in the
/// returned [`ActionResult`].
#[derive(Debug, Clone)]
pub struct ActionExecutor {
    resolver: SelectorResolver,
    navigation_timeout: Duration,
    element_timeout: Duration,
    cancel: CancellationToken,
}

impl ActionExecutor {
    /// Create an executor using the session's timeouts.
    pub fn new(config: &SessionConfig, resolver: SelectorResolver) -> Self {
        Self {
            resolver,
            navigation_timeout: config.navigation_timeout,
            element_timeout: config.element_timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort resolver and navigation waits when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.resolver = self.resolver.with_cancellation(cancel.clone());
        self.cancel = cancel;
        self
    }

    /// Run one attempt.
    pub async fn execute(&self, session: &dyn BrowserSession, request: &ActionRequest) -> ActionResult {
        if let ActionRequest::Navigate { url } = request {
            if let Err(e) = validate_url(url) {
                return ActionResult::failed(&e, Duration::ZERO, 0);
            }
        }

        let mut tried = 0;
        let start = Instant::now();
        let outcome = self.perform(session, request, &mut tried).await;
        let elapsed = Instant::now().duration_since(start);

        match outcome {
            Ok(value) => ActionResult::succeeded(value, elapsed, tried),
            Err(e) => {
                debug!("{} on '{}' failed: {}", request.kind(), request.target(), e);
                if let Error::NotFound { candidates, .. } = &e {
                    tried = candidates.len();
                }
                ActionResult::failed(&e, elapsed, tried)
            }
        }
    }

    async fn perform(
        &self,
        session: &dyn BrowserSession,
        request: &ActionRequest,
        tried: &mut usize,
    ) -> Result<Option<ActionValue>> {
        match request {
            ActionRequest::Navigate { url } => {
                self.navigate(session, url).await?;
                let title = session.title().await?;
                Ok(Some(ActionValue::Page {
                    url: url.clone(),
                    title,
                }))
            }
            ActionRequest::Find { selectors, timeout } => {
                let found = self.locate(session, selectors, *timeout, false, tried).await?;
                Ok(Some(match session.text(&found.element).await {
                    Ok(text) => ActionValue::Text(text),
                    Err(_) => ActionValue::Present(true),
                }))
            }
            ActionRequest::Click { selectors, timeout } => {
                let found = self.locate(session, selectors, *timeout, true, tried).await?;
                session.click(&found.element).await?;
                Ok(None)
            }
            ActionRequest::Type {
                selectors,
                text,
                clear_first,
                timeout,
            } => {
                let found = self.locate(session, selectors, *timeout, true, tried).await?;
                if *clear_first {
                    session.clear(&found.element).await?;
                }
                session.send_keys(&found.element, text).await?;
                Ok(None)
            }
            ActionRequest::Read {
                selectors,
                attribute,
                timeout,
            } => {
                let found = self.locate(session, selectors, *timeout, false, tried).await?;
                match attribute {
                    Some(name) => Ok(Some(
                        match session.attribute(&found.element, name).await? {
                            Some(value) => ActionValue::Text(value),
                            None => ActionValue::Present(false),
                        },
                    )),
                    None => Ok(Some(ActionValue::Text(session.text(&found.element).await?))),
                }
            }
            ActionRequest::PressKey {
                selectors,
                key,
                timeout,
            } => {
                let found = self.locate(session, selectors, *timeout, true, tried).await?;
                session
                    .send_keys(&found.element, &key.to_webdriver_text())
                    .await?;
                Ok(None)
            }
            ActionRequest::Screenshot => Ok(Some(ActionValue::Screenshot(session.screenshot().await?))),
            ActionRequest::PageInfo => {
                let url = session.current_url().await?;
                let title = session.title().await?;
                Ok(Some(ActionValue::Page { url, title }))
            }
            ActionRequest::Analyze => Ok(Some(ActionValue::Analysis(PageAnalysis {
                url: session.current_url().await?,
                title: session.title().await?,
                links: session.count_elements("a").await?,
                buttons: session.count_elements("button").await?,
                inputs: session.count_elements("input").await?,
                forms: session.count_elements("form").await?,
                headings: session.count_elements("h1,h2,h3,h4,h5,h6").await?,
                images: session.count_elements("img").await?,
            }))),
        }
    }

    async fn locate(
        &self,
        session: &dyn BrowserSession,
        selectors: &CandidateSelectors,
        timeout: Option<Duration>,
        require_interactable: bool,
        tried: &mut usize,
    ) -> Result<Resolved> {
        let budget = timeout.unwrap_or(self.element_timeout);
        let found = self
            .resolver
            .resolve(session, selectors, budget, require_interactable)
            .await?;
        *tried = found.candidates_tried;
        Ok(found)
    }

    async fn navigate(&self, session: &dyn BrowserSession, url: &str) -> Result<()> {
        let budget = self.navigation_timeout;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            loaded = tokio::time::timeout(budget, session.navigate(url, budget)) => match loaded {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(budget.as_millis() as u64)),
            },
        }
    }
}

/// Check that `url` is an absolute http(s) URL with a host.
pub fn validate_url(url: &str) -> Result<Url> {
    let parsed =
        Url::parse(url).map_err(|e| Error::InvalidInput(format!("invalid URL '{url}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::InvalidInput(format!(
            "refusing to navigate to '{url}': only http and https are allowed"
        )));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(Error::InvalidInput(format!("URL '{url}' has no host")));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use webpilot_core::{FailureKind, Key};
    use webpilot_driver::{Backend, FakeBackend, FakeElement};

    fn executor() -> ActionExecutor {
        ActionExecutor::new(&SessionConfig::default(), SelectorResolver::default())
    }

    fn one(selector: &str) -> CandidateSelectors {
        CandidateSelectors::single(selector).unwrap()
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com").is_ok());
        assert!(validate_url("http://localhost:8080/path?q=1").is_ok());
        assert!(validate_url("file:///etc/passwd").is_err());
        assert!(validate_url("javascript:alert(1)").is_err());
        assert!(validate_url("example.com").is_err());
        assert!(validate_url("").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigate_reports_elapsed_and_title() {
        let backend = FakeBackend::new()
            .with_navigate_delay(Duration::from_millis(200))
            .with_title("Example Domain");
        let session = backend.connect(&SessionConfig::default()).await.unwrap();

        let result = executor()
            .execute(session.as_ref(), &ActionRequest::navigate("https://example.com"))
            .await;

        assert!(result.success);
        assert_eq!(result.elapsed, Duration::from_millis(200));
        assert_eq!(
            result.value,
            Some(ActionValue::Page {
                url: "https://example.com".to_string(),
                title: "Example Domain".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_invalid_url_never_reaches_session() {
        let backend = FakeBackend::new();
        let session = backend.connect(&SessionConfig::default()).await.unwrap();

        let result = executor()
            .execute(session.as_ref(), &ActionRequest::navigate("ftp://example.com"))
            .await;

        assert!(!result.success);
        assert_eq!(result.failure_kind(), Some(FailureKind::InvalidInput));
        assert_eq!(result.elapsed, Duration::ZERO);
        assert_eq!(backend.stats().navigations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_timeout_is_a_result() {
        let backend = FakeBackend::new();
        backend.fail_navigations(1);
        let session = backend.connect(&SessionConfig::default()).await.unwrap();

        let result = executor()
            .execute(session.as_ref(), &ActionRequest::navigate("https://example.com"))
            .await;

        assert_eq!(result.failure_kind(), Some(FailureKind::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_type_clears_then_sends() {
        let backend = FakeBackend::new().with_element("#q", FakeElement::new("old"));
        let session = backend.connect(&SessionConfig::default()).await.unwrap();
        let exec = executor();

        let result = exec
            .execute(session.as_ref(), &ActionRequest::type_text(one("#q"), "rust"))
            .await;
        assert!(result.success);
        assert_eq!(result.candidates_tried, 1);

        let read = exec.execute(session.as_ref(), &ActionRequest::read(one("#q"))).await;
        assert_eq!(read.value, Some(ActionValue::Text("rust".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_failure_is_interaction() {
        let backend =
            FakeBackend::new().with_element("#btn", FakeElement::new("Go").failing_clicks(1));
        let session = backend.connect(&SessionConfig::default()).await.unwrap();

        let result = executor()
            .execute(session.as_ref(), &ActionRequest::click(one("#btn")))
            .await;
        assert_eq!(result.failure_kind(), Some(FailureKind::Interaction));
        assert_eq!(backend.stats().clicks(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_element_reports_candidates() {
        let backend = FakeBackend::new();
        let session = backend.connect(&SessionConfig::default()).await.unwrap();
        let selectors = CandidateSelectors::new(["#a", "#b"]).unwrap();

        let result = executor()
            .execute(
                session.as_ref(),
                &ActionRequest::click(selectors).with_timeout(Duration::from_secs(1)),
            )
            .await;

        assert_eq!(result.failure_kind(), Some(FailureKind::NotFound));
        assert_eq!(result.candidates_tried, 2);
        assert_eq!(result.elapsed, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_attribute_and_press_key() {
        let backend = FakeBackend::new()
            .with_element("a.home", FakeElement::new("Home").with_attribute("href", "/"));
        let session = backend.connect(&SessionConfig::default()).await.unwrap();
        let exec = executor();

        let read = exec
            .execute(
                session.as_ref(),
                &ActionRequest::Read {
                    selectors: one("a.home"),
                    attribute: Some("href".to_string()),
                    timeout: None,
                },
            )
            .await;
        assert_eq!(read.value, Some(ActionValue::Text("/".to_string())));

        let press = exec
            .execute(
                session.as_ref(),
                &ActionRequest::PressKey {
                    selectors: one("a.home"),
                    key: Key::Enter,
                    timeout: None,
                },
            )
            .await;
        assert!(press.success);
        assert_eq!(backend.stats().typed(), vec!["\u{E007}".to_string()]);
    }

    #[tokio::test]
    async fn test_screenshot_and_page_info() {
        let backend = FakeBackend::new().with_title("Blank");
        let session = backend.connect(&SessionConfig::default()).await.unwrap();
        let exec = executor();

        let shot = exec.execute(session.as_ref(), &ActionRequest::Screenshot).await;
        assert!(matches!(shot.value, Some(ActionValue::Screenshot(ref png)) if png.starts_with(b"\x89PNG")));

        let info = exec.execute(session.as_ref(), &ActionRequest::PageInfo).await;
        assert_eq!(
            info.value,
            Some(ActionValue::Page {
                url: "about:blank".to_string(),
                title: "Blank".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_analyze_counts_page_elements() {
        let backend = FakeBackend::new()
            .with_title("Example Domain")
            .with_count("a", 3)
            .with_count("input", 2)
            .with_count("h1,h2,h3,h4,h5,h6", 1)
            .with_element("form", FakeElement::new(""));
        let session = backend.connect(&SessionConfig::default()).await.unwrap();

        let result = executor().execute(session.as_ref(), &ActionRequest::Analyze).await;
        assert!(result.success);
        assert_eq!(
            result.value,
            Some(ActionValue::Analysis(PageAnalysis {
                url: "about:blank".to_string(),
                title: "Example Domain".to_string(),
                links: 3,
                buttons: 0,
                inputs: 2,
                forms: 1,
                headings: 1,
                images: 0,
            }))
        );
    }

    #[tokio::test]
    async fn test_analyze_on_dead_session_is_unreachable() {
        let backend = FakeBackend::new();
        let session = backend.connect(&SessionConfig::default()).await.unwrap();
        backend.set_unreachable(true);

        let result = executor().execute(session.as_ref(), &ActionRequest::Analyze).await;
        assert_eq!(result.failure_kind(), Some(FailureKind::Unreachable));
    }
}
