//! W3C WebDriver HTTP backend.
//!
//! Talks to a running driver server (chromedriver, geckodriver, msedgedriver,
//! safaridriver). Only the handful of endpoints the engine needs are covered.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;

use webpilot_core::{Error, Result, SessionConfig};

use crate::backend::{Backend, BrowserSession, ElementRef, ElementState};
use crate::wire::{self, NewSessionValue, WireError, WireResponse};

/// Extra time allowed on top of a command's own budget before the HTTP call
/// itself is abandoned.
const REQUEST_SLACK: Duration = Duration::from_secs(5);

/// Default per-request budget for element commands.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Backend that creates sessions on a WebDriver server.
#[derive(Debug, Clone)]
pub struct WebDriverBackend {
    client: Client,
    endpoint: Url,
}

impl WebDriverBackend {
    /// Create a backend for the driver listening at `endpoint`.
    pub fn new(endpoint: &str) -> Result<Self> {
        let mut endpoint = Url::parse(endpoint)
            .map_err(|e| Error::Config(format!("invalid WebDriver URL '{endpoint}': {e}")))?;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        // Drivers listen on loopback or a grid host, never behind HTTP_PROXY
        let client = Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, endpoint })
    }

    /// Driver endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Backend for WebDriverBackend {
    fn name(&self) -> &str {
        "webdriver"
    }

    async fn connect(&self, config: &SessionConfig) -> Result<Box<dyn BrowserSession>> {
        info!(
            "Creating WebDriver session: endpoint={}, browser={}, headless={}",
            self.endpoint, config.backend, config.headless
        );

        let body = wire::new_session_body(config);
        let url = self
            .endpoint
            .join("session")
            .map_err(|e| Error::SessionInit(e.to_string()))?;

        let value = send(
            &self.client,
            Method::POST,
            url,
            Some(body),
            config.navigation_timeout + REQUEST_SLACK,
        )
        .await
        .map_err(|e| Error::SessionInit(e.to_string()))?;

        let created: NewSessionValue =
            serde_json::from_value(value).map_err(|e| Error::SessionInit(e.to_string()))?;

        let session_url = self
            .endpoint
            .join(&format!("session/{}", created.session_id))
            .map_err(|e| Error::SessionInit(e.to_string()))?
            .to_string();

        let session = WebDriverSession {
            client: self.client.clone(),
            session_id: created.session_id,
            base: session_url,
        };

        // Safari and Firefox ignore the window-size argument
        let (width, height) = config.window_size;
        if let Err(e) = session
            .command(
                Method::POST,
                "window/rect",
                Some(json!({ "width": width, "height": height })),
            )
            .await
        {
            warn!("Could not size browser window: {}", e);
        }

        info!("WebDriver session created: id={}", session.session_id);
        Ok(Box::new(session))
    }
}

/// One session on a WebDriver server.
#[derive(Debug)]
pub struct WebDriverSession {
    client: Client,
    session_id: String,
    base: String,
}

impl WebDriverSession {
    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        self.command_with_timeout(method, path, body, COMMAND_TIMEOUT)
            .await
    }

    async fn command_with_timeout(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        let raw = if path.is_empty() {
            self.base.clone()
        } else {
            format!("{}/{}", self.base, path)
        };
        let url = Url::parse(&raw)
            .map_err(|e| Error::InvalidInput(format!("bad command path '{path}': {e}")))?;
        send(&self.client, method, url, body, timeout).await
    }

    async fn element_command(
        &self,
        method: Method,
        element: &ElementRef,
        command: &str,
        body: Option<Value>,
    ) -> Result<Value> {
        let path = format!("element/{}/{}", element.id, command);
        self.command(method, &path, body).await
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    fn handle(&self) -> &str {
        &self.session_id
    }

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        debug!("WebDriver navigate: session={}, url={}", self.session_id, url);
        self.command_with_timeout(
            Method::POST,
            "url",
            Some(json!({ "url": url })),
            timeout + REQUEST_SLACK,
        )
        .await
        .map(|_| ())
        .map_err(|e| match e {
            Error::Timeout(_) => Error::Timeout(timeout.as_millis() as u64),
            other => other,
        })
    }

    async fn find_element(&self, selector: &str) -> Result<Option<ElementRef>> {
        let body = json!({ "using": "css selector", "value": selector });
        match self.command(Method::POST, "element", Some(body)).await {
            Ok(value) => Ok(wire::element_id(&value).map(|id| ElementRef::new(id, selector))),
            Err(Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn count_elements(&self, selector: &str) -> Result<usize> {
        let body = json!({ "using": "css selector", "value": selector });
        let value = self.command(Method::POST, "elements", Some(body)).await?;
        Ok(wire::element_count(&value))
    }

    async fn element_state(&self, element: &ElementRef) -> Result<ElementState> {
        let displayed = self
            .element_command(Method::GET, element, "displayed", None)
            .await?;
        let enabled = self
            .element_command(Method::GET, element, "enabled", None)
            .await?;

        Ok(ElementState {
            displayed: displayed.as_bool().unwrap_or(false),
            enabled: enabled.as_bool().unwrap_or(false),
        })
    }

    async fn click(&self, element: &ElementRef) -> Result<()> {
        self.element_command(Method::POST, element, "click", Some(json!({})))
            .await
            .map(|_| ())
    }

    async fn clear(&self, element: &ElementRef) -> Result<()> {
        self.element_command(Method::POST, element, "clear", Some(json!({})))
            .await
            .map(|_| ())
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()> {
        self.element_command(
            Method::POST,
            element,
            "value",
            Some(json!({ "text": text })),
        )
        .await
        .map(|_| ())
    }

    async fn text(&self, element: &ElementRef) -> Result<String> {
        let value = self
            .element_command(Method::GET, element, "text", None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attribute(&self, element: &ElementRef, name: &str) -> Result<Option<String>> {
        let value = self
            .element_command(Method::GET, element, &format!("attribute/{name}"), None)
            .await?;
        Ok(match value {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let value = self.command(Method::GET, "screenshot", None).await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| Error::Other("screenshot payload is not a string".to_string()))?;
        STANDARD
            .decode(encoded)
            .map_err(|e| Error::Other(format!("screenshot payload is not base64: {e}")))
    }

    async fn current_url(&self) -> Result<String> {
        let value = self.command(Method::GET, "url", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn title(&self) -> Result<String> {
        let value = self.command(Method::GET, "title", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn close(&self) -> Result<()> {
        info!("Deleting WebDriver session: id={}", self.session_id);
        self.command(Method::DELETE, "", None).await.map(|_| ())
    }
}

/// Send one WebDriver command and unwrap the `value` envelope.
async fn send(
    client: &Client,
    method: Method,
    url: Url,
    body: Option<Value>,
    timeout: Duration,
) -> Result<Value> {
    let mut request = client.request(method, url).timeout(timeout);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            Error::Timeout(timeout.as_millis() as u64)
        } else {
            Error::Unreachable(e.to_string())
        }
    })?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| Error::Unreachable(e.to_string()))?;

    if status.is_success() {
        let parsed: WireResponse<Value> = serde_json::from_str(&text)?;
        return Ok(parsed.value);
    }

    match serde_json::from_str::<WireResponse<WireError>>(&text) {
        Ok(parsed) => Err(parsed.value.into_error()),
        Err(_) if status == StatusCode::NOT_FOUND => {
            Err(Error::Unreachable(format!("endpoint not found: {text}")))
        }
        Err(_) => Err(Error::Other(format!("HTTP {status}: {text}"))),
    }
}
