//! W3C WebDriver wire types and error mapping.

use serde::Deserialize;
use serde_json::{json, Value};

use webpilot_core::{BackendKind, Error, SessionConfig};

/// Key under which W3C drivers return element references.
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f15ed2a8d6f";

/// Envelope every WebDriver response is wrapped in.
#[derive(Debug, Deserialize)]
pub struct WireResponse<T> {
    /// Payload
    pub value: T,
}

/// Error payload returned with non-2xx statuses.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct WireError {
    /// Error code, e.g. "no such element"
    pub error: String,
    /// Driver-supplied message
    #[serde(default)]
    pub message: String,
}

impl WireError {
    /// Map the error code onto the engine's error taxonomy.
    pub fn into_error(self) -> Error {
        let detail = if self.message.is_empty() {
            self.error.clone()
        } else {
            format!("{}: {}", self.error, first_line(&self.message))
        };

        match self.error.as_str() {
            "no such element" => Error::NotFound {
                candidates: vec![],
                elapsed_ms: 0,
            },
            "stale element reference" => Error::StaleElement(detail),
            "element click intercepted" | "element not interactable" => {
                Error::Interaction(detail)
            }
            "timeout" | "script timeout" => Error::Timeout(0),
            "invalid session id" | "no such window" | "session not created" => {
                Error::Unreachable(detail)
            }
            "invalid argument" | "invalid selector" => Error::InvalidInput(detail),
            _ => Error::Other(detail),
        }
    }
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or(message)
}

/// Payload of a successful "New Session" command.
#[derive(Debug, Deserialize)]
pub struct NewSessionValue {
    /// Driver-assigned session id
    #[serde(rename = "sessionId")]
    pub session_id: String,
    /// Negotiated capabilities
    #[serde(default)]
    pub capabilities: Value,
}

/// Extract an element id from a "Find Element" payload.
pub fn element_id(value: &Value) -> Option<String> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Count element references in a "Find Elements" payload.
pub fn element_count(value: &Value) -> usize {
    value
        .as_array()
        .map_or(0, |items| items.iter().filter(|v| element_id(v).is_some()).count())
}

/// Build the "New Session" request body for a session configuration.
pub fn new_session_body(config: &SessionConfig) -> Value {
    let (width, height) = config.window_size;
    let window_arg = format!("--window-size={width},{height}");

    let mut always_match = json!({
        "browserName": config.backend.browser_name(),
        "timeouts": {
            "pageLoad": config.navigation_timeout.as_millis() as u64,
            "implicit": 0,
        },
    });

    let mut args: Vec<String> = Vec::new();
    if config.headless {
        args.push("--headless".to_string());
    }

    match config.backend {
        BackendKind::Chrome => {
            if config.headless {
                args.push("--disable-gpu".to_string());
            }
            args.push("--no-sandbox".to_string());
            args.push("--disable-dev-shm-usage".to_string());
            args.push(window_arg);
            always_match["goog:chromeOptions"] = json!({ "args": args });
        }
        BackendKind::Edge => {
            args.push(window_arg);
            always_match["ms:edgeOptions"] = json!({ "args": args });
        }
        BackendKind::Firefox => {
            always_match["moz:firefoxOptions"] = json!({ "args": args });
        }
        // safaridriver has no headless mode
        BackendKind::Safari => {}
    }

    json!({ "capabilities": { "alwaysMatch": always_match } })
}
