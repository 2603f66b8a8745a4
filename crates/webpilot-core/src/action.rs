//! Action requests and results.
//!
//! An [`ActionRequest`] describes one primitive operation against the live
//! session. Each variant carries exactly the payload its kind needs, so adding
//! a primitive is a new variant plus the match arms the compiler asks for.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, FailureKind, Key, Result};

/// Ordered, non-empty list of equivalent locators for one logical element.
///
/// Earlier candidates are preferred when time remains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct CandidateSelectors(Vec<String>);

impl CandidateSelectors {
    /// Build a candidate list, rejecting an empty list or blank entries.
    pub fn new<I, S>(candidates: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let candidates: Vec<String> = candidates
            .into_iter()
            .map(|s| s.into().trim().to_string())
            .collect();

        if candidates.is_empty() {
            return Err(Error::InvalidInput("selector list is empty".to_string()));
        }
        if candidates.iter().any(|c| c.is_empty()) {
            return Err(Error::InvalidInput(
                "selector list contains a blank selector".to_string(),
            ));
        }

        Ok(Self(candidates))
    }

    /// Single-candidate list.
    pub fn single(selector: impl Into<String>) -> Result<Self> {
        Self::new([selector])
    }

    /// Candidates in preference order.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Number of candidates (always at least one).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Never true for a constructed list.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Most preferred candidate.
    pub fn primary(&self) -> &str {
        &self.0[0]
    }
}

impl TryFrom<Vec<String>> for CandidateSelectors {
    type Error = Error;

    fn try_from(value: Vec<String>) -> Result<Self> {
        Self::new(value)
    }
}

impl From<CandidateSelectors> for Vec<String> {
    fn from(value: CandidateSelectors) -> Self {
        value.0
    }
}

impl std::fmt::Display for CandidateSelectors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(" || "))
    }
}

/// One primitive operation against the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionRequest {
    /// Load an absolute http(s) URL
    Navigate {
        /// Target URL
        url: String,
    },
    /// Check that an element is present
    Find {
        /// Element locators
        selectors: CandidateSelectors,
        /// Resolution budget (session default when absent)
        timeout: Option<Duration>,
    },
    /// Click an interactable element
    Click {
        /// Element locators
        selectors: CandidateSelectors,
        /// Resolution budget (session default when absent)
        timeout: Option<Duration>,
    },
    /// Type text into an interactable element
    Type {
        /// Element locators
        selectors: CandidateSelectors,
        /// Text to send
        text: String,
        /// Clear the field first
        clear_first: bool,
        /// Resolution budget (session default when absent)
        timeout: Option<Duration>,
    },
    /// Extract visible text or an attribute
    Read {
        /// Element locators
        selectors: CandidateSelectors,
        /// Attribute to read instead of the text
        attribute: Option<String>,
        /// Resolution budget (session default when absent)
        timeout: Option<Duration>,
    },
    /// Send a named key to an interactable element
    PressKey {
        /// Element locators
        selectors: CandidateSelectors,
        /// Key to press
        key: Key,
        /// Resolution budget (session default when absent)
        timeout: Option<Duration>,
    },
    /// Capture the current viewport
    Screenshot,
    /// Report the current URL and title
    PageInfo,
    /// Summarize the current page: identity plus element counts
    Analyze,
}

impl ActionRequest {
    /// Navigate to a URL.
    pub fn navigate(url: impl Into<String>) -> Self {
        ActionRequest::Navigate { url: url.into() }
    }

    /// Click the first resolvable candidate.
    pub fn click(selectors: CandidateSelectors) -> Self {
        ActionRequest::Click {
            selectors,
            timeout: None,
        }
    }

    /// Type into the first resolvable candidate, clearing it first.
    pub fn type_text(selectors: CandidateSelectors, text: impl Into<String>) -> Self {
        ActionRequest::Type {
            selectors,
            text: text.into(),
            clear_first: true,
            timeout: None,
        }
    }

    /// Read the text of the first resolvable candidate.
    pub fn read(selectors: CandidateSelectors) -> Self {
        ActionRequest::Read {
            selectors,
            attribute: None,
            timeout: None,
        }
    }

    /// Override the resolution budget for element-targeting requests.
    pub fn with_timeout(mut self, budget: Duration) -> Self {
        match &mut self {
            ActionRequest::Find { timeout, .. }
            | ActionRequest::Click { timeout, .. }
            | ActionRequest::Type { timeout, .. }
            | ActionRequest::Read { timeout, .. }
            | ActionRequest::PressKey { timeout, .. } => *timeout = Some(budget),
            ActionRequest::Navigate { .. }
            | ActionRequest::Screenshot
            | ActionRequest::PageInfo
            | ActionRequest::Analyze => {}
        }
        self
    }

    /// Kind of this request.
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionRequest::Navigate { .. } => ActionKind::Navigate,
            ActionRequest::Find { .. } => ActionKind::Find,
            ActionRequest::Click { .. } => ActionKind::Click,
            ActionRequest::Type { .. } => ActionKind::Type,
            ActionRequest::Read { .. } => ActionKind::Read,
            ActionRequest::PressKey { .. } => ActionKind::PressKey,
            ActionRequest::Screenshot => ActionKind::Screenshot,
            ActionRequest::PageInfo => ActionKind::PageInfo,
            ActionRequest::Analyze => ActionKind::Analyze,
        }
    }

    /// Selectors targeted by this request, if any.
    pub fn selectors(&self) -> Option<&CandidateSelectors> {
        match self {
            ActionRequest::Find { selectors, .. }
            | ActionRequest::Click { selectors, .. }
            | ActionRequest::Type { selectors, .. }
            | ActionRequest::Read { selectors, .. }
            | ActionRequest::PressKey { selectors, .. } => Some(selectors),
            ActionRequest::Navigate { .. }
            | ActionRequest::Screenshot
            | ActionRequest::PageInfo
            | ActionRequest::Analyze => None,
        }
    }

    /// Short human-readable target description.
    pub fn target(&self) -> String {
        match self {
            ActionRequest::Navigate { url } => url.clone(),
            ActionRequest::Screenshot => "viewport".to_string(),
            ActionRequest::PageInfo | ActionRequest::Analyze => "page".to_string(),
            other => other
                .selectors()
                .map(ToString::to_string)
                .unwrap_or_default(),
        }
    }
}

/// Fieldless tag for an [`ActionRequest`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Navigate
    Navigate,
    /// Find
    Find,
    /// Click
    Click,
    /// Type
    Type,
    /// Read
    Read,
    /// Press key
    PressKey,
    /// Screenshot
    Screenshot,
    /// Page info
    PageInfo,
    /// Page analysis
    Analyze,
}

impl ActionKind {
    /// Short lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Navigate => "navigate",
            ActionKind::Find => "find",
            ActionKind::Click => "click",
            ActionKind::Type => "type",
            ActionKind::Read => "read",
            ActionKind::PressKey => "press",
            ActionKind::Screenshot => "screenshot",
            ActionKind::PageInfo => "info",
            ActionKind::Analyze => "analyze",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value extracted by a successful action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionValue {
    /// Element text or attribute
    Text(String),
    /// Element presence
    Present(bool),
    /// PNG bytes
    Screenshot(Vec<u8>),
    /// Current page identity
    Page {
        /// Current URL
        url: String,
        /// Document title
        title: String,
    },
    /// Page identity and element counts
    Analysis(PageAnalysis),
}

/// Element counts gathered by [`ActionRequest::Analyze`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageAnalysis {
    /// Current URL
    pub url: String,
    /// Document title
    pub title: String,
    /// `a` elements
    pub links: usize,
    /// `button` elements
    pub buttons: usize,
    /// `input` elements
    pub inputs: usize,
    /// `form` elements
    pub forms: usize,
    /// `h1` through `h6`
    pub headings: usize,
    /// `img` elements
    pub images: usize,
}

/// Why an attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionFailure {
    /// Failure category
    pub kind: FailureKind,
    /// Human-readable detail
    pub message: String,
}

impl From<&Error> for ActionFailure {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.failure_kind(),
            message: err.to_string(),
        }
    }
}

/// Outcome of one attempt at an [`ActionRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Whether the attempt succeeded
    pub success: bool,
    /// Extracted value, if any
    pub value: Option<ActionValue>,
    /// Failure detail when `success` is false
    pub failure: Option<ActionFailure>,
    /// Time spent in session-facing calls
    pub elapsed: Duration,
    /// Number of candidate selectors polled
    pub candidates_tried: usize,
}

impl ActionResult {
    /// Successful attempt.
    pub fn succeeded(value: Option<ActionValue>, elapsed: Duration, candidates_tried: usize) -> Self {
        Self {
            success: true,
            value,
            failure: None,
            elapsed,
            candidates_tried,
        }
    }

    /// Failed attempt.
    pub fn failed(err: &Error, elapsed: Duration, candidates_tried: usize) -> Self {
        Self {
            success: false,
            value: None,
            failure: Some(ActionFailure::from(err)),
            elapsed,
            candidates_tried,
        }
    }

    /// Failure kind, if the attempt failed.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure.as_ref().map(|f| f.kind)
    }
}
