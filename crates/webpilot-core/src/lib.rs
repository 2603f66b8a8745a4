//! # webpilot-core
//!
//! Core types for webpilot.
//!
//! This crate contains all fundamental types with **no internal dependencies**
//! on other webpilot crates. It provides:
//!
//! - Session types (SessionId, SessionStatus, BackendKind, SessionConfig)
//! - Action types (ActionRequest, CandidateSelectors, ActionResult)
//! - Key types for keyboard input
//! - Configuration loaded from YAML
//! - Error types
//!
//! ## Architecture
//!
//! This is Layer 0 in the architecture - all other crates depend on this one,
//! but this crate has no dependencies on other webpilot crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod action;
pub mod config;
pub mod error;
pub mod key;
pub mod session;

// Re-export commonly used types
pub use action::{
    ActionFailure, ActionKind, ActionRequest, ActionResult, ActionValue, CandidateSelectors,
    PageAnalysis,
};
pub use config::{
    ArtifactSettings, BrowserSettings, LoggingSettings, PilotConfig, RetrySettings,
    TimeoutSettings,
};
pub use error::{Error, FailureKind, Result};
pub use key::Key;
pub use session::{BackendKind, SessionConfig, SessionId, SessionInfo, SessionStatus};
