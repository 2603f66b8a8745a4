//! # webpilot-session
//!
//! Session lifecycle and action orchestration for webpilot.
//!
//! This crate provides:
//! - Ownership of the single active browser session
//! - Element resolution across candidate selectors under a shared budget
//! - One-attempt action execution with failures encoded in results
//! - Retry, backoff and session escalation
//! - Reliability metrics
//!
//! ## Architecture
//!
//! This is Layer 2 in the architecture - it depends on webpilot-core
//! and webpilot-driver and never talks to a browser directly.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod executor;
pub mod manager;
pub mod metrics;
pub mod recovery;
pub mod resolver;
pub mod retry;
pub mod session;

// Re-export commonly used types
pub use executor::{validate_url, ActionExecutor};
pub use manager::{SessionManager, SessionManagerConfig};
pub use metrics::{LatencyStats, MetricsAggregate, SessionMetrics};
pub use recovery::{RecoveryController, RecoveryOutcome, RecoveryState};
pub use resolver::{Resolved, SelectorResolver, DEFAULT_POLL_INTERVAL};
pub use retry::RetryPolicy;
pub use session::Session;
