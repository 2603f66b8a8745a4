//! # webpilot-driver
//!
//! Browser backend abstraction for webpilot.
//!
//! This crate provides:
//! - The [`Backend`] / [`BrowserSession`] seams every engine component talks to
//! - A W3C WebDriver client speaking to chromedriver, geckodriver, msedgedriver
//!   or safaridriver over HTTP
//! - A scripted in-memory backend ([`fake`]) for exercising the engine
//!   without a browser
//!
//! ## Architecture
//!
//! This is Layer 1 in the architecture - it depends only on webpilot-core.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod fake;
pub mod webdriver;
pub mod wire;

// Re-export commonly used types
pub use backend::{Backend, BrowserSession, ElementRef, ElementState};
pub use fake::{FakeBackend, FakeElement, FakeStats};
pub use webdriver::{WebDriverBackend, WebDriverSession};
