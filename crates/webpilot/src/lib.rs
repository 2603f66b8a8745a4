//! webpilot library
//!
//! The operator-facing layer: command parsing, the dispatch loop, outcome
//! reporting and screenshot artifacts. The binary in main.rs wires these to
//! stdin, signals and a WebDriver backend.

pub mod artifacts;
pub mod cli;
pub mod command;
pub mod dispatcher;
pub mod engine;
pub mod report;

// Re-export commonly used types
pub use artifacts::ArtifactStore;
pub use cli::CliArgs;
pub use command::{Command, CommandParser};
pub use dispatcher::{CommandDispatcher, DispatcherState};
pub use engine::Engine;
