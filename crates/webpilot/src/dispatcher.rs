//! The persistent operator command loop.

use std::collections::VecDeque;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use webpilot_core::{ActionRequest, ActionValue, Error, FailureKind, Result};
use webpilot_session::{RecoveryOutcome, SessionMetrics};

use crate::artifacts::ArtifactStore;
use crate::command::{Command, CommandParser};
use crate::engine::Engine;
use crate::report::{format_outcome, format_status, HELP};

const PROMPT: &str = "webpilot> ";

/// Loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Waiting for the next command
    Idle,
    /// Running an action request
    Dispatching,
    /// Session released, loop finished
    Stopped,
}

/// Reads operator lines, runs them, and reports the outcome.
///
/// Runs one request at a time. Lines arriving while a request is in flight
/// are queued, except `quit`, which cancels the request and stops the loop,
/// and `status` and `help`, which are answered immediately.
pub struct CommandDispatcher<W> {
    parser: CommandParser,
    engine: Engine,
    artifacts: ArtifactStore,
    out: W,
    state: DispatcherState,
    backlog: VecDeque<String>,
}

impl<W: Write + Send> CommandDispatcher<W> {
    /// Create a dispatcher writing reports to `out`.
    pub fn new(engine: Engine, artifacts: ArtifactStore, out: W) -> Result<Self> {
        Ok(Self {
            parser: CommandParser::new()?,
            engine,
            artifacts,
            out,
            state: DispatcherState::Idle,
            backlog: VecDeque::new(),
        })
    }

    /// Current loop state.
    pub fn state(&self) -> DispatcherState {
        self.state
    }

    /// Shared metrics handle.
    pub fn metrics(&self) -> Arc<SessionMetrics> {
        Arc::clone(&self.engine.metrics)
    }

    /// Report sink.
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Process lines until `quit`, end of input, or cancellation.
    ///
    /// Only write failures on the report sink end the loop with an error.
    #[instrument(skip_all)]
    pub async fn run(&mut self, input: &mut mpsc::Receiver<String>) -> Result<()> {
        info!("Command loop started");

        while self.state != DispatcherState::Stopped {
            let line = match self.backlog.pop_front() {
                Some(line) => line,
                None => {
                    self.prompt()?;
                    tokio::select! {
                        biased;
                        _ = self.engine.cancel.cancelled() => {
                            self.stop("Interrupted").await?;
                            continue;
                        }
                        line = input.recv() => match line {
                            Some(line) => line,
                            None => {
                                self.stop("End of input").await?;
                                continue;
                            }
                        },
                    }
                }
            };

            self.handle_line(&line, Some(&mut *input)).await?;
        }

        info!("Command loop stopped");
        Ok(())
    }

    /// Run a request that did not come from operator text.
    #[instrument(skip_all, fields(kind = %request.kind()))]
    pub async fn submit(&mut self, request: ActionRequest) -> Result<RecoveryOutcome> {
        if self.state == DispatcherState::Stopped {
            return Err(Error::Other("dispatcher is stopped".to_string()));
        }
        self.dispatch(request, None).await
    }

    async fn handle_line(
        &mut self,
        line: &str,
        input: Option<&mut mpsc::Receiver<String>>,
    ) -> Result<()> {
        let command = match self.parser.parse(line) {
            Ok(command) => command,
            Err(e) => {
                debug!("Rejected input {:?}: {}", line, e);
                return self.write(&format!("Error: {e}"));
            }
        };

        match command {
            Command::Empty => Ok(()),
            Command::Help => self.write(HELP),
            Command::Status => {
                let snapshot = self.engine.metrics.snapshot();
                let session = self.engine.manager.current().map(|s| s.info());
                self.write(&format_status(&snapshot, session.as_ref()))
            }
            Command::Reset => {
                self.engine.metrics.reset();
                self.write("Metrics reset")
            }
            Command::Reconnect => match self.engine.manager.reconnect().await {
                Ok(session) => {
                    self.engine.metrics.record_recreation();
                    self.write(&format!(
                        "Connected: session {} ({}, handle {})",
                        session.id(),
                        session.backend(),
                        session.handle()
                    ))
                }
                Err(e) => {
                    warn!("Reconnect failed: {}", e);
                    self.write(&format!("Reconnect failed: {e}"))
                }
            },
            Command::Quit => self.stop("Goodbye").await,
            Command::Action(request) => self.dispatch(request, input).await.map(|_| ()),
        }
    }

    async fn dispatch(
        &mut self,
        request: ActionRequest,
        mut input: Option<&mut mpsc::Receiver<String>>,
    ) -> Result<RecoveryOutcome> {
        self.state = DispatcherState::Dispatching;
        info!("Dispatching {} {}", request.kind(), request.target());

        let outcome = {
            let run = self.engine.controller.run(&request);
            tokio::pin!(run);
            let mut input_open = input.is_some();

            loop {
                tokio::select! {
                    outcome = &mut run => break outcome,
                    line = next_line(&mut input), if input_open => match line {
                        Some(line) => match self.parser.parse(&line) {
                            Ok(Command::Quit) => {
                                info!("Quit requested during {}, cancelling", request.kind());
                                self.engine.cancel.cancel();
                            }
                            Ok(Command::Status) => {
                                let snapshot = self.engine.metrics.snapshot();
                                let session = self.engine.manager.current().map(|s| s.info());
                                write_line(&mut self.out, &format_status(&snapshot, session.as_ref()))?;
                            }
                            Ok(Command::Help) => write_line(&mut self.out, HELP)?,
                            _ => self.backlog.push_back(line),
                        },
                        None => input_open = false,
                    },
                }
            }
        };

        if outcome.recreated {
            self.engine.metrics.record_recreation();
        }
        self.engine.metrics.record(
            &request,
            &outcome.result,
            outcome.attempts_used,
            outcome.elapsed,
        );

        let artifact = self.capture_artifact(&request, &outcome).await;
        self.write(&format_outcome(&request, &outcome, artifact.as_deref()))?;

        if self.engine.cancel.is_cancelled() {
            self.stop("Interrupted").await?;
        } else {
            self.state = DispatcherState::Idle;
        }
        Ok(outcome)
    }

    async fn capture_artifact(
        &self,
        request: &ActionRequest,
        outcome: &RecoveryOutcome,
    ) -> Option<PathBuf> {
        if outcome.succeeded() {
            return match &outcome.result.value {
                Some(ActionValue::Screenshot(png)) => self.save(png),
                _ => None,
            };
        }

        if !self.artifacts.screenshot_on_error() || request.selectors().is_none() {
            return None;
        }
        if matches!(
            outcome.failure_kind(),
            Some(FailureKind::InvalidInput | FailureKind::SessionLost | FailureKind::Cancelled)
        ) {
            return None;
        }

        let session = self.engine.manager.ready_session()?;
        match session.driver().screenshot().await {
            Ok(png) => self.save(&png),
            Err(e) => {
                debug!("Error screenshot unavailable: {}", e);
                None
            }
        }
    }

    fn save(&self, png: &[u8]) -> Option<PathBuf> {
        match self.artifacts.save_screenshot(png) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Could not write screenshot to {}: {}", self.artifacts.dir().display(), e);
                None
            }
        }
    }

    async fn stop(&mut self, reason: &str) -> Result<()> {
        info!("Stopping command loop: {}", reason);
        self.engine.manager.shutdown().await;
        self.state = DispatcherState::Stopped;
        self.write(&format!("{reason}, browser session closed"))
    }

    fn prompt(&mut self) -> Result<()> {
        write!(self.out, "{PROMPT}")?;
        self.out.flush()?;
        Ok(())
    }

    fn write(&mut self, text: &str) -> Result<()> {
        write_line(&mut self.out, text)
    }
}

fn write_line<W: Write>(out: &mut W, text: &str) -> Result<()> {
    writeln!(out, "{text}")?;
    out.flush()?;
    Ok(())
}

async fn next_line(input: &mut Option<&mut mpsc::Receiver<String>>) -> Option<String> {
    match input {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
