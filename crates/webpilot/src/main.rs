//! # webpilot
//!
//! Persistent browser-automation command loop.
//!
//! ## Overview
//!
//! Keeps one browser session alive across operator commands read from
//! stdin, resolves elements through fallback selectors, retries transient
//! failures and recreates the session when failures pile up.
//!
//! ## Architecture
//!
//! This is Layer 3 - the binary that ties together:
//! - webpilot-core: Core types and configuration
//! - webpilot-driver: WebDriver backend
//! - webpilot-session: Session lifecycle, resolution and recovery

use std::io::BufRead;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use webpilot::{ArtifactStore, CliArgs, CommandDispatcher, Engine};
use webpilot_driver::WebDriverBackend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliArgs::parse(std::env::args().skip(1))?;
    if cli.help {
        println!("{}", webpilot::cli::USAGE);
        return Ok(());
    }
    if cli.version {
        println!("webpilot {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = cli.load_config()?;

    // Logs go to stderr so the transcript on stdout stays readable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        "webpilot v{} starting: browser={}, headless={}, webdriver={}",
        env!("CARGO_PKG_VERSION"),
        config.browser.backend,
        config.browser.headless,
        config.browser.webdriver_url
    );

    let backend = Arc::new(WebDriverBackend::new(&config.browser.webdriver_url)?);
    let cancel = CancellationToken::new();
    let engine = Engine::new(backend, &config, cancel.clone());
    let manager = Arc::clone(&engine.manager);

    if let Err(e) = manager.acquire().await {
        error!("Could not start a browser session: {}", e);
        return Err(e.into());
    }

    spawn_interrupt_handler(cancel.clone());
    #[cfg(unix)]
    spawn_status_signal(Arc::clone(&engine.metrics));

    let mut input = spawn_stdin_reader();
    let mut dispatcher =
        CommandDispatcher::new(engine, ArtifactStore::from(&config.artifacts), std::io::stdout())?;
    println!("webpilot ready, type 'help' for commands");

    let result = dispatcher.run(&mut input).await;

    // Covers every exit path out of the loop, including write failures
    manager.shutdown().await;
    info!("webpilot shutting down");

    result.map_err(Into::into)
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, cancelling current command");
                cancel.cancel();
            }
            Err(e) => warn!("Could not listen for Ctrl-C: {}", e),
        }
    });
}

#[cfg(unix)]
fn spawn_status_signal(metrics: Arc<webpilot_session::SessionMetrics>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut usr1 = match signal(SignalKind::user_defined1()) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Could not listen for SIGUSR1: {}", e);
                return;
            }
        };

        while usr1.recv().await.is_some() {
            match serde_json::to_string(&metrics.snapshot()) {
                Ok(json) => info!(target: "webpilot::status", "{}", json),
                Err(e) => warn!("Could not serialize metrics: {}", e),
            }
        }
    });
}

/// Blocking stdin lives on its own thread so it never holds up runtime shutdown.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Error reading stdin: {}", e);
                    break;
                }
            }
        }
    });
    rx
}
