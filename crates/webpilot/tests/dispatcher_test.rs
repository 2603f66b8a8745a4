//! Integration tests for the command loop on a scripted backend.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use webpilot::{ArtifactStore, CommandDispatcher, DispatcherState, Engine};
use webpilot_core::{ActionRequest, FailureKind, PilotConfig};
use webpilot_driver::{FakeBackend, FakeElement};

fn config() -> PilotConfig {
    let mut config = PilotConfig::default();
    config.timeouts.navigation_ms = 1_000;
    config.timeouts.element_ms = 1_000;
    config
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("webpilot-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

async fn dispatcher(
    backend: &FakeBackend,
    config: &PilotConfig,
    artifacts: ArtifactStore,
) -> CommandDispatcher<Vec<u8>> {
    let engine = Engine::new(Arc::new(backend.clone()), config, CancellationToken::new());
    engine.manager.acquire().await.unwrap();
    CommandDispatcher::new(engine, artifacts, Vec::new()).unwrap()
}

fn transcript(dispatcher: &CommandDispatcher<Vec<u8>>) -> String {
    String::from_utf8_lossy(dispatcher.output()).into_owned()
}

async fn feed(lines: &[&str]) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(lines.len().max(1));
    for line in lines {
        tx.send(line.to_string()).await.unwrap();
    }
    rx
}

#[tokio::test(start_paused = true)]
async fn test_loop_survives_failures() {
    let backend = FakeBackend::new()
        .with_title("Example Domain")
        .with_element("h1", FakeElement::new("Example Domain"));
    let artifacts = ArtifactStore::new(scratch_dir("survive"), false);
    let mut dispatcher = dispatcher(&backend, &config(), artifacts).await;

    let mut input = feed(&[
        "fly to the moon",
        "",
        "click #missing",
        "navigate file:///etc/passwd",
        "navigate https://example.com",
        "find h1",
        "status",
    ])
    .await;
    dispatcher.run(&mut input).await.unwrap();

    let out = transcript(&dispatcher);
    assert!(out.contains("Error: Parse error: unknown command 'fly'"));
    assert!(out.contains("click #missing failed [not_found]"));
    assert!(out.contains("navigate file:///etc/passwd failed [invalid_input]"));
    assert!(out.contains("Navigated to https://example.com - \"Example Domain\""));
    assert!(out.contains("Found h1: \"Example Domain\""));
    assert!(out.contains("4 total, 2 ok, 2 failed"));
    assert!(out.contains("End of input, browser session closed"));

    assert_eq!(dispatcher.state(), DispatcherState::Stopped);
    assert_eq!(backend.stats().closes(), 1);

    let snapshot = dispatcher.metrics().snapshot();
    assert_eq!(snapshot.total_actions, 4);
    assert_eq!(snapshot.failures_by_kind[&FailureKind::NotFound], 1);
    assert_eq!(snapshot.failures_by_kind[&FailureKind::InvalidInput], 1);
}

#[tokio::test(start_paused = true)]
async fn test_quit_during_backoff_releases_once() {
    let backend = FakeBackend::new();
    backend.fail_navigations(u32::MAX);
    let artifacts = ArtifactStore::new(scratch_dir("quit"), true);
    let mut dispatcher = dispatcher(&backend, &config(), artifacts).await;

    let (tx, mut rx) = mpsc::channel(4);
    let stats = backend.stats();
    let handle = tokio::spawn(async move {
        dispatcher.run(&mut rx).await.unwrap();
        dispatcher
    });

    tx.send("navigate https://example.com".to_string()).await.unwrap();
    // First attempt times out at 1s, its backoff lasts until 1.5s
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(stats.navigations(), 1);
    tx.send("quit".to_string()).await.unwrap();

    let dispatcher = handle.await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(dispatcher.state(), DispatcherState::Stopped);
    assert_eq!(stats.navigations(), 1);
    assert_eq!(stats.primitive_calls(), 1);
    assert_eq!(stats.closes(), 1);
    assert_eq!(stats.screenshots(), 0);

    let out = transcript(&dispatcher);
    assert!(out.contains("navigate https://example.com cancelled"));
    assert!(out.contains("Interrupted, browser session closed"));
}

#[tokio::test(start_paused = true)]
async fn test_lines_typed_during_dispatch_run_afterwards() {
    let backend = FakeBackend::new().with_element(
        "#late",
        FakeElement::new("here").appears_after(Duration::from_millis(600)),
    );
    let artifacts = ArtifactStore::new(scratch_dir("backlog"), false);
    let mut dispatcher = dispatcher(&backend, &config(), artifacts).await;

    let mut input = feed(&["click #late", "read #late"]).await;
    dispatcher.run(&mut input).await.unwrap();

    let out = transcript(&dispatcher);
    let clicked = out.find("Clicked #late").unwrap();
    let read = out.find("#late: here").unwrap();
    assert!(clicked < read);
    assert!(out.contains("End of input, browser session closed"));
    assert_eq!(backend.stats().clicks(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_status_typed_during_dispatch_answers_at_once() {
    let backend = FakeBackend::new().with_element(
        "#late",
        FakeElement::new("here").appears_after(Duration::from_millis(600)),
    );
    let artifacts = ArtifactStore::new(scratch_dir("status"), false);
    let mut dispatcher = dispatcher(&backend, &config(), artifacts).await;

    let mut input = feed(&["click #late", "status", "help"]).await;
    dispatcher.run(&mut input).await.unwrap();

    let out = transcript(&dispatcher);
    let status = out.find("0 total, 0 ok, 0 failed").unwrap();
    let help = out.find("navigate <url>").unwrap();
    let clicked = out.find("Clicked #late").unwrap();
    assert!(status < clicked);
    assert!(help < clicked);
    assert_eq!(out.matches("Session status").count(), 1);
    assert_eq!(out.matches("Commands:").count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_analyze_command() {
    let backend = FakeBackend::new()
        .with_title("Example Domain")
        .with_count("a", 1)
        .with_element("h1,h2,h3,h4,h5,h6", FakeElement::new("Example Domain"));
    let artifacts = ArtifactStore::new(scratch_dir("analyze"), false);
    let mut dispatcher = dispatcher(&backend, &config(), artifacts).await;

    let mut input = feed(&["navigate https://example.com", "analyze"]).await;
    dispatcher.run(&mut input).await.unwrap();

    let out = transcript(&dispatcher);
    assert!(out.contains("Page analysis"));
    assert!(out.contains("title:     Example Domain"));
    assert!(out.contains("url:       https://example.com"));
    assert!(out.contains("links:     1"));
    assert!(out.contains("headings:  1"));
    assert!(out.contains("forms:     0"));
}

#[tokio::test(start_paused = true)]
async fn test_quit_typed_during_dispatch_cancels_it() {
    let backend = FakeBackend::new().with_element(
        "#late",
        FakeElement::new("here").appears_after(Duration::from_millis(600)),
    );
    let artifacts = ArtifactStore::new(scratch_dir("cancel"), false);
    let mut dispatcher = dispatcher(&backend, &config(), artifacts).await;

    let mut input = feed(&["click #late", "read #late", "quit"]).await;
    dispatcher.run(&mut input).await.unwrap();

    let out = transcript(&dispatcher);
    // `quit` arrived mid-dispatch, so the click was cancelled before the read ran
    assert!(out.contains("click #late cancelled"));
    assert!(!out.contains("#late: here"));
    assert_eq!(backend.stats().clicks(), 0);
    assert_eq!(backend.stats().closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_idle_stops() {
    let backend = FakeBackend::new();
    let artifacts = ArtifactStore::new(scratch_dir("idle"), false);
    let engine = Engine::new(Arc::new(backend.clone()), &config(), CancellationToken::new());
    engine.manager.acquire().await.unwrap();
    let cancel = engine.cancel.clone();
    let mut dispatcher = CommandDispatcher::new(engine, artifacts, Vec::new()).unwrap();

    let (_tx, mut rx) = mpsc::channel::<String>(1);
    cancel.cancel();
    dispatcher.run(&mut rx).await.unwrap();

    assert_eq!(dispatcher.state(), DispatcherState::Stopped);
    assert_eq!(backend.stats().closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_screenshot_artifacts() {
    let backend = FakeBackend::new();
    let dir = scratch_dir("shots");
    let mut dispatcher = dispatcher(&backend, &config(), ArtifactStore::new(&dir, true)).await;

    let outcome = dispatcher.submit(ActionRequest::Screenshot).await.unwrap();
    assert!(outcome.succeeded());

    let mut input = feed(&["click #nowhere"]).await;
    dispatcher.run(&mut input).await.unwrap();

    let out = transcript(&dispatcher);
    assert_eq!(out.matches("Screenshot saved to").count(), 2);
    let written = std::fs::read_dir(&dir).unwrap().count();
    assert_eq!(written, 2);
    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_session_lost_then_reconnect() {
    let backend = FakeBackend::new().with_title("Recovered");
    backend.fail_navigations(u32::MAX);
    let mut config = config();
    config.retry.max_attempts = 1;
    config.retry.escalation_threshold = 1;
    let artifacts = ArtifactStore::new(scratch_dir("lost"), true);
    let mut dispatcher = dispatcher(&backend, &config, artifacts).await;
    backend.fail_connects(3);

    let mut input = feed(&["navigate https://example.com", "info", "reconnect", "info"]).await;
    dispatcher.run(&mut input).await.unwrap();

    let out = transcript(&dispatcher);
    assert!(out.contains("Session lost: session recreation failed"));
    assert!(out.contains("every command will fail until you run 'reconnect'"));
    assert!(out.contains("Connected: session"));
    assert!(out.contains("Title: Recovered"));

    let snapshot = dispatcher.metrics().snapshot();
    assert_eq!(snapshot.failures_by_kind[&FailureKind::SessionLost], 2);
    assert_eq!(snapshot.successful_actions, 1);
}

#[tokio::test]
async fn test_help_reset_and_submit_after_stop() {
    let backend = FakeBackend::new().with_element("#a", FakeElement::new("A"));
    let artifacts = ArtifactStore::new(scratch_dir("help"), false);
    let mut dispatcher = dispatcher(&backend, &config(), artifacts).await;

    let mut input = feed(&["read #a", "reset", "status", "help", "exit"]).await;
    dispatcher.run(&mut input).await.unwrap();

    let out = transcript(&dispatcher);
    assert!(out.contains("#a: A"));
    assert!(out.contains("Metrics reset"));
    assert!(out.contains("0 total, 0 ok, 0 failed"));
    assert!(out.contains("navigate <url>"));
    assert!(out.contains("Goodbye, browser session closed"));

    assert!(dispatcher.submit(ActionRequest::PageInfo).await.is_err());
}
