//! Operator-facing text for outcomes and status.

use std::fmt::Write as _;
use std::path::Path;

use webpilot_core::{ActionRequest, ActionValue, FailureKind, PageAnalysis, SessionInfo};
use webpilot_session::{MetricsAggregate, RecoveryOutcome};

/// Longest element text echoed by `find`.
pub const FIND_TEXT_LIMIT: usize = 50;

/// Longest page title shown by `analyze`.
pub const TITLE_LIMIT: usize = 80;

/// Recognized commands.
pub const HELP: &str = "\
Commands:
  navigate <url>                 Load an http(s) URL
  search <query>                 Search DuckDuckGo
  click <selector>               Click an element
  type <selector> <text>         Clear an input and type text
  find <selector>                Check an element is present
  read <selector> [attribute]    Print element text or an attribute
  press <selector> <key>         Send a key (Enter, Tab, Escape, Ctrl+a, ...)
  screenshot                     Save a screenshot
  info                           Print current URL and title
  analyze                        Count links, buttons, inputs, forms, headings and images
  status                         Print session metrics
  reset                          Reset session metrics
  reconnect                      Start a fresh browser session
  help                           Show this help
  quit | exit | q                Close the browser and exit

Selectors are CSS. Separate fallbacks with '||', quote arguments with spaces:
  click \"#submit||button[type=submit]\"";

/// Cut `text` to `limit` characters, marking the cut with `...`.
pub fn truncate(text: &str, limit: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// One-paragraph report for a finished request.
///
/// `artifact` is the screenshot written for this request, if any.
pub fn format_outcome(
    request: &ActionRequest,
    outcome: &RecoveryOutcome,
    artifact: Option<&Path>,
) -> String {
    let mut out = if outcome.succeeded() {
        format_success(request, outcome.result.value.as_ref(), artifact)
    } else {
        format_failure(request, outcome)
    };

    let mut notes = Vec::new();
    if outcome.attempts_used > 1 {
        notes.push(format!("{} attempts", outcome.attempts_used));
    }
    if outcome.recreated {
        notes.push("session recreated".to_string());
    }
    notes.push(format!("{}ms", outcome.elapsed.as_millis()));
    let _ = write!(out, " ({})", notes.join(", "));

    if !outcome.succeeded() {
        if let Some(path) = artifact {
            let _ = write!(out, "\nScreenshot saved to {}", path.display());
        }
    }

    if outcome.failure_kind() == Some(FailureKind::SessionLost) {
        out.push_str("\nThe browser session is gone; every command will fail until you run 'reconnect'.");
    }

    out
}

fn format_success(request: &ActionRequest, value: Option<&ActionValue>, artifact: Option<&Path>) -> String {
    let target = request.target();
    match (request, value) {
        (ActionRequest::Navigate { .. }, Some(ActionValue::Page { url, title })) => {
            format!("Navigated to {url} - \"{title}\"")
        }
        (ActionRequest::Find { .. }, Some(ActionValue::Text(text))) => {
            format!("Found {target}: \"{}\"", truncate(text, FIND_TEXT_LIMIT))
        }
        (ActionRequest::Find { .. }, _) => format!("Found {target}"),
        (ActionRequest::Click { .. }, _) => format!("Clicked {target}"),
        (ActionRequest::Type { text, .. }, _) => {
            format!("Typed \"{}\" into {target}", truncate(text, FIND_TEXT_LIMIT))
        }
        (ActionRequest::Read { attribute: Some(name), .. }, Some(ActionValue::Present(false))) => {
            format!("{target}: attribute '{name}' is not set")
        }
        (ActionRequest::Read { .. }, Some(ActionValue::Text(text))) => format!("{target}: {text}"),
        (ActionRequest::PressKey { key, .. }, _) => format!("Pressed {key} on {target}"),
        (ActionRequest::Screenshot, _) => match artifact {
            Some(path) => format!("Screenshot saved to {}", path.display()),
            None => "Screenshot captured".to_string(),
        },
        (ActionRequest::PageInfo, Some(ActionValue::Page { url, title })) => {
            format!("URL: {url}\nTitle: {title}")
        }
        (ActionRequest::Analyze, Some(ActionValue::Analysis(analysis))) => format_analysis(analysis),
        (_, _) => format!("{} {target} succeeded", request.kind()),
    }
}

fn format_analysis(analysis: &PageAnalysis) -> String {
    let mut out = String::from("Page analysis\n");
    let _ = writeln!(out, "  title:     {}", truncate(&analysis.title, TITLE_LIMIT));
    let _ = writeln!(out, "  url:       {}", analysis.url);
    let _ = writeln!(out, "  links:     {}", analysis.links);
    let _ = writeln!(out, "  buttons:   {}", analysis.buttons);
    let _ = writeln!(out, "  inputs:    {}", analysis.inputs);
    let _ = writeln!(out, "  forms:     {}", analysis.forms);
    let _ = writeln!(out, "  headings:  {}", analysis.headings);
    let _ = write!(out, "  images:    {}", analysis.images);
    out
}

fn format_failure(request: &ActionRequest, outcome: &RecoveryOutcome) -> String {
    let message = outcome
        .result
        .failure
        .as_ref()
        .map(|f| f.message.as_str())
        .unwrap_or("unknown error");

    match outcome.failure_kind() {
        // The error text already reads "Session lost: ..."
        Some(FailureKind::SessionLost) => message.to_string(),
        Some(FailureKind::Cancelled) => format!("{} {} cancelled", request.kind(), request.target()),
        Some(kind) => format!("{} {} failed [{kind}]: {message}", request.kind(), request.target()),
        None => format!("{} {} failed: {message}", request.kind(), request.target()),
    }
}

/// Metrics and session summary for the `status` command.
pub fn format_status(metrics: &MetricsAggregate, session: Option<&SessionInfo>) -> String {
    let mut out = String::from("Session status\n");

    match session {
        Some(info) => {
            let _ = writeln!(
                out,
                "  session:      {} ({}, {}, handle {})",
                info.id, info.backend, info.status, info.handle
            );
            let _ = writeln!(out, "  created:      {}", info.created_at);
        }
        None => {
            let _ = writeln!(out, "  session:      none (use 'reconnect')");
        }
    }

    let _ = writeln!(out, "  started:      {}", metrics.started_at.to_rfc3339());
    let _ = writeln!(out, "  uptime:       {}s", metrics.uptime_secs);
    let _ = writeln!(
        out,
        "  actions:      {} total, {} ok, {} failed ({:.1}% success)",
        metrics.total_actions,
        metrics.successful_actions,
        metrics.failed_actions,
        metrics.success_rate() * 100.0
    );
    let _ = writeln!(out, "  attempts:     {}", metrics.total_attempts);
    let _ = writeln!(out, "  recreations:  {}", metrics.session_recreations);

    if !metrics.failures_by_kind.is_empty() {
        out.push_str("  failures:\n");
        for (kind, count) in &metrics.failures_by_kind {
            let _ = writeln!(out, "    {:<14}{count}", kind.as_str());
        }
    }

    if !metrics.latency_by_action.is_empty() {
        out.push_str("  latency (ms):\n");
        for (kind, stats) in &metrics.latency_by_action {
            let _ = writeln!(
                out,
                "    {:<14}n={} mean={} min={} max={}",
                kind.as_str(),
                stats.count,
                stats.mean_ms(),
                stats.min_ms,
                stats.max_ms
            );
        }
    }

    out.trim_end().to_string()
}
