//! Session-wide reliability metrics.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use webpilot_core::{ActionKind, ActionRequest, ActionResult, FailureKind};

/// Latency statistics for one action kind, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct LatencyStats {
    /// Completed requests
    pub count: u64,
    /// Sum of latencies
    pub total_ms: u64,
    /// Fastest request
    pub min_ms: u64,
    /// Slowest request
    pub max_ms: u64,
}

impl LatencyStats {
    fn add(&mut self, latency: Duration) {
        let ms = latency.as_millis() as u64;
        self.min_ms = if self.count == 0 { ms } else { self.min_ms.min(ms) };
        self.max_ms = self.max_ms.max(ms);
        self.total_ms += ms;
        self.count += 1;
    }

    /// Mean latency, zero when empty.
    pub fn mean_ms(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.total_ms / self.count
        }
    }
}

/// Point-in-time copy of the metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsAggregate {
    /// When counting started
    pub started_at: DateTime<Utc>,
    /// Seconds since `started_at`
    pub uptime_secs: u64,
    /// Completed action requests
    pub total_actions: u64,
    /// Requests that ended `Succeeded`
    pub successful_actions: u64,
    /// Requests that ended `Failed`
    pub failed_actions: u64,
    /// Failed requests per final failure kind
    pub failures_by_kind: BTreeMap<FailureKind, u64>,
    /// Latency per action kind
    pub latency_by_action: BTreeMap<ActionKind, LatencyStats>,
    /// Executor invocations across all requests
    pub total_attempts: u64,
    /// Sessions replaced by escalation or health checks
    pub session_recreations: u64,
}

impl MetricsAggregate {
    /// Successful ÷ total requests, zero before the first request.
    pub fn success_rate(&self) -> f64 {
        if self.total_actions == 0 {
            0.0
        } else {
            self.successful_actions as f64 / self.total_actions as f64
        }
    }
}

#[derive(Debug, Clone)]
struct MetricsState {
    started_at: DateTime<Utc>,
    total_actions: u64,
    successful_actions: u64,
    failed_actions: u64,
    failures_by_kind: BTreeMap<FailureKind, u64>,
    latency_by_action: BTreeMap<ActionKind, LatencyStats>,
    total_attempts: u64,
    session_recreations: u64,
}

impl MetricsState {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            total_actions: 0,
            successful_actions: 0,
            failed_actions: 0,
            failures_by_kind: BTreeMap::new(),
            latency_by_action: BTreeMap::new(),
            total_attempts: 0,
            session_recreations: 0,
        }
    }
}

/// Cumulative metrics, safe to read while the dispatch loop records.
#[derive(Debug)]
pub struct SessionMetrics {
    state: RwLock<MetricsState>,
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMetrics {
    /// Start counting now.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MetricsState::new()),
        }
    }

    /// Record one completed request.
    ///
    /// Counted once regardless of `attempts_used`.
    pub fn record(
        &self,
        request: &ActionRequest,
        result: &ActionResult,
        attempts_used: u32,
        latency: Duration,
    ) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.total_actions += 1;
        state.total_attempts += u64::from(attempts_used);

        if result.success {
            state.successful_actions += 1;
        } else {
            state.failed_actions += 1;
            let kind = result.failure_kind().unwrap_or(FailureKind::Unreachable);
            *state.failures_by_kind.entry(kind).or_insert(0) += 1;
        }

        state
            .latency_by_action
            .entry(request.kind())
            .or_default()
            .add(latency);
    }

    /// Record a session replacement.
    pub fn record_recreation(&self) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .session_recreations += 1;
    }

    /// Consistent copy of the current counters.
    pub fn snapshot(&self) -> MetricsAggregate {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let uptime = Utc::now().signed_duration_since(state.started_at);

        MetricsAggregate {
            started_at: state.started_at,
            uptime_secs: uptime.num_seconds().max(0) as u64,
            total_actions: state.total_actions,
            successful_actions: state.successful_actions,
            failed_actions: state.failed_actions,
            failures_by_kind: state.failures_by_kind.clone(),
            latency_by_action: state.latency_by_action.clone(),
            total_attempts: state.total_attempts,
            session_recreations: state.session_recreations,
        }
    }

    /// Zero every counter and restart the clock.
    pub fn reset(&self) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = MetricsState::new();
    }
}
