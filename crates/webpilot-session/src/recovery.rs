//! Retry, backoff and escalation around the action executor.
//!
//! Every action request runs through one [`RecoveryController::run`] call,
//! which walks this state machine:
//!
//! ```text
//! Attempting(n) --success--> Succeeded
//! Attempting(n) --failure, n < max--> (backoff n) --> Attempting(n+1)
//! Attempting(max) --failure, counter < threshold--> Failed
//! Attempting(max) --failure, counter >= threshold--> Recreating
//! Recreating --ok--> Attempting(1) (final)
//! Recreating --err--> Failed (SessionLost)
//! ```
//!
//! A failed health check after any failed attempt jumps straight to
//! `Recreating`. Recreation happens at most once per request and never
//! consumes one of the policy's attempts.
//!
//! Once the cancellation token fires, any failed attempt ends the request
//! as `Cancelled` and the session is never recreated.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use webpilot_core::{ActionRequest, ActionResult, Error, FailureKind};

use crate::executor::ActionExecutor;
use crate::manager::SessionManager;
use crate::retry::RetryPolicy;
use crate::session::Session;

/// Position in the per-request recovery state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    /// Running attempt `n` (1-based)
    Attempting(u32),
    /// Replacing the session
    Recreating,
    /// Terminal: the last attempt succeeded
    Succeeded,
    /// Terminal: the request failed
    Failed,
}

/// Final outcome of one action request.
#[derive(Debug, Clone)]
pub struct RecoveryOutcome {
    /// Result of the last attempt, or the reason no attempt could run
    pub result: ActionResult,
    /// Executor invocations made for this request
    pub attempts_used: u32,
    /// Whether the session was recreated during this request
    pub recreated: bool,
    /// Wall-clock time including backoff and recreation
    pub elapsed: Duration,
}

impl RecoveryOutcome {
    /// Whether the request succeeded.
    pub fn succeeded(&self) -> bool {
        self.result.success
    }

    /// Failure kind of the final result.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.result.failure_kind()
    }
}

/// Drives retries and session escalation for action requests.
#[derive(Debug)]
pub struct RecoveryController {
    manager: Arc<SessionManager>,
    executor: ActionExecutor,
    policy: RetryPolicy,
    consecutive_failures: AtomicU32,
    cancel: CancellationToken,
}

impl RecoveryController {
    /// Create a controller. The executor's waits should share `cancel`.
    pub fn new(
        manager: Arc<SessionManager>,
        executor: ActionExecutor,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            manager,
            executor,
            policy,
            consecutive_failures: AtomicU32::new(0),
            cancel,
        }
    }

    /// Retry policy in effect.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Session manager.
    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    /// Consecutive failed requests since the last success or recreation.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    /// Token that aborts the in-flight request.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run one request to a terminal state.
    pub async fn run(&self, request: &ActionRequest) -> RecoveryOutcome {
        let start = Instant::now();
        let mut attempts_used = 0;
        let mut recreated = false;

        let Some(mut session) = self.manager.ready_session() else {
            let err = Error::SessionLost(
                "no active session, use 'reconnect' to start a new one".to_string(),
            );
            return RecoveryOutcome {
                result: ActionResult::failed(&err, Duration::ZERO, 0),
                attempts_used,
                recreated,
                elapsed: Duration::ZERO,
            };
        };

        let mut state = RecoveryState::Attempting(1);
        let mut last = ActionResult::failed(&Error::Cancelled, Duration::ZERO, 0);

        loop {
            debug!("{} '{}': {:?}", request.kind(), request.target(), state);
            state = match state {
                RecoveryState::Attempting(n) => {
                    if self.cancel.is_cancelled() {
                        last = ActionResult::failed(&Error::Cancelled, Duration::ZERO, 0);
                        RecoveryState::Failed
                    } else {
                        attempts_used += 1;
                        last = self.executor.execute(session.driver(), request).await;
                        if !last.success && self.cancel.is_cancelled() {
                            // Interrupted mid-attempt: no health check, no escalation
                            last = ActionResult::failed(
                                &Error::Cancelled,
                                last.elapsed,
                                last.candidates_tried,
                            );
                            RecoveryState::Failed
                        } else {
                            self.after_attempt(n, &last, recreated, &session).await
                        }
                    }
                }
                RecoveryState::Recreating if self.cancel.is_cancelled() => {
                    last = ActionResult::failed(
                        &Error::Cancelled,
                        last.elapsed,
                        last.candidates_tried,
                    );
                    RecoveryState::Failed
                }
                RecoveryState::Recreating => match self.manager.recreate(&session).await {
                    Ok(fresh) => {
                        info!("Session recreated: {} -> {}", session.id(), fresh.id());
                        session = fresh;
                        recreated = true;
                        self.consecutive_failures.store(0, Ordering::SeqCst);
                        RecoveryState::Attempting(1)
                    }
                    Err(e) => {
                        warn!("Session recreation failed: {}", e);
                        let lost = Error::SessionLost(format!("session recreation failed: {e}"));
                        last = ActionResult::failed(&lost, last.elapsed, last.candidates_tried);
                        RecoveryState::Failed
                    }
                },
                RecoveryState::Succeeded | RecoveryState::Failed => break,
            };
        }

        RecoveryOutcome {
            result: last,
            attempts_used,
            recreated,
            elapsed: Instant::now().duration_since(start),
        }
    }

    async fn after_attempt(
        &self,
        n: u32,
        result: &ActionResult,
        recreated: bool,
        session: &Session,
    ) -> RecoveryState {
        if result.success {
            self.consecutive_failures.store(0, Ordering::SeqCst);
            return RecoveryState::Succeeded;
        }

        let kind = result.failure_kind().unwrap_or(FailureKind::Unreachable);
        if !kind.is_retryable() {
            return RecoveryState::Failed;
        }

        // One final attempt after recovery; no second escalation
        if recreated {
            self.consecutive_failures.fetch_add(1, Ordering::SeqCst);
            return RecoveryState::Failed;
        }

        if !self.manager.health_check(session).await {
            self.manager.mark_degraded(session);
            warn!("Session failed health check after {} failure", kind);
            return RecoveryState::Recreating;
        }

        if n < self.policy.max_attempts {
            let delay = self.policy.backoff(n);
            info!(
                "Attempt {}/{} failed ({}), retrying in {:?}",
                n, self.policy.max_attempts, kind, delay
            );
            // A cancelled wait is caught by the check before the next attempt
            self.pause(delay).await;
            return RecoveryState::Attempting(n + 1);
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= self.policy.escalation_threshold {
            warn!(
                "{} consecutive failed requests, escalating to session recreation",
                failures
            );
            RecoveryState::Recreating
        } else {
            RecoveryState::Failed
        }
    }

    async fn pause(&self, duration: Duration) {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => debug!("Backoff interrupted"),
            _ = tokio::time::sleep(duration) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::SessionManagerConfig;
    use crate::resolver::SelectorResolver;
    use webpilot_core::{CandidateSelectors, SessionConfig};
    use webpilot_driver::{FakeBackend, FakeElement};

    fn session_config() -> SessionConfig {
        SessionConfig {
            navigation_timeout: Duration::from_secs(1),
            element_timeout: Duration::from_secs(1),
            ..SessionConfig::default()
        }
    }

    async fn controller(backend: &FakeBackend, policy: RetryPolicy) -> RecoveryController {
        let config = SessionManagerConfig {
            session: session_config(),
            ..SessionManagerConfig::default()
        };
        let manager = Arc::new(SessionManager::new(Arc::new(backend.clone()), config));
        manager.acquire().await.unwrap();

        let cancel = CancellationToken::new();
        let executor = ActionExecutor::new(&session_config(), SelectorResolver::default())
            .with_cancellation(cancel.clone());
        RecoveryController::new(manager, executor, policy, cancel)
    }

    fn no_escalation() -> RetryPolicy {
        RetryPolicy {
            escalation_threshold: 100,
            ..RetryPolicy::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_uses_every_attempt() {
        let backend = FakeBackend::new();
        backend.fail_navigations(u32::MAX);
        let controller = controller(&backend, no_escalation()).await;

        let outcome = controller
            .run(&ActionRequest::navigate("https://example.com"))
            .await;

        assert!(!outcome.succeeded());
        assert_eq!(outcome.attempts_used, 3);
        assert_eq!(backend.stats().navigations(), 3);
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Timeout));
        assert_eq!(controller.consecutive_failures(), 1);
        // Three 1s timeouts plus 500ms and 1s backoff
        assert_eq!(outcome.elapsed, Duration::from_millis(4500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_counter() {
        let backend = FakeBackend::new();
        backend.fail_navigations(u32::MAX);
        let controller = controller(&backend, no_escalation()).await;
        controller
            .run(&ActionRequest::navigate("https://example.com"))
            .await;
        assert_eq!(controller.consecutive_failures(), 1);

        backend.fail_navigations(1);
        let outcome = controller
            .run(&ActionRequest::navigate("https://example.com"))
            .await;
        assert!(outcome.succeeded());
        assert_eq!(outcome.attempts_used, 2);
        assert_eq!(controller.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_invalid_input_is_not_retried() {
        let backend = FakeBackend::new();
        let controller = controller(&backend, RetryPolicy::default()).await;

        let outcome = controller
            .run(&ActionRequest::navigate("not a url"))
            .await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::InvalidInput));
        assert_eq!(outcome.attempts_used, 1);
        assert_eq!(backend.stats().navigations(), 0);
        assert_eq!(controller.consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_escalation_recreates_once() {
        let backend = FakeBackend::new();
        backend.fail_navigations(u32::MAX);
        let controller = controller(&backend, RetryPolicy::default()).await;
        let request = ActionRequest::navigate("https://example.com");

        for _ in 0..2 {
            let outcome = controller.run(&request).await;
            assert!(!outcome.recreated);
        }
        assert_eq!(backend.stats().connects(), 1);

        let third = controller.run(&request).await;
        assert!(third.recreated);
        assert_eq!(third.attempts_used, 4);
        assert_eq!(backend.stats().connects(), 2);
        assert_eq!(backend.stats().closes(), 1);
        assert_eq!(backend.stats().navigations(), 10);
        assert_eq!(controller.consecutive_failures(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovered_session_serves_final_attempt() {
        let backend = FakeBackend::new();
        backend.fail_navigations(3);
        let policy = RetryPolicy {
            escalation_threshold: 1,
            ..RetryPolicy::default()
        };
        let controller = controller(&backend, policy).await;

        let outcome = controller
            .run(&ActionRequest::navigate("https://example.com"))
            .await;
        assert!(outcome.succeeded());
        assert!(outcome.recreated);
        assert_eq!(outcome.attempts_used, 4);
        assert_eq!(controller.consecutive_failures(), 0);
        assert_eq!(
            controller.manager().current().unwrap().handle(),
            "fake-2"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_recreation_is_session_lost() {
        let backend = FakeBackend::new();
        backend.fail_navigations(u32::MAX);
        let policy = RetryPolicy {
            max_attempts: 1,
            escalation_threshold: 1,
            ..RetryPolicy::default()
        };
        let controller = controller(&backend, policy).await;
        backend.fail_connects(10);

        let outcome = controller
            .run(&ActionRequest::navigate("https://example.com"))
            .await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::SessionLost));
        assert_eq!(outcome.attempts_used, 1);

        // Nothing left to act on until a manual reconnect
        let next = controller.run(&ActionRequest::PageInfo).await;
        assert_eq!(next.failure_kind(), Some(FailureKind::SessionLost));
        assert_eq!(next.attempts_used, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unhealthy_session_is_recreated_immediately() {
        let backend = FakeBackend::new().with_element("#go", FakeElement::new("Go"));
        let controller = controller(&backend, no_escalation()).await;
        backend.set_unreachable(true);

        let outcome = controller
            .run(&ActionRequest::click(CandidateSelectors::single("#go").unwrap()))
            .await;

        assert!(outcome.succeeded());
        assert!(outcome.recreated);
        assert_eq!(outcome.attempts_used, 2);
        assert_eq!(backend.stats().connects(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_final_attempt_skips_recreation() {
        let backend = FakeBackend::new().with_element(
            "#go",
            FakeElement::new("Go")
                .failing_clicks(1)
                .click_delay(Duration::from_millis(500)),
        );
        let policy = RetryPolicy {
            max_attempts: 1,
            escalation_threshold: 1,
            ..RetryPolicy::default()
        };
        let controller = controller(&backend, policy).await;

        let cancel = controller.cancel_token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            cancel.cancel();
        });

        let outcome = controller
            .run(&ActionRequest::click(CandidateSelectors::single("#go").unwrap()))
            .await;

        assert_eq!(outcome.failure_kind(), Some(FailureKind::Cancelled));
        assert!(!outcome.recreated);
        assert_eq!(outcome.attempts_used, 1);
        assert_eq!(backend.stats().clicks(), 1);
        assert_eq!(backend.stats().connects(), 1);
        assert_eq!(backend.stats().closes(), 0);
        assert_eq!(controller.consecutive_failures(), 0);
        assert_eq!(controller.manager().current().unwrap().handle(), "fake-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_stops_attempts() {
        let backend = FakeBackend::new();
        backend.fail_navigations(u32::MAX);
        let controller = controller(&backend, no_escalation()).await;

        let cancel = controller.cancel_token().clone();
        tokio::spawn(async move {
            // First attempt times out at 1s, backoff runs until 1.5s
            tokio::time::sleep(Duration::from_millis(1200)).await;
            cancel.cancel();
        });

        let outcome = controller
            .run(&ActionRequest::navigate("https://example.com"))
            .await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Cancelled));
        assert_eq!(outcome.attempts_used, 1);
        assert_eq!(backend.stats().navigations(), 1);
        assert_eq!(outcome.elapsed, Duration::from_millis(1200));
    }
}
