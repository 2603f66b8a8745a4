//! Wiring of session manager, executor, recovery and metrics.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use webpilot_core::PilotConfig;
use webpilot_driver::Backend;
use webpilot_session::{
    ActionExecutor, RecoveryController, RetryPolicy, SelectorResolver, SessionManager,
    SessionManagerConfig, SessionMetrics,
};

/// Everything the command loop drives, built from one configuration.
#[derive(Debug)]
pub struct Engine {
    /// Owner of the browser session
    pub manager: Arc<SessionManager>,
    /// Retry and escalation driver
    pub controller: RecoveryController,
    /// Cumulative metrics
    pub metrics: Arc<SessionMetrics>,
    /// Fires on operator interrupt
    pub cancel: CancellationToken,
}

impl Engine {
    /// Assemble an engine on `backend`. No session is acquired yet.
    pub fn new(backend: Arc<dyn Backend>, config: &PilotConfig, cancel: CancellationToken) -> Self {
        let manager_config = SessionManagerConfig::from(config);
        let resolver = SelectorResolver::new(config.timeouts.poll_interval());
        let executor = ActionExecutor::new(&manager_config.session, resolver)
            .with_cancellation(cancel.clone());

        let manager = Arc::new(SessionManager::new(backend, manager_config));
        let controller = RecoveryController::new(
            Arc::clone(&manager),
            executor,
            RetryPolicy::from(&config.retry),
            cancel.clone(),
        );

        Self {
            manager,
            controller,
            metrics: Arc::new(SessionMetrics::new()),
            cancel,
        }
    }
}
