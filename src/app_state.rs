use crate::backpressure::BackpressureController;
use crate::config::BeaconConfig;
use crate::evaluate::Evaluator;
use crate::notify::{NotificationSink, NotificationTrigger};
use crate::probe::{Classifier, Prober};
use crate::resurrect::ResurrectionCoordinator;
use crate::store::StatusStore;
use crate::sweep::RetentionSweeper;
use std::sync::Arc;

/// Shared state exposed to HTTP handlers and the CLI commands.
#[derive(Clone)]
pub struct AppState {
    pub evaluator: Evaluator,
    pub sweeper: RetentionSweeper,
    pub store: Arc<dyn StatusStore>,
    pub backpressure: BackpressureController,
    pub cron_secret: Option<Arc<str>>,
}

impl AppState {
    /// Wires the core components around already-constructed collaborators.
    pub fn assemble(
        config: &BeaconConfig,
        store: Arc<dyn StatusStore>,
        prober: Arc<dyn Prober>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let notifier = NotificationTrigger::new(sink);
        let resurrection = ResurrectionCoordinator::new(Arc::clone(&store), notifier);
        let evaluator = Evaluator::new(
            prober,
            Classifier::new(config.probe.slow_threshold),
            resurrection,
        );
        let sweeper = RetentionSweeper::new(Arc::clone(&store), config.retention.horizon_days);

        Self {
            evaluator,
            sweeper,
            store,
            backpressure: BackpressureController::new(config.server.max_concurrent_probes),
            cron_secret: config.cron_secret().map(Arc::from),
        }
    }
}
