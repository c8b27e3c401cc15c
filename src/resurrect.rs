use crate::domain::{ProbeResult, ServiceStatus, StatusTransition};
use crate::error::{Context, Result};
use crate::metrics::metrics;
use crate::notify::NotificationTrigger;
use crate::store::StatusStore;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Flips `dead` services back to a healthy status after a successful probe.
///
/// Runs detached from the evaluation that produced the result; every failure
/// is logged and absorbed.
#[derive(Clone)]
pub struct ResurrectionCoordinator {
    store: Arc<dyn StatusStore>,
    notifier: NotificationTrigger,
}

impl ResurrectionCoordinator {
    pub fn new(store: Arc<dyn StatusStore>, notifier: NotificationTrigger) -> Self {
        Self { store, notifier }
    }

    /// Resurrects at most one `dead` service registered under `domain`.
    ///
    /// Only the lowest id is updated when several rows share the domain.
    pub async fn resurrect(
        &self,
        domain: &str,
        result: &ProbeResult,
    ) -> Result<Option<StatusTransition>> {
        if !result.status.is_healthy() {
            return Ok(None);
        }

        let dead = self
            .store
            .services_with_status(domain, ServiceStatus::Dead)
            .await
            .with_context(|| format!("failed to look up dead services for {domain}"))?;

        let Some(service) = dead.first() else {
            return Ok(None);
        };

        if dead.len() > 1 {
            crate::beacon_event!(
                warn,
                "duplicate_dead_services",
                domain = domain,
                service = service.id,
                remaining = dead.len() - 1
            );
        }

        let new_status = ServiceStatus::from(result.status);
        self.store
            .update_cached_status(service.id, new_status, result.response_time, result.checked_at)
            .await
            .with_context(|| format!("failed to resurrect service {}", service.id))?;

        metrics().inc_resurrections();
        crate::beacon_event!(
            info,
            "service_resurrected",
            domain = domain,
            service = service.id,
            status = new_status,
            response_time_ms = result.response_time
        );

        Ok(Some(StatusTransition {
            service_id: service.id,
            service_name: service.name.clone(),
            domain: service.domain.clone(),
            previous_status: ServiceStatus::Dead,
            new_status,
        }))
    }

    /// Read, conditionally write, conditionally notify; in that order.
    pub async fn run(&self, domain: &str, result: &ProbeResult) -> Option<JoinHandle<()>> {
        match self.resurrect(domain, result).await {
            Ok(Some(transition)) => self.notifier.fire(vec![transition]),
            Ok(None) => None,
            Err(err) => {
                metrics().inc_resurrection_failures();
                crate::beacon_event!(warn, "resurrection_failed", domain = domain, error = err);
                None
            }
        }
    }

    /// Fire-and-forget wrapper around [`ResurrectionCoordinator::run`].
    ///
    /// Returns `None` for down results, which never resurrect. The handle
    /// resolves once the notification (if any) has been handed off; callers on
    /// the request path drop it.
    pub fn spawn(&self, domain: String, result: ProbeResult) -> Option<JoinHandle<()>> {
        if !result.status.is_healthy() {
            return None;
        }

        let coordinator = self.clone();
        Some(tokio::spawn(async move {
            if let Some(delivery) = coordinator.run(&domain, &result).await {
                if let Err(err) = delivery.await {
                    tracing::warn!(domain = %domain, error = %err, "notification task aborted");
                }
            }
        }))
    }
}
