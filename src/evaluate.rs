use crate::domain::{Domain, DomainError, ProbeResult};
use crate::metrics::metrics;
use crate::probe::{Classifier, Prober};
use crate::resurrect::ResurrectionCoordinator;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    InvalidDomain(#[from] DomainError),
}

/// Result handed back to the caller plus the detached resurrection task.
pub struct Evaluation {
    pub domain: Domain,
    pub result: ProbeResult,
    pub background: Option<JoinHandle<()>>,
}

/// Hot path: validate, probe, classify, then detach resurrection.
#[derive(Clone)]
pub struct Evaluator {
    prober: Arc<dyn Prober>,
    classifier: Classifier,
    resurrection: ResurrectionCoordinator,
}

impl Evaluator {
    pub fn new(
        prober: Arc<dyn Prober>,
        classifier: Classifier,
        resurrection: ResurrectionCoordinator,
    ) -> Self {
        Self {
            prober,
            classifier,
            resurrection,
        }
    }

    /// Validation failures are returned before any probe is attempted.
    pub async fn evaluate(&self, raw_domain: &str) -> Result<Evaluation, EvaluationError> {
        let domain = Domain::parse(raw_domain)?;

        let outcome = self.prober.probe(&domain).await;
        let result = self.classifier.classify(&outcome);
        metrics().record_probe(result.status);

        tracing::debug!(
            domain = %domain,
            status = %result.status,
            response_time_ms = result.response_time,
            status_code = result.status_code,
            "probe classified"
        );

        let background = self
            .resurrection
            .spawn(domain.as_str().to_string(), result.clone());

        Ok(Evaluation {
            domain,
            result,
            background,
        })
    }
}
