use crate::error::{Context, Result};
use crate::metrics::metrics;
use crate::store::StatusStore;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_RETENTION_DAYS: u32 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SweepAuthError {
    #[error("no cron secret is configured")]
    NotConfigured,
    #[error("missing bearer token")]
    MissingToken,
    #[error("bearer token does not match")]
    Mismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub deleted: u64,
    pub cutoff: DateTime<Utc>,
}

/// Deletes status checks older than the retention horizon.
#[derive(Clone)]
pub struct RetentionSweeper {
    store: Arc<dyn StatusStore>,
    horizon: Duration,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn StatusStore>, horizon_days: u32) -> Self {
        Self {
            store,
            horizon: Duration::days(i64::from(horizon_days)),
        }
    }

    pub async fn sweep(&self) -> Result<SweepReport> {
        self.sweep_at(Utc::now()).await
    }

    /// Single set-based delete; failures are returned, never retried.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let cutoff = now - self.horizon;
        match self
            .store
            .delete_checks_older_than(cutoff)
            .await
            .context("retention sweep failed")
        {
            Ok(deleted) => {
                metrics().record_sweep(deleted);
                tracing::info!(deleted, cutoff = %cutoff, "retention sweep completed");
                Ok(SweepReport { deleted, cutoff })
            }
            Err(err) => {
                metrics().inc_sweep_failures();
                Err(err)
            }
        }
    }
}

/// Accepts only `Authorization: Bearer <secret>` with an exact secret match.
pub fn authorize(header: Option<&str>, secret: Option<&str>) -> Result<(), SweepAuthError> {
    let secret = secret.ok_or(SweepAuthError::NotConfigured)?;
    let header = header.ok_or(SweepAuthError::MissingToken)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(SweepAuthError::MissingToken)?;

    if token == secret {
        Ok(())
    } else {
        Err(SweepAuthError::Mismatch)
    }
}
