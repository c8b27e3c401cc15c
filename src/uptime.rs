//! Uptime and incident views derived from the status check history.

use crate::domain::{CheckStatus, StatusCheck};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UptimeSummary {
    pub total_checks: u64,
    pub up: u64,
    pub slow: u64,
    pub down: u64,
    /// `None` when there is no history to judge.
    pub uptime_percent: Option<f64>,
    pub avg_response_time: Option<u64>,
    pub incidents: Vec<Incident>,
}

/// A maximal run of consecutive `down` checks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub checks: u64,
}

impl UptimeSummary {
    /// Expects `checks` ordered oldest first, as the gateway returns them.
    pub fn from_checks(checks: &[StatusCheck]) -> Self {
        let mut summary = UptimeSummary::default();
        let mut healthy_response_total: u64 = 0;
        let mut open: Option<Incident> = None;

        for check in checks {
            summary.total_checks += 1;
            match check.status {
                CheckStatus::Up => summary.up += 1,
                CheckStatus::Slow => summary.slow += 1,
                CheckStatus::Down => summary.down += 1,
            }

            if check.status.is_healthy() {
                healthy_response_total = healthy_response_total.saturating_add(check.response_time);
                if let Some(incident) = open.take() {
                    summary.incidents.push(incident);
                }
                continue;
            }

            match open.as_mut() {
                Some(incident) => {
                    incident.ended_at = check.checked_at;
                    incident.checks += 1;
                }
                None => {
                    open = Some(Incident {
                        started_at: check.checked_at,
                        ended_at: check.checked_at,
                        checks: 1,
                    })
                }
            }
        }

        if let Some(incident) = open {
            summary.incidents.push(incident);
        }

        let healthy = summary.up + summary.slow;
        if summary.total_checks > 0 {
            let percent = healthy as f64 / summary.total_checks as f64 * 100.0;
            summary.uptime_percent = Some((percent * 100.0).round() / 100.0);
        }
        if healthy > 0 {
            summary.avg_response_time = Some(healthy_response_total / healthy);
        }

        summary
    }
}
