use crate::domain::{CheckStatus, ProbeResult};
use crate::probe::ProbeOutcome;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Maps raw probe outcomes onto `up` / `slow` / `down`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Classifier {
    slow_threshold: Duration,
}

impl Classifier {
    pub const fn new(slow_threshold: Duration) -> Self {
        Self { slow_threshold }
    }

    pub fn classify(&self, outcome: &ProbeOutcome) -> ProbeResult {
        self.classify_at(outcome, Utc::now())
    }

    /// Pure form of [`Classifier::classify`] with an explicit evaluation timestamp.
    pub fn classify_at(&self, outcome: &ProbeOutcome, checked_at: DateTime<Utc>) -> ProbeResult {
        let response_time = millis(outcome.elapsed());

        let (status, status_code) = match outcome {
            ProbeOutcome::Failure { .. } => (CheckStatus::Down, 0),
            ProbeOutcome::Response { status_code, .. } if !is_success(*status_code) => {
                (CheckStatus::Down, *status_code)
            }
            ProbeOutcome::Response {
                status_code,
                elapsed,
            } => {
                if *elapsed >= self.slow_threshold {
                    (CheckStatus::Slow, *status_code)
                } else {
                    (CheckStatus::Up, *status_code)
                }
            }
        };

        ProbeResult {
            status,
            response_time,
            status_code,
            checked_at,
        }
    }
}

/// 2xx and 3xx count as reachable.
pub const fn is_success(status_code: u16) -> bool {
    status_code >= 200 && status_code < 400
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
