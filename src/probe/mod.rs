//! Outbound health probes.
//!
//! A [`Prober`] never fails: network errors are an ordinary [`ProbeOutcome`],
//! which the [`Classifier`] maps onto a [`crate::domain::ProbeResult`].

pub mod classify;
pub mod http;

use crate::domain::Domain;
use async_trait::async_trait;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub use classify::Classifier;
pub use http::HttpProber;

/// Raw result of one probe, before classification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    Response { status_code: u16, elapsed: Duration },
    Failure { kind: FailureKind, elapsed: Duration },
}

impl ProbeOutcome {
    pub fn elapsed(&self) -> Duration {
        match self {
            ProbeOutcome::Response { elapsed, .. } | ProbeOutcome::Failure { elapsed, .. } => {
                *elapsed
            }
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    /// DNS resolution, refused connection or TLS handshake.
    Connect,
    Request,
    InvalidTarget,
}

impl FailureKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Connect => "connect",
            FailureKind::Request => "request",
            FailureKind::InvalidTarget => "invalid_target",
        }
    }
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait Prober: Send + Sync {
    /// Issues exactly one probe against `domain`; implementations must bound
    /// the worst-case latency with a hard timeout.
    async fn probe(&self, domain: &Domain) -> ProbeOutcome;
}
