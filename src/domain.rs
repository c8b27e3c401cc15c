#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Longest hostname DNS allows.
pub const MAX_DOMAIN_LEN: usize = 253;

/// Probe target accepted by the evaluation path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Domain(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("domain must not be empty")]
    Empty,
    #[error("domain is {len} characters, limit is {MAX_DOMAIN_LEN}")]
    TooLong { len: usize },
    #[error("domain contains forbidden character `{0}`")]
    ForbiddenCharacter(char),
}

impl Domain {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::Empty);
        }

        let len = trimmed.chars().count();
        if len > MAX_DOMAIN_LEN {
            return Err(DomainError::TooLong { len });
        }

        // Anything that would change the URL shape beyond the authority.
        if let Some(ch) = trimmed
            .chars()
            .find(|ch| ch.is_whitespace() || matches!(ch, '/' | '?' | '#' | '@' | '\\'))
        {
            return Err(DomainError::ForbiddenCharacter(ch));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Domain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a single classified probe; the only values a status check row may hold.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Up,
    Slow,
    Down,
}

impl CheckStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            CheckStatus::Up => "up",
            CheckStatus::Slow => "slow",
            CheckStatus::Down => "down",
        }
    }

    pub const fn is_healthy(self) -> bool {
        matches!(self, CheckStatus::Up | CheckStatus::Slow)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "up" => Some(CheckStatus::Up),
            "slow" => Some(CheckStatus::Slow),
            "down" => Some(CheckStatus::Down),
            _ => None,
        }
    }
}

impl Display for CheckStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cached status projected onto a service row.
///
/// `Dead` is terminal from the point of view of the regular check pipeline;
/// only a resurrection moves a service out of it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    #[default]
    Unknown,
    Up,
    Slow,
    Down,
    Dead,
}

impl ServiceStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            ServiceStatus::Unknown => "unknown",
            ServiceStatus::Up => "up",
            ServiceStatus::Slow => "slow",
            ServiceStatus::Down => "down",
            ServiceStatus::Dead => "dead",
        }
    }

    /// Unrecognised values collapse to `Unknown`; the column is not constrained.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "up" => ServiceStatus::Up,
            "slow" => ServiceStatus::Slow,
            "down" => ServiceStatus::Down,
            "dead" => ServiceStatus::Dead,
            _ => ServiceStatus::Unknown,
        }
    }
}

impl From<CheckStatus> for ServiceStatus {
    fn from(value: CheckStatus) -> Self {
        match value {
            CheckStatus::Up => ServiceStatus::Up,
            CheckStatus::Slow => ServiceStatus::Slow,
            CheckStatus::Down => ServiceStatus::Down,
        }
    }
}

impl Display for ServiceStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub domain: String,
    pub slug: String,
    pub category: Option<String>,
    pub status: ServiceStatus,
    pub response_time: Option<u64>,
    pub last_checked: Option<DateTime<Utc>>,
}

/// Append-only time-series fact, one per probe attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCheck {
    pub id: i64,
    pub service_id: i64,
    pub status: CheckStatus,
    pub response_time: u64,
    pub status_code: u16,
    pub checked_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub status: CheckStatus,
    pub response_time: u64,
    pub status_code: u16,
    pub checked_at: DateTime<Utc>,
}

/// Ephemeral descriptor of a cached-status flip, consumed by notification dispatch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTransition {
    pub service_id: i64,
    pub service_name: String,
    pub domain: String,
    pub previous_status: ServiceStatus,
    pub new_status: ServiceStatus,
}
