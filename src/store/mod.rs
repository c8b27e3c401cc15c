//! Persistence gateway over the `services` and `status_checks` tables.

pub mod memory;
#[cfg(feature = "db-postgres")]
pub mod postgres;

use crate::domain::{Service, ServiceStatus, StatusCheck};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use memory::MemoryStore;
#[cfg(feature = "db-postgres")]
pub use postgres::PgStatusStore;

#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Services whose domain matches exactly and whose cached status equals
    /// `status`, lowest id first.
    async fn services_with_status(
        &self,
        domain: &str,
        status: ServiceStatus,
    ) -> Result<Vec<Service>>;

    async fn update_cached_status(
        &self,
        service_id: i64,
        status: ServiceStatus,
        response_time: u64,
        checked_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Removes every status check stamped strictly before `cutoff` and
    /// returns how many rows went away.
    async fn delete_checks_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    async fn service_by_slug(&self, slug: &str) -> Result<Option<Service>>;

    /// Checks for one service at or after `since`, oldest first.
    async fn checks_since(&self, service_id: i64, since: DateTime<Utc>)
        -> Result<Vec<StatusCheck>>;

    async fn ping(&self) -> Result<()>;
}
