use crate::domain::{CheckStatus, Service, ServiceStatus, StatusCheck};
use crate::error::Result;
use crate::store::StatusStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Which operations an injected fault applies to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum FaultMode {
    #[default]
    None,
    Reads,
    Writes,
    All,
}

impl FaultMode {
    const fn to_u8(self) -> u8 {
        match self {
            FaultMode::None => 0,
            FaultMode::Reads => 1,
            FaultMode::Writes => 2,
            FaultMode::All => 3,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => FaultMode::Reads,
            2 => FaultMode::Writes,
            3 => FaultMode::All,
            _ => FaultMode::None,
        }
    }
}

/// In-process gateway used when no database is configured, and by tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryState>>,
    fault: Arc<AtomicU8>,
}

#[derive(Default)]
struct MemoryState {
    services: BTreeMap<i64, Service>,
    checks: Vec<StatusCheck>,
    next_check_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fault(&self, mode: FaultMode) {
        self.fault.store(mode.to_u8(), Ordering::SeqCst);
    }

    pub async fn insert_service(&self, service: Service) {
        let mut state = self.inner.write().await;
        state.services.insert(service.id, service);
    }

    pub async fn insert_check(
        &self,
        service_id: i64,
        status: CheckStatus,
        response_time: u64,
        status_code: u16,
        checked_at: DateTime<Utc>,
    ) -> i64 {
        let mut state = self.inner.write().await;
        state.next_check_id += 1;
        let id = state.next_check_id;
        state.checks.push(StatusCheck {
            id,
            service_id,
            status,
            response_time,
            status_code,
            checked_at,
        });
        id
    }

    pub async fn service(&self, id: i64) -> Option<Service> {
        self.inner.read().await.services.get(&id).cloned()
    }

    pub async fn check_count(&self) -> usize {
        self.inner.read().await.checks.len()
    }

    fn guard_read(&self) -> Result<()> {
        match FaultMode::from_u8(self.fault.load(Ordering::SeqCst)) {
            FaultMode::Reads | FaultMode::All => Err(crate::err!("injected read fault")),
            _ => Ok(()),
        }
    }

    fn guard_write(&self) -> Result<()> {
        match FaultMode::from_u8(self.fault.load(Ordering::SeqCst)) {
            FaultMode::Writes | FaultMode::All => Err(crate::err!("injected write fault")),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn services_with_status(
        &self,
        domain: &str,
        status: ServiceStatus,
    ) -> Result<Vec<Service>> {
        self.guard_read()?;
        let state = self.inner.read().await;
        Ok(state
            .services
            .values()
            .filter(|service| service.domain == domain && service.status == status)
            .cloned()
            .collect())
    }

    async fn update_cached_status(
        &self,
        service_id: i64,
        status: ServiceStatus,
        response_time: u64,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        self.guard_write()?;
        let mut state = self.inner.write().await;
        if let Some(service) = state.services.get_mut(&service_id) {
            service.status = status;
            service.response_time = Some(response_time);
            service.last_checked = Some(checked_at);
        }
        Ok(())
    }

    async fn delete_checks_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.guard_write()?;
        let mut state = self.inner.write().await;
        let before = state.checks.len();
        state.checks.retain(|check| check.checked_at >= cutoff);
        Ok((before - state.checks.len()) as u64)
    }

    async fn service_by_slug(&self, slug: &str) -> Result<Option<Service>> {
        self.guard_read()?;
        let state = self.inner.read().await;
        Ok(state
            .services
            .values()
            .find(|service| service.slug == slug)
            .cloned())
    }

    async fn checks_since(
        &self,
        service_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<StatusCheck>> {
        self.guard_read()?;
        let state = self.inner.read().await;
        let mut checks: Vec<StatusCheck> = state
            .checks
            .iter()
            .filter(|check| check.service_id == service_id && check.checked_at >= since)
            .cloned()
            .collect();
        checks.sort_by_key(|check| (check.checked_at, check.id));
        Ok(checks)
    }

    async fn ping(&self) -> Result<()> {
        self.guard_read()
    }
}
