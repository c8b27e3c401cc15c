use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Concurrency gate in front of outbound probes. A `None` or zero limit means unbounded.
#[derive(Clone, Default)]
pub struct BackpressureController {
    semaphore: Option<Arc<Semaphore>>,
    metrics: Arc<ControllerMetrics>,
}

impl BackpressureController {
    pub fn new(limit: Option<usize>) -> Self {
        match limit.filter(|limit| *limit > 0) {
            Some(limit) => Self {
                semaphore: Some(Arc::new(Semaphore::new(limit))),
                metrics: Arc::new(ControllerMetrics {
                    limit: Some(limit),
                    throttled: AtomicU64::new(0),
                    inflight: AtomicU64::new(0),
                }),
            },
            None => Self::default(),
        }
    }

    /// Takes a permit without waiting; a saturated gate counts as throttled.
    pub fn try_acquire_now(&self) -> Option<BackpressurePermit> {
        let Some(semaphore) = &self.semaphore else {
            return Some(BackpressurePermit {
                inner: None,
                metrics: Arc::clone(&self.metrics),
            });
        };

        match semaphore.clone().try_acquire_owned() {
            Ok(permit) => {
                self.metrics.inflight.fetch_add(1, Ordering::Relaxed);
                Some(BackpressurePermit {
                    inner: Some(permit),
                    metrics: Arc::clone(&self.metrics),
                })
            }
            Err(_) => {
                self.metrics.throttled.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            limit: self.metrics.limit,
            inflight: self.metrics.inflight.load(Ordering::Relaxed),
            throttled: self.metrics.throttled.load(Ordering::Relaxed),
        }
    }
}

pub struct BackpressurePermit {
    inner: Option<OwnedSemaphorePermit>,
    metrics: Arc<ControllerMetrics>,
}

impl Drop for BackpressurePermit {
    fn drop(&mut self) {
        if self.inner.is_some() {
            self.metrics.inflight.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

#[derive(Default)]
struct ControllerMetrics {
    limit: Option<usize>,
    throttled: AtomicU64,
    inflight: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub struct ControllerSnapshot {
    pub limit: Option<usize>,
    pub inflight: u64,
    pub throttled: u64,
}

impl ControllerSnapshot {
    pub fn saturated(&self) -> bool {
        match self.limit {
            Some(limit) => self.inflight >= limit as u64,
            None => false,
        }
    }
}
