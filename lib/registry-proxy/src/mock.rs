//! Test handle with switchable liveness

use async_trait::async_trait;
use registry_core::{ProbeError, RemoteHandle, ServiceRole};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
pub struct MockHandle {
    name: String,
    role: ServiceRole,
    alive: AtomicBool,
    delay_ms: AtomicU64,
    pings: AtomicUsize,
}

impl MockHandle {
    pub fn new(name: &str, role: ServiceRole) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            role,
            alive: AtomicBool::new(true),
            delay_ms: AtomicU64::new(0),
            pings: AtomicUsize::new(0),
        })
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteHandle for MockHandle {
    fn endpoint(&self) -> String {
        self.name.clone()
    }

    async fn is_a(&self, role: ServiceRole) -> bool {
        self.role == role
    }

    async fn ping(&self) -> Result<(), ProbeError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.alive.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ProbeError::Refused(self.name.clone()))
        }
    }
}
