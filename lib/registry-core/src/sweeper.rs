//! Periodic ttl sweep over every role table

use crate::ServiceRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Default sweep period; one period is one ttl tick
pub const DEFAULT_SWEEP_PERIOD: Duration = Duration::from_secs(1);

/// Ages registry entries once per period until shut down
pub struct ExpirySweeper {
    registry: Arc<ServiceRegistry>,
    period: Duration,
}

impl ExpirySweeper {
    pub fn new(registry: Arc<ServiceRegistry>, period: Duration) -> Self {
        Self { registry, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run a single sweep pass. Returns the number of expired entries.
    pub async fn sweep_once(&self) -> usize {
        match self.registry.tick_all().await {
            Ok(expired) => {
                if expired > 0 {
                    info!("Sweep expired {} services", expired);
                }
                expired
            }
            Err(e) => {
                error!("Sweep failed: {}", e);
                0
            }
        }
    }

    /// Sweep every period until `shutdown` turns true or its sender is dropped
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        // The first tick fires one full period after start
        let mut interval = time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!("Expiry sweeper started with period {:?}", self.period);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.sweep_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        debug!("Expiry sweeper stopped");
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
