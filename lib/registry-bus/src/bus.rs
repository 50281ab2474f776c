//! Broadcast of heartbeat announcements
//!
//! Every subscriber sees every announcement published after it subscribed.
//! The registry subscribes one [`AnnouncementListener`] that feeds the
//! heartbeat intake path.

use registry_core::{Handle, IntakeOutcome, ServiceRegistry};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Default number of announcements buffered per subscriber
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// "This instance is alive now"
#[derive(Clone, Debug)]
pub struct Announcement {
    pub service_id: String,
    pub handle: Handle,
}

impl Announcement {
    pub fn new(service_id: impl Into<String>, handle: Handle) -> Self {
        Self {
            service_id: service_id.into(),
            handle,
        }
    }
}

/// In-process announcement topic
#[derive(Clone)]
pub struct AnnouncementBus {
    sender: broadcast::Sender<Announcement>,
}

impl AnnouncementBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to current subscribers. Returns how many received it.
    pub fn publish(&self, announcement: Announcement) -> usize {
        match self.sender.send(announcement) {
            Ok(receivers) => receivers,
            // Nobody listening yet
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Announcement> {
        self.sender.subscribe()
    }
}

impl Default for AnnouncementBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

/// Feeds announcements from the bus into the registry heartbeat path
pub struct AnnouncementListener {
    registry: Arc<ServiceRegistry>,
    receiver: broadcast::Receiver<Announcement>,
}

impl AnnouncementListener {
    pub fn new(registry: Arc<ServiceRegistry>, bus: &AnnouncementBus) -> Self {
        Self {
            registry,
            receiver: bus.subscribe(),
        }
    }

    async fn handle(&self, announcement: Announcement) {
        let Announcement { service_id, handle } = announcement;
        match self.registry.announce(handle, &service_id).await {
            Ok(IntakeOutcome::Inserted(role)) => {
                debug!("New {} service {} announced", role, service_id)
            }
            Ok(outcome) => debug!("Announcement from {}: {:?}", service_id, outcome),
            Err(e) => error!("Failed to apply announcement from {}: {}", service_id, e),
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                received = self.receiver.recv() => match received {
                    Ok(announcement) => self.handle(announcement).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Announcement listener lagged, {} announcements dropped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Announcement bus closed");
                        break;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
