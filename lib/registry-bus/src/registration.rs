//! Direct registration channel
//!
//! Registrations are point-to-point first-contact events. They are queued
//! on an mpsc channel and applied by a single [`RegistrationListener`].

use crate::{BusError, Result};
use registry_core::{Handle, IntakeOutcome, ServiceRegistry};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// "This instance exists"
#[derive(Clone, Debug)]
pub struct Registration {
    pub service_id: String,
    pub handle: Handle,
}

impl Registration {
    pub fn new(service_id: impl Into<String>, handle: Handle) -> Self {
        Self {
            service_id: service_id.into(),
            handle,
        }
    }
}

/// Sending side of the registration channel
#[derive(Clone)]
pub struct RegistrationChannel {
    sender: mpsc::Sender<Registration>,
}

impl RegistrationChannel {
    /// Create a channel and the listener that drains it into `registry`
    pub fn new(registry: Arc<ServiceRegistry>, capacity: usize) -> (Self, RegistrationListener) {
        let (sender, receiver) = mpsc::channel(capacity);
        (
            Self { sender },
            RegistrationListener { registry, receiver },
        )
    }

    pub async fn register(&self, registration: Registration) -> Result<()> {
        self.sender
            .send(registration)
            .await
            .map_err(|_| BusError::Closed("registration"))
    }
}

/// Applies queued registrations to the registry first-contact path
pub struct RegistrationListener {
    registry: Arc<ServiceRegistry>,
    receiver: mpsc::Receiver<Registration>,
}

impl RegistrationListener {
    async fn handle(&self, registration: Registration) {
        let Registration { service_id, handle } = registration;
        let endpoint = handle.endpoint();
        match self.registry.new_service(handle, &service_id).await {
            Ok(IntakeOutcome::Inserted(role)) => {
                info!("Registered {} service {} at {}", role, service_id, endpoint)
            }
            Ok(outcome) => debug!("Registration from {}: {:?}", service_id, outcome),
            Err(e) => error!("Failed to apply registration from {}: {}", service_id, e),
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                received = self.receiver.recv() => match received {
                    Some(registration) => self.handle(registration).await,
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("Registration listener stopped");
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
