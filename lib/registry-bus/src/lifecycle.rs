//! Start and stop of the registry background tasks

use crate::announcer::{Announcer, DEFAULT_ANNOUNCE_TICKS};
use crate::bus::{Announcement, AnnouncementBus, AnnouncementListener};
use crate::registration::RegistrationListener;
use futures::future::join_all;
use registry_core::{ExpirySweeper, ServiceRegistry, DEFAULT_SWEEP_PERIOD};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Timing of the background tasks
#[derive(Clone, Debug)]
pub struct LifecycleConfig {
    /// Length of one ttl tick
    pub sweep_period: Duration,
    /// Ticks between two self-announcements
    pub announce_ticks: RangeInclusive<u32>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            sweep_period: DEFAULT_SWEEP_PERIOD,
            announce_ticks: DEFAULT_ANNOUNCE_TICKS,
        }
    }
}

/// Running background tasks sharing one shutdown signal
pub struct Lifecycle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Lifecycle {
    /// Spawn the sweeper, the intake listeners and, given an identity to
    /// announce, the self-announcer
    pub fn start(
        registry: Arc<ServiceRegistry>,
        bus: &AnnouncementBus,
        registrations: RegistrationListener,
        identity: Option<Announcement>,
        config: LifecycleConfig,
    ) -> Self {
        let (shutdown, signal) = watch::channel(false);
        let mut tasks = Vec::new();

        let sweeper = ExpirySweeper::new(registry.clone(), config.sweep_period);
        tasks.push(("sweeper", sweeper.spawn(signal.clone())));

        let listener = AnnouncementListener::new(registry, bus);
        tasks.push(("announcement-listener", listener.spawn(signal.clone())));
        tasks.push(("registration-listener", registrations.spawn(signal.clone())));

        if let Some(identity) = identity {
            let announcer = Announcer::new(
                bus.clone(),
                identity,
                config.sweep_period,
                config.announce_ticks,
            );
            tasks.push(("announcer", announcer.spawn(signal)));
        }

        info!("Started {} background tasks", tasks.len());
        Self { shutdown, tasks }
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|(name, _)| *name).collect()
    }

    /// Signal shutdown and wait for every task to finish
    pub async fn stop(self) {
        // Receivers also stop when the sender is gone, so a send error is fine
        let _ = self.shutdown.send(true);

        let (names, handles): (Vec<_>, Vec<_>) = self.tasks.into_iter().unzip();
        for (name, result) in names.into_iter().zip(join_all(handles).await) {
            if let Err(e) = result {
                error!("Task {} ended abnormally: {}", name, e);
            }
        }
        info!("Background tasks stopped");
    }
}
