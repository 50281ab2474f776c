//! Periodic self-announcement so peers can discover this registry

use crate::{Announcement, AnnouncementBus};
use rand::Rng;
use std::ops::RangeInclusive;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, trace};

/// Default spread of ticks between two announcements
pub const DEFAULT_ANNOUNCE_TICKS: RangeInclusive<u32> = 5..=8;

/// Publishes the same announcement at a randomized period
pub struct Announcer {
    bus: AnnouncementBus,
    announcement: Announcement,
    tick: Duration,
    ticks: RangeInclusive<u32>,
}

impl Announcer {
    /// `ticks` is clamped to a non-empty range of at least one tick
    pub fn new(
        bus: AnnouncementBus,
        announcement: Announcement,
        tick: Duration,
        ticks: RangeInclusive<u32>,
    ) -> Self {
        let low = (*ticks.start()).max(1);
        let high = (*ticks.end()).max(low);
        Self {
            bus,
            announcement,
            tick,
            ticks: low..=high,
        }
    }

    /// Delay before the next round
    pub fn next_delay(&self) -> Duration {
        let ticks = rand::thread_rng().gen_range(self.ticks.clone());
        self.tick * ticks
    }

    pub fn announce(&self) -> usize {
        let delivered = self.bus.publish(self.announcement.clone());
        trace!(
            "Announced {} to {} subscribers",
            self.announcement.service_id,
            delivered
        );
        delivered
    }

    /// Announce now, then once per randomized period until shut down
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        debug!(
            "Announcing {} at {} every {:?} ticks",
            self.announcement.service_id,
            self.announcement.handle.endpoint(),
            self.ticks
        );
        self.announce();

        loop {
            let delay = self.next_delay();
            tokio::select! {
                _ = time::sleep(delay) => {
                    self.announce();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        debug!("Announcer for {} stopped", self.announcement.service_id);
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registry_core::{Endpoint, ServiceRole};
    use std::sync::Arc;

    fn announcer(bus: &AnnouncementBus, tick: Duration) -> Announcer {
        let handle = Arc::new(Endpoint::new("127.0.0.1", 9090, vec![ServiceRole::Main]));
        Announcer::new(
            bus.clone(),
            Announcement::new("main-1", handle),
            tick,
            DEFAULT_ANNOUNCE_TICKS,
        )
    }

    #[test]
    fn test_delay_within_range() {
        let bus = AnnouncementBus::default();
        let announcer = announcer(&bus, Duration::from_secs(1));
        for _ in 0..100 {
            let delay = announcer.next_delay();
            assert!(delay >= Duration::from_secs(5));
            assert!(delay <= Duration::from_secs(8));
        }
    }

    #[test]
    fn test_degenerate_ranges_are_clamped() {
        let bus = AnnouncementBus::default();
        let handle = Arc::new(Endpoint::new("127.0.0.1", 9090, vec![ServiceRole::Main]));
        let tick = Duration::from_secs(1);

        #[allow(clippy::reversed_empty_ranges)]
        let reversed = Announcer::new(
            bus.clone(),
            Announcement::new("main-1", handle.clone()),
            tick,
            8..=5,
        );
        assert_eq!(reversed.next_delay(), Duration::from_secs(8));

        let zero = Announcer::new(bus, Announcement::new("main-1", handle), tick, 0..=0);
        assert_eq!(zero.next_delay(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_announces_repeatedly_until_stopped() {
        let bus = AnnouncementBus::default();
        let mut receiver = bus.subscribe();
        let (tx, rx) = watch::channel(false);
        let task = announcer(&bus, Duration::from_millis(2)).spawn(rx);

        for _ in 0..3 {
            let announcement = time::timeout(Duration::from_secs(1), receiver.recv())
                .await
                .expect("no announcement")
                .unwrap();
            assert_eq!(announcement.service_id, "main-1");
        }

        tx.send(true).unwrap();
        time::timeout(Duration::from_secs(1), task)
            .await
            .expect("announcer did not stop")
            .unwrap();
    }
}
