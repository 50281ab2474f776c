//! Announcement and registration plumbing for the service registry
pub mod announcer;
pub mod bus;
pub mod error;
pub mod lifecycle;
pub mod registration;

pub use announcer::{Announcer, DEFAULT_ANNOUNCE_TICKS};
pub use bus::{Announcement, AnnouncementBus, AnnouncementListener, DEFAULT_BUS_CAPACITY};
pub use error::{BusError, Result};
pub use lifecycle::{Lifecycle, LifecycleConfig};
pub use registration::{Registration, RegistrationChannel, RegistrationListener};
