//! Core service registry functionality
//!
//! This library provides:
//! - Per-role registry tables with ttl based expiry
//! - Announcement and registration intake
//! - The periodic expiry sweeper

pub mod endpoint;
pub mod entry;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod registry;
pub mod role;
pub mod sweeper;
pub mod table;

pub use endpoint::Endpoint;
pub use entry::{EntrySnapshot, ServiceEntry};
pub use error::{ProbeError, RegistryError, Result};
pub use handle::{classify, Handle, RemoteHandle};
pub use metrics::RegistryMetrics;
pub use registry::{IntakeOutcome, ServiceRegistry, DEFAULT_FULL_TTL};
pub use role::ServiceRole;
pub use sweeper::{ExpirySweeper, DEFAULT_SWEEP_PERIOD};
pub use table::{RegistryTable, Upsert};
