//! Registry entries
use crate::{Handle, ServiceRole};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// One registered instance and its remaining lifetime in sweep ticks
#[derive(Clone, Debug)]
pub struct ServiceEntry {
    pub handle: Handle,
    pub ttl: u32,
    pub first_seen: DateTime<Utc>,
}

impl ServiceEntry {
    pub fn new(handle: Handle, ttl: u32) -> Self {
        Self {
            handle,
            ttl,
            first_seen: Utc::now(),
        }
    }

    /// Whether `other` refers to the same remote instance reference
    pub fn holds(&self, other: &Handle) -> bool {
        same_handle(&self.handle, other)
    }
}

/// Identity comparison of two handles, ignoring vtable metadata
pub fn same_handle(a: &Handle, b: &Handle) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Serializable view of an entry
#[derive(Clone, Debug, Serialize)]
pub struct EntrySnapshot {
    pub role: ServiceRole,
    pub service_id: String,
    pub endpoint: String,
    pub ttl: u32,
    pub first_seen: DateTime<Utc>,
}
