//! Per-role table of registered instances
//!
//! A `RegistryTable` is plain data. Callers wrap it in a lock; every method
//! assumes exclusive access for its duration.

use crate::entry::{EntrySnapshot, ServiceEntry};
use crate::{Handle, ServiceRole};
use std::collections::HashMap;
use tracing::debug;

/// Result of an announcement applied to a table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Renewed,
}

/// Instances of one role keyed by service id, with a round-robin cursor
#[derive(Debug)]
pub struct RegistryTable {
    role: ServiceRole,
    entries: HashMap<String, ServiceEntry>,
    // Insertion order of ids; the cursor indexes into this
    order: Vec<String>,
    cursor: usize,
}

impl RegistryTable {
    pub fn new(role: ServiceRole) -> Self {
        Self {
            role,
            entries: HashMap::new(),
            order: Vec::new(),
            cursor: 0,
        }
    }

    pub fn role(&self) -> ServiceRole {
        self.role
    }

    /// Insert `id` with a full ttl, or reset the ttl of the existing entry.
    ///
    /// The stored handle is kept on renewal.
    pub fn upsert_on_announce(&mut self, id: &str, handle: Handle, full_ttl: u32) -> Upsert {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.ttl = full_ttl;
            debug!("Renewed {} {} (ttl {})", self.role, id, full_ttl);
            return Upsert::Renewed;
        }
        self.insert(id, handle, full_ttl);
        Upsert::Inserted
    }

    /// Insert `id` only if it is not present. Returns whether it was inserted.
    pub fn insert_if_absent(&mut self, id: &str, handle: Handle, full_ttl: u32) -> bool {
        if self.entries.contains_key(id) {
            return false;
        }
        self.insert(id, handle, full_ttl);
        true
    }

    fn insert(&mut self, id: &str, handle: Handle, full_ttl: u32) {
        debug!("Inserted {} {} at {} (ttl {})", self.role, id, handle.endpoint(), full_ttl);
        self.entries
            .insert(id.to_string(), ServiceEntry::new(handle, full_ttl));
        self.order.push(id.to_string());
    }

    /// Age every entry by one tick and drop those that reach zero.
    ///
    /// Returns the ids removed in this pass.
    pub fn tick(&mut self) -> Vec<String> {
        let mut expired = Vec::new();
        for id in &self.order {
            if let Some(entry) = self.entries.get_mut(id) {
                entry.ttl = entry.ttl.saturating_sub(1);
                if entry.ttl == 0 {
                    expired.push(id.clone());
                }
            }
        }
        for id in &expired {
            self.remove(id);
            debug!("Expired {} {}", self.role, id);
        }
        expired
    }

    /// The entry under the cursor, if any
    pub fn current(&self) -> Option<(String, Handle)> {
        let id = self.order.get(self.cursor)?;
        self.entries
            .get(id)
            .map(|entry| (id.clone(), entry.handle.clone()))
    }

    /// Take the entry under the cursor and move the cursor past it.
    ///
    /// Concurrent callers each get a different entry until the table wraps.
    pub fn reserve(&mut self) -> Option<(String, Handle)> {
        let reserved = self.current()?;
        self.cursor = (self.cursor + 1) % self.order.len();
        Some(reserved)
    }

    /// Evict `id` if it still holds `handle`. Returns whether it was removed.
    ///
    /// The handle check keeps a stale probe result from evicting an instance
    /// that re-registered under the same id in the meantime.
    pub fn evict(&mut self, id: &str, handle: &Handle) -> bool {
        if !self.holds(id, handle) {
            return false;
        }
        self.remove(id).is_some()
    }

    fn holds(&self, id: &str, handle: &Handle) -> bool {
        self.entries
            .get(id)
            .map(|entry| entry.holds(handle))
            .unwrap_or(false)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.order.iter().position(|candidate| candidate == id)
    }

    fn remove(&mut self, id: &str) -> Option<ServiceEntry> {
        let entry = self.entries.remove(id)?;
        if let Some(index) = self.position(id) {
            self.order.remove(index);
            if index < self.cursor {
                self.cursor -= 1;
            }
        }
        if self.cursor >= self.order.len() {
            self.cursor = 0;
        }
        Some(entry)
    }

    pub fn get(&self, id: &str) -> Option<&ServiceEntry> {
        self.entries.get(id)
    }

    pub fn ttl(&self, id: &str) -> Option<u32> {
        self.entries.get(id).map(|entry| entry.ttl)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order
    pub fn snapshot(&self) -> Vec<EntrySnapshot> {
        self.order
            .iter()
            .filter_map(|id| {
                self.entries.get(id).map(|entry| EntrySnapshot {
                    role: self.role,
                    service_id: id.clone(),
                    endpoint: entry.handle.endpoint(),
                    ttl: entry.ttl,
                    first_seen: entry.first_seen,
                })
            })
            .collect()
    }
}
