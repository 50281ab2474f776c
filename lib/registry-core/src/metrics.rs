//! Prometheus metrics for registry activity

use crate::{Result, ServiceRole};
use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Counters and gauges describing registry churn
#[derive(Clone)]
pub struct RegistryMetrics {
    /// Announcements received, by role and outcome
    pub announcements_total: IntCounterVec,
    /// Registrations received, by role and outcome
    pub registrations_total: IntCounterVec,
    /// Entries removed, by role and reason
    pub evictions_total: IntCounterVec,
    /// Selection requests, by role and result
    pub selections_total: IntCounterVec,
    /// Live entries per role
    pub entries: IntGaugeVec,
    /// Prometheus registry for metrics
    pub registry: Arc<Registry>,
}

impl RegistryMetrics {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let announcements_total = IntCounterVec::new(
            Opts::new("registry_announcements_total", "Announcements received"),
            &["role", "outcome"],
        )?;
        let registrations_total = IntCounterVec::new(
            Opts::new("registry_registrations_total", "Registrations received"),
            &["role", "outcome"],
        )?;
        let evictions_total = IntCounterVec::new(
            Opts::new("registry_evictions_total", "Entries removed from the registry"),
            &["role", "reason"],
        )?;
        let selections_total = IntCounterVec::new(
            Opts::new("registry_selections_total", "Proxy selection requests"),
            &["role", "result"],
        )?;
        let entries = IntGaugeVec::new(
            Opts::new("registry_entries", "Live entries per role"),
            &["role"],
        )?;

        registry.register(Box::new(announcements_total.clone()))?;
        registry.register(Box::new(registrations_total.clone()))?;
        registry.register(Box::new(evictions_total.clone()))?;
        registry.register(Box::new(selections_total.clone()))?;
        registry.register(Box::new(entries.clone()))?;

        Ok(Self {
            announcements_total,
            registrations_total,
            evictions_total,
            selections_total,
            entries,
            registry,
        })
    }

    pub fn record_announcement(&self, role: &str, outcome: &str) {
        self.announcements_total.with_label_values(&[role, outcome]).inc();
    }

    pub fn record_registration(&self, role: &str, outcome: &str) {
        self.registrations_total.with_label_values(&[role, outcome]).inc();
    }

    pub fn record_evictions(&self, role: ServiceRole, reason: &str, count: usize) {
        self.evictions_total
            .with_label_values(&[role.as_str(), reason])
            .inc_by(count as u64);
    }

    pub fn record_selection(&self, role: ServiceRole, result: &str) {
        self.selections_total
            .with_label_values(&[role.as_str(), result])
            .inc();
    }

    pub fn set_entries(&self, role: ServiceRole, count: usize) {
        self.entries
            .with_label_values(&[role.as_str()])
            .set(count as i64);
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| crate::RegistryError::Internal(e.to_string()))
    }
}

impl Default for RegistryMetrics {
    fn default() -> Self {
        Self::new().expect("Failed to create default RegistryMetrics")
    }
}
