//! Service registry: the three role tables and the intake paths that fill them

use crate::entry::EntrySnapshot;
use crate::handle::classify;
use crate::table::{RegistryTable, Upsert};
use crate::{Handle, RegistryError, RegistryMetrics, Result, ServiceRole};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Ticks an entry survives without renewal
pub const DEFAULT_FULL_TTL: u32 = 10;

/// What an announcement or registration did to the registry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// A new entry was created
    Inserted(ServiceRole),
    /// An existing entry was brought back to full ttl
    Renewed(ServiceRole),
    /// Registration for an id the role table already knows; nothing changed
    AlreadyKnown(ServiceRole),
    /// The id is already held by the `held_by` table; nothing changed
    Conflict {
        role: ServiceRole,
        held_by: ServiceRole,
    },
    /// The handle satisfied no backend role; nothing changed
    Rejected,
}

impl IntakeOutcome {
    fn labels(&self) -> (&'static str, &'static str) {
        match self {
            IntakeOutcome::Inserted(role) => (role.as_str(), "inserted"),
            IntakeOutcome::Renewed(role) => (role.as_str(), "renewed"),
            IntakeOutcome::AlreadyKnown(role) => (role.as_str(), "already_known"),
            IntakeOutcome::Conflict { role, .. } => (role.as_str(), "conflict"),
            IntakeOutcome::Rejected => ("none", "rejected"),
        }
    }
}

/// ServiceRegistry keeps one independently locked table per backend role
pub struct ServiceRegistry {
    authenticators: Mutex<RegistryTable>,
    catalogs: Mutex<RegistryTable>,
    file_services: Mutex<RegistryTable>,
    // Serializes intake so an id cannot land in two tables at once
    intake: Mutex<()>,
    full_ttl: u32,
    metrics: RegistryMetrics,
}

impl ServiceRegistry {
    pub fn new(full_ttl: u32, metrics: RegistryMetrics) -> Self {
        Self {
            authenticators: Mutex::new(RegistryTable::new(ServiceRole::Authenticator)),
            catalogs: Mutex::new(RegistryTable::new(ServiceRole::Catalog)),
            file_services: Mutex::new(RegistryTable::new(ServiceRole::FileService)),
            intake: Mutex::new(()),
            full_ttl,
            metrics,
        }
    }

    pub fn full_ttl(&self) -> u32 {
        self.full_ttl
    }

    pub fn metrics(&self) -> &RegistryMetrics {
        &self.metrics
    }

    /// The table holding entries of `role`
    pub fn table(&self, role: ServiceRole) -> Result<&Mutex<RegistryTable>> {
        match role {
            ServiceRole::Authenticator => Ok(&self.authenticators),
            ServiceRole::Catalog => Ok(&self.catalogs),
            ServiceRole::FileService => Ok(&self.file_services),
            ServiceRole::Main => Err(RegistryError::UnsupportedRole(role)),
        }
    }

    /// Heartbeat path: insert the instance or renew its ttl
    pub async fn announce(&self, handle: Handle, service_id: &str) -> Result<IntakeOutcome> {
        let outcome = match classify(handle.as_ref()).await {
            Some(role) => {
                let _intake = self.intake.lock().await;
                if let Some(held_by) = self.held_elsewhere(role, service_id).await? {
                    warn!(
                        "Ignoring {} announcement from {} at {}: id already registered as {}",
                        role,
                        service_id,
                        handle.endpoint(),
                        held_by
                    );
                    IntakeOutcome::Conflict { role, held_by }
                } else {
                    let mut table = self.lock(role).await?;
                    let outcome = match table.upsert_on_announce(service_id, handle, self.full_ttl)
                    {
                        Upsert::Inserted => IntakeOutcome::Inserted(role),
                        Upsert::Renewed => IntakeOutcome::Renewed(role),
                    };
                    self.metrics.set_entries(role, table.len());
                    outcome
                }
            }
            None => {
                warn!(
                    "Ignoring announcement from {} at {}: no known backend role",
                    service_id,
                    handle.endpoint()
                );
                IntakeOutcome::Rejected
            }
        };
        let (role, result) = outcome.labels();
        self.metrics.record_announcement(role, result);
        Ok(outcome)
    }

    /// First-contact path: insert the instance only if its id is new
    pub async fn new_service(&self, handle: Handle, service_id: &str) -> Result<IntakeOutcome> {
        let outcome = match classify(handle.as_ref()).await {
            Some(role) => {
                let _intake = self.intake.lock().await;
                if let Some(held_by) = self.held_elsewhere(role, service_id).await? {
                    warn!(
                        "Ignoring {} registration of {} at {}: id already registered as {}",
                        role,
                        service_id,
                        handle.endpoint(),
                        held_by
                    );
                    IntakeOutcome::Conflict { role, held_by }
                } else {
                    let mut table = self.lock(role).await?;
                    if table.insert_if_absent(service_id, handle, self.full_ttl) {
                        self.metrics.set_entries(role, table.len());
                        IntakeOutcome::Inserted(role)
                    } else {
                        debug!("{} {} already registered", role, service_id);
                        IntakeOutcome::AlreadyKnown(role)
                    }
                }
            }
            None => {
                warn!(
                    "Invalid proxy type for service {} at {}",
                    service_id,
                    handle.endpoint()
                );
                IntakeOutcome::Rejected
            }
        };
        let (role, result) = outcome.labels();
        self.metrics.record_registration(role, result);
        Ok(outcome)
    }

    /// Age every table by one tick. Returns the number of expired entries.
    pub async fn tick_all(&self) -> Result<usize> {
        let mut expired = 0;
        for role in ServiceRole::BACKENDS {
            let mut table = self.lock(role).await?;
            let removed = table.tick();
            if !removed.is_empty() {
                debug!("Expired {} {} entries: {:?}", removed.len(), role, removed);
                self.metrics.record_evictions(role, "expired", removed.len());
            }
            self.metrics.set_entries(role, table.len());
            expired += removed.len();
        }
        Ok(expired)
    }

    /// Drop an entry whose handle failed a liveness probe
    pub async fn evict_unresponsive(
        &self,
        role: ServiceRole,
        service_id: &str,
        handle: &Handle,
    ) -> Result<bool> {
        let mut table = self.lock(role).await?;
        let evicted = table.evict(service_id, handle);
        if evicted {
            self.metrics.record_evictions(role, "probe_failed", 1);
            self.metrics.set_entries(role, table.len());
        }
        Ok(evicted)
    }

    /// Number of live entries of `role`
    pub async fn len(&self, role: ServiceRole) -> Result<usize> {
        Ok(self.lock(role).await?.len())
    }

    /// Remaining ttl of `service_id` in the `role` table
    pub async fn ttl(&self, role: ServiceRole, service_id: &str) -> Result<Option<u32>> {
        Ok(self.lock(role).await?.ttl(service_id))
    }

    /// All entries of every role
    pub async fn snapshot(&self) -> Result<Vec<EntrySnapshot>> {
        let mut entries = Vec::new();
        for role in ServiceRole::BACKENDS {
            entries.extend(self.lock(role).await?.snapshot());
        }
        Ok(entries)
    }

    /// The other backend table already holding `service_id`, if any.
    ///
    /// Locks one table at a time. Callers hold the intake lock, and nothing
    /// else inserts, so the answer stays valid until their own insert.
    async fn held_elsewhere(
        &self,
        role: ServiceRole,
        service_id: &str,
    ) -> Result<Option<ServiceRole>> {
        for other in ServiceRole::BACKENDS {
            if other != role && self.lock(other).await?.contains(service_id) {
                return Ok(Some(other));
            }
        }
        Ok(None)
    }

    async fn lock(&self, role: ServiceRole) -> Result<MutexGuard<'_, RegistryTable>> {
        Ok(self.table(role)?.lock().await)
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_FULL_TTL, RegistryMetrics::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::mock::MockHandle;

    const SERVICE_ID: &str = "test_id";

    fn registry() -> ServiceRegistry {
        ServiceRegistry::default()
    }

    #[tokio::test]
    async fn test_announce_new_proxy_per_role() {
        let registry = registry();
        for role in ServiceRole::BACKENDS {
            let handle = MockHandle::new("h", &[role]);
            assert_eq!(
                registry.announce(handle, role.as_str()).await.unwrap(),
                IntakeOutcome::Inserted(role)
            );
            assert_eq!(
                registry.ttl(role, role.as_str()).await.unwrap(),
                Some(DEFAULT_FULL_TTL)
            );
        }
    }

    #[tokio::test]
    async fn test_announce_renews_saved_proxy() {
        let registry = registry();
        let handle = MockHandle::new("auth", &[ServiceRole::Authenticator]);
        registry.announce(handle.clone(), SERVICE_ID).await.unwrap();
        for _ in 0..5 {
            registry.tick_all().await.unwrap();
        }
        assert_eq!(
            registry.ttl(ServiceRole::Authenticator, SERVICE_ID).await.unwrap(),
            Some(DEFAULT_FULL_TTL - 5)
        );
        assert_eq!(
            registry.announce(handle, SERVICE_ID).await.unwrap(),
            IntakeOutcome::Renewed(ServiceRole::Authenticator)
        );
        assert_eq!(
            registry.ttl(ServiceRole::Authenticator, SERVICE_ID).await.unwrap(),
            Some(DEFAULT_FULL_TTL)
        );
    }

    #[tokio::test]
    async fn test_announce_idempotent() {
        let registry = registry();
        let handle = MockHandle::new("cat", &[ServiceRole::Catalog]);
        for _ in 0..4 {
            registry.announce(handle.clone(), SERVICE_ID).await.unwrap();
        }
        assert_eq!(registry.len(ServiceRole::Catalog).await.unwrap(), 1);
        assert_eq!(
            registry.ttl(ServiceRole::Catalog, SERVICE_ID).await.unwrap(),
            Some(DEFAULT_FULL_TTL)
        );
    }

    #[tokio::test]
    async fn test_announce_invalid_proxy() {
        let registry = registry();
        let main = MockHandle::new("main", &[ServiceRole::Main]);
        let object = MockHandle::new("object", &[]);
        let outcome = registry.announce(main, SERVICE_ID).await.unwrap();
        assert_eq!(outcome, IntakeOutcome::Rejected);
        let outcome = registry.announce(object, SERVICE_ID).await.unwrap();
        assert_eq!(outcome, IntakeOutcome::Rejected);
        assert!(registry.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_new_service_first_contact_only() {
        let registry = registry();
        let handle = MockHandle::new("files", &[ServiceRole::FileService]);
        assert_eq!(
            registry.new_service(handle.clone(), SERVICE_ID).await.unwrap(),
            IntakeOutcome::Inserted(ServiceRole::FileService)
        );
        registry.tick_all().await.unwrap();
        assert_eq!(
            registry.new_service(handle, SERVICE_ID).await.unwrap(),
            IntakeOutcome::AlreadyKnown(ServiceRole::FileService)
        );
        assert_eq!(
            registry.ttl(ServiceRole::FileService, SERVICE_ID).await.unwrap(),
            Some(DEFAULT_FULL_TTL - 1)
        );
    }

    #[tokio::test]
    async fn test_new_service_invalid_proxy() {
        let registry = registry();
        let object = MockHandle::new("object", &[]);
        let outcome = registry.new_service(object, SERVICE_ID).await.unwrap();
        assert_eq!(outcome, IntakeOutcome::Rejected);
        assert!(registry.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tick_all_expires_every_role() {
        let registry = registry();
        for role in ServiceRole::BACKENDS {
            registry
                .announce(MockHandle::new("h", &[role]), role.as_str())
                .await
                .unwrap();
        }
        for _ in 0..DEFAULT_FULL_TTL - 1 {
            assert_eq!(registry.tick_all().await.unwrap(), 0);
        }
        for role in ServiceRole::BACKENDS {
            assert_eq!(registry.ttl(role, role.as_str()).await.unwrap(), Some(1));
        }
        assert_eq!(registry.tick_all().await.unwrap(), 3);
        assert!(registry.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_evict_unresponsive() {
        let registry = registry();
        let handle = MockHandle::new("cat", &[ServiceRole::Catalog]);
        let shared: Handle = handle.clone();
        registry.announce(shared.clone(), SERVICE_ID).await.unwrap();
        assert!(registry
            .evict_unresponsive(ServiceRole::Catalog, SERVICE_ID, &shared)
            .await
            .unwrap());
        assert_eq!(registry.len(ServiceRole::Catalog).await.unwrap(), 0);
        assert!(!registry
            .evict_unresponsive(ServiceRole::Catalog, SERVICE_ID, &shared)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_id_held_by_one_role_only() {
        let registry = registry();
        let auth = MockHandle::new("auth", &[ServiceRole::Authenticator]);
        let catalog = MockHandle::new("cat", &[ServiceRole::Catalog]);
        registry.announce(auth, "dup").await.unwrap();

        let conflict = IntakeOutcome::Conflict {
            role: ServiceRole::Catalog,
            held_by: ServiceRole::Authenticator,
        };
        assert_eq!(
            registry.announce(catalog.clone(), "dup").await.unwrap(),
            conflict
        );
        assert_eq!(registry.new_service(catalog.clone(), "dup").await.unwrap(), conflict);
        assert_eq!(registry.len(ServiceRole::Authenticator).await.unwrap(), 1);
        assert_eq!(registry.len(ServiceRole::Catalog).await.unwrap(), 0);

        // once the old entry expires the id may come back under another role
        for _ in 0..DEFAULT_FULL_TTL {
            registry.tick_all().await.unwrap();
        }
        assert_eq!(
            registry.announce(catalog, "dup").await.unwrap(),
            IntakeOutcome::Inserted(ServiceRole::Catalog)
        );
        assert_eq!(registry.len(ServiceRole::Authenticator).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_intake_keeps_one_role_per_id() {
        let registry = std::sync::Arc::new(registry());
        let tasks: Vec<_> = ServiceRole::BACKENDS
            .into_iter()
            .map(|role| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    for _ in 0..20 {
                        let handle = MockHandle::new(role.as_str(), &[role]);
                        registry.announce(handle, "shared").await.unwrap();
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let mut held = 0;
        for role in ServiceRole::BACKENDS {
            held += registry.len(role).await.unwrap();
        }
        assert_eq!(held, 1);
    }

    #[tokio::test]
    async fn test_main_has_no_table() {
        let registry = registry();
        assert!(matches!(
            registry.len(ServiceRole::Main).await,
            Err(RegistryError::UnsupportedRole(ServiceRole::Main))
        ));
    }

    #[tokio::test]
    async fn test_metrics_track_entries() {
        let registry = registry();
        registry
            .announce(MockHandle::new("cat", &[ServiceRole::Catalog]), SERVICE_ID)
            .await
            .unwrap();
        let text = registry.metrics().gather().unwrap();
        assert!(text.contains("registry_entries{role=\"catalog\"} 1"));
    }
}
