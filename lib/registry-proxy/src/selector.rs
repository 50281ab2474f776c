//! Round-robin selection of live instances
//!
//! Each call reserves the instance under the role table's cursor, moving the
//! cursor past it before probing, so concurrent callers spread over different
//! instances. A responsive instance is returned. An unresponsive one is
//! evicted on the spot and the walk continues, so a call may clear out several
//! dead instances before it returns.

use crate::HealthChecker;
use registry_core::{Handle, RegistryError, Result, ServiceRegistry, ServiceRole};
use std::sync::Arc;
use tracing::{debug, warn};

/// Hands out live instances of each backend role
pub struct ProxySelector {
    registry: Arc<ServiceRegistry>,
    checker: HealthChecker,
}

impl ProxySelector {
    pub fn new(registry: Arc<ServiceRegistry>, checker: HealthChecker) -> Self {
        Self { registry, checker }
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Return a live instance of `role`.
    ///
    /// Fails with [`RegistryError::TemporaryUnavailable`] once the role table
    /// is empty. The table lock is not held while probing.
    pub async fn get(&self, role: ServiceRole) -> Result<Handle> {
        let table = self.registry.table(role)?;
        let metrics = self.registry.metrics();

        loop {
            let reserved = table.lock().await.reserve();
            let Some((service_id, handle)) = reserved else {
                metrics.record_selection(role, "unavailable");
                debug!("No {} instance left to select", role);
                return Err(RegistryError::TemporaryUnavailable(role));
            };

            if self.checker.check_handle(handle.as_ref()).await {
                metrics.record_selection(role, "ok");
                debug!("Selected {} {} at {}", role, service_id, handle.endpoint());
                return Ok(handle);
            }

            warn!(
                "Evicting unresponsive {} {} at {}",
                role,
                service_id,
                handle.endpoint()
            );
            self.registry
                .evict_unresponsive(role, &service_id, &handle)
                .await?;
        }
    }

    pub async fn get_authenticator(&self) -> Result<Handle> {
        self.get(ServiceRole::Authenticator).await
    }

    pub async fn get_catalog(&self) -> Result<Handle> {
        self.get(ServiceRole::Catalog).await
    }

    pub async fn get_file_service(&self) -> Result<Handle> {
        self.get(ServiceRole::FileService).await
    }
}
