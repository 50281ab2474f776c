//! Liveness probing for registered handles

use registry_core::{ProbeError, RemoteHandle};
use std::time::Duration;
use tokio::time;
use tracing::{debug, warn};

/// Health check configuration
#[derive(Clone, Debug)]
pub struct HealthCheckConfig {
    /// Timeout for a single probe
    pub timeout: Duration,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
        }
    }
}

/// Health checker issuing one bounded probe per call
#[derive(Clone, Debug)]
pub struct HealthChecker {
    config: HealthCheckConfig,
}

impl HealthChecker {
    /// Create a new health checker
    pub fn new(config: HealthCheckConfig) -> Self {
        Self { config }
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Probe `handle`, treating a timeout like any other transport failure
    pub async fn probe(&self, handle: &dyn RemoteHandle) -> Result<(), ProbeError> {
        match time::timeout(self.config.timeout, handle.ping()).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout),
        }
    }

    /// Check if a handle answers its liveness probe
    pub async fn check_handle(&self, handle: &dyn RemoteHandle) -> bool {
        match self.probe(handle).await {
            Ok(()) => {
                debug!("Service at {} is alive", handle.endpoint());
                true
            }
            Err(ProbeError::Timeout) => {
                warn!("Service at {} probe timeout", handle.endpoint());
                false
            }
            Err(e) => {
                warn!("Service at {} probe failed: {}", handle.endpoint(), e);
                false
            }
        }
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new(HealthCheckConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockHandle;
    use registry_core::ServiceRole;

    #[test]
    fn test_default_config() {
        let config = HealthCheckConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_check_alive_and_dead() {
        let checker = HealthChecker::default();
        let handle = MockHandle::new("cat", ServiceRole::Catalog);
        assert!(checker.check_handle(handle.as_ref()).await);
        handle.set_alive(false);
        assert!(!checker.check_handle(handle.as_ref()).await);
    }

    #[tokio::test]
    async fn test_hanging_probe_times_out() {
        let checker = HealthChecker::new(HealthCheckConfig {
            timeout: Duration::from_millis(20),
        });
        let handle = MockHandle::new("slow", ServiceRole::Catalog);
        handle.set_delay(Duration::from_secs(5));
        assert!(matches!(
            checker.probe(handle.as_ref()).await,
            Err(ProbeError::Timeout)
        ));
        assert!(!checker.check_handle(handle.as_ref()).await);
    }
}
