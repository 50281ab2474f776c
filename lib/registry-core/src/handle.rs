//! Remote handle abstraction
//!
//! A handle is a capability to reach one remote instance. The registry only
//! holds references to handles; it never creates or tears down the instance
//! behind one.

use crate::{ProbeError, ServiceRole};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Reference to a remote service instance
#[async_trait]
pub trait RemoteHandle: Send + Sync + fmt::Debug {
    /// Human readable location of the instance, used for logging
    fn endpoint(&self) -> String;

    /// Whether this handle is usable as `role`
    async fn is_a(&self, role: ServiceRole) -> bool;

    /// Lightweight liveness probe
    async fn ping(&self) -> Result<(), ProbeError>;
}

/// Shared handle as stored in registry tables
pub type Handle = Arc<dyn RemoteHandle>;

/// Classify a handle into the first backend role it satisfies.
///
/// Roles are tried in [`ServiceRole::BACKENDS`] order. `None` means the handle
/// satisfies no backend role; `Main` handles always land here.
pub async fn classify(handle: &dyn RemoteHandle) -> Option<ServiceRole> {
    for role in ServiceRole::BACKENDS {
        if handle.is_a(role).await {
            return Some(role);
        }
    }
    None
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;

    /// Handle advertising a fixed set of roles; always answers probes
    #[derive(Debug)]
    pub struct MockHandle {
        pub name: String,
        pub roles: Vec<ServiceRole>,
    }

    impl MockHandle {
        pub fn new(name: &str, roles: &[ServiceRole]) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                roles: roles.to_vec(),
            })
        }
    }

    #[async_trait]
    impl RemoteHandle for MockHandle {
        fn endpoint(&self) -> String {
            self.name.clone()
        }

        async fn is_a(&self, role: ServiceRole) -> bool {
            self.roles.contains(&role)
        }

        async fn ping(&self) -> Result<(), ProbeError> {
            Ok(())
        }
    }
}
