//! Live instance selection on top of the service registry
pub mod health_check;
pub mod selector;

#[cfg(test)]
mod mock;

pub use health_check::{HealthCheckConfig, HealthChecker};
pub use selector::ProxySelector;
