use crate::ServiceRole;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("No live {0} instance available, try again later")]
    TemporaryUnavailable(ServiceRole),

    #[error("Role {0} is not kept in the registry")]
    UnsupportedRole(ServiceRole),

    #[error("Metrics error: {0}")]
    MetricsError(#[from] prometheus::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure of a liveness probe against a remote handle
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Probe timed out")]
    Timeout,

    #[error("Remote refused the probe: {0}")]
    Refused(String),
}
