//! Service roles known to the registry

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of backend a remote handle implements
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceRole {
    /// The registry itself. Announced to peers, never stored.
    Main,
    /// Authentication service
    Authenticator,
    /// Media catalog service
    Catalog,
    /// File delivery service
    FileService,
}

impl ServiceRole {
    /// Backend roles in classification priority order
    pub const BACKENDS: [ServiceRole; 3] = [
        ServiceRole::Authenticator,
        ServiceRole::Catalog,
        ServiceRole::FileService,
    ];

    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceRole::Main => "main",
            ServiceRole::Authenticator => "authenticator",
            ServiceRole::Catalog => "catalog",
            ServiceRole::FileService => "file_service",
        }
    }

    /// Whether entries of this role are kept in a registry table
    pub fn is_backend(&self) -> bool {
        !matches!(self, ServiceRole::Main)
    }
}

impl fmt::Display for ServiceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
