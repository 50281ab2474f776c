//! Network endpoint handle
use crate::{ProbeError, RemoteHandle, ServiceRole};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tracing::debug;

/// A remote instance reachable over TCP that advertises the roles it serves
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub ip: String,
    pub port: u16,
    #[serde(default)]
    pub roles: Vec<ServiceRole>,
}

impl Endpoint {
    pub fn new(ip: impl Into<String>, port: u16, roles: Vec<ServiceRole>) -> Self {
        Self {
            ip: ip.into(),
            port,
            roles,
        }
    }

    /// "ip:port" form, bracketing IPv6 literals
    pub fn address(&self) -> String {
        if self.ip.contains(':') {
            format!("[{}]:{}", self.ip, self.port)
        } else {
            format!("{}:{}", self.ip, self.port)
        }
    }
}

#[async_trait]
impl RemoteHandle for Endpoint {
    fn endpoint(&self) -> String {
        self.address()
    }

    async fn is_a(&self, role: ServiceRole) -> bool {
        self.roles.contains(&role)
    }

    // Timeouts are applied by the caller
    async fn ping(&self) -> Result<(), ProbeError> {
        let address = self.address();
        TcpStream::connect(&address).await?;
        debug!("TCP connection to {} succeeded", address);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_address() {
        let v4 = Endpoint::new("10.0.0.1", 8080, vec![]);
        assert_eq!(v4.address(), "10.0.0.1:8080");
        let v6 = Endpoint::new("::1", 3000, vec![]);
        assert_eq!(v6.address(), "[::1]:3000");
    }

    #[tokio::test]
    async fn test_is_a_uses_advertised_roles() {
        let endpoint = Endpoint::new("127.0.0.1", 1, vec![ServiceRole::Catalog]);
        assert!(endpoint.is_a(ServiceRole::Catalog).await);
        assert!(!endpoint.is_a(ServiceRole::Authenticator).await);
    }

    #[tokio::test]
    async fn test_ping_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let endpoint = Endpoint::new("127.0.0.1", port, vec![]);
        assert!(endpoint.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_ping_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let endpoint = Endpoint::new("127.0.0.1", port, vec![]);
        assert!(matches!(endpoint.ping().await, Err(ProbeError::Transport(_))));
    }

    #[test]
    fn test_deserialize_without_roles() {
        let endpoint: Endpoint =
            serde_json::from_str(r#"{"ip":"10.0.0.2","port":7070}"#).unwrap();
        assert!(endpoint.roles.is_empty());
    }
}
