use std::net::{Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
    /// Caller recorded when a request carries no `x-caller` header. `None`
    /// records the unknown-caller sentinel.
    pub default_caller: Option<String>,
    /// Answer cross-origin requests from any origin.
    pub permissive_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 7054)),
            max_body_bytes: 4 * 1024 * 1024,
            default_caller: None,
            permissive_cors: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:7054".parse::<SocketAddr>().unwrap());
        assert_eq!(c.max_body_bytes, 4 * 1024 * 1024);
        assert!(c.default_caller.is_none());
        assert!(!c.permissive_cors);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let c: ServerConfig = serde_json::from_str(r#"{"bind_addr":"0.0.0.0:8080"}"#).unwrap();
        assert_eq!(c.bind_addr.port(), 8080);
        assert_eq!(c.max_body_bytes, ServerConfig::default().max_body_bytes);
    }
}
