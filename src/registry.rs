use crate::error::{SupervisorError, find_similar_script};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt::Display;

/// Ports of the original dev roster: the hub plus five frontends.
pub const DEFAULT_DEV_PORTS: [u16; 6] = [1111, 5555, 6666, 7777, 8888, 9999];

/// A server the supervisor knows how to launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagedServer {
    pub key: String,
    pub port: u16,
    pub command: String,
}

impl Display for ManagedServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (:{})", self.key, self.port)
    }
}

/// Static mapping from script key to launch command, built once at startup
/// and shared read-only by the API server and the watchdog.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    servers: IndexMap<String, ManagedServer>,
}

impl CommandRegistry {
    pub fn new(servers: impl IntoIterator<Item = ManagedServer>) -> Self {
        Self {
            servers: servers
                .into_iter()
                .map(|s| (s.key.clone(), s))
                .collect(),
        }
    }

    /// `dev:<port>` → `npm run dev:<port>` for every default dev port.
    pub fn default_dev() -> Self {
        Self::new(DEFAULT_DEV_PORTS.iter().map(|port| ManagedServer {
            key: format!("dev:{port}"),
            port: *port,
            command: format!("npm run dev:{port}"),
        }))
    }

    pub fn get(&self, key: &str) -> Option<&ManagedServer> {
        self.servers.get(key)
    }

    /// Like [`get`](Self::get) but fails with `UnknownScript`, suggesting the
    /// closest registered key.
    pub fn lookup(&self, key: &str) -> Result<&ManagedServer, SupervisorError> {
        self.servers
            .get(key)
            .ok_or_else(|| SupervisorError::UnknownScript {
                script: key.to_string(),
                suggestion: find_similar_script(key, self.keys()),
            })
    }

    /// First registered server bound to `port`.
    pub fn by_port(&self, port: u16) -> Option<&ManagedServer> {
        self.servers.values().find(|s| s.port == port)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.servers.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManagedServer> {
        self.servers.values()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dev_registry() {
        let registry = CommandRegistry::default_dev();
        assert_eq!(registry.len(), 6);
        let hub = registry.get("dev:1111").unwrap();
        assert_eq!(hub.port, 1111);
        assert_eq!(hub.command, "npm run dev:1111");
        assert_eq!(
            registry.keys().collect::<Vec<_>>(),
            vec![
                "dev:1111", "dev:5555", "dev:6666", "dev:7777", "dev:8888", "dev:9999"
            ]
        );
    }

    #[test]
    fn test_lookup_unknown_suggests() {
        let registry = CommandRegistry::default_dev();
        match registry.lookup("dev:777") {
            Err(SupervisorError::UnknownScript { script, suggestion }) => {
                assert_eq!(script, "dev:777");
                assert_eq!(suggestion.as_deref(), Some("did you mean 'dev:7777'?"));
            }
            other => panic!("expected UnknownScript, got {other:?}"),
        }
    }

    #[test]
    fn test_by_port() {
        let registry = CommandRegistry::new([
            ManagedServer {
                key: "web".into(),
                port: 3000,
                command: "npm run dev".into(),
            },
            ManagedServer {
                key: "preview".into(),
                port: 3000,
                command: "npm run preview".into(),
            },
        ]);
        assert_eq!(registry.by_port(3000).unwrap().key, "web");
        assert!(registry.by_port(4000).is_none());
    }
}
