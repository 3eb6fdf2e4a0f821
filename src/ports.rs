//! Port → listening process lookup.
//!
//! A [`ProcessResolver`] answers "which PIDs are listening on this TCP port".
//! Lookups never fail from the caller's point of view: a missing tool, a
//! permission error or unparseable output all mean "nobody found".

use itertools::Itertools;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Which lookup strategy to use, chosen once at startup.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ResolverKind {
    /// Native socket table, falling back to the platform tool
    #[default]
    Auto,
    /// Kernel socket table only
    SocketTable,
    /// `lsof` (unix)
    Lsof,
    /// `netstat -ano` (windows)
    Netstat,
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("failed to run {tool}: {source}")]
    Tool {
        tool: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("{0}")]
    Failed(String),
}

pub trait ProcessResolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Raw lookup; `Err` means the lookup itself could not be performed.
    fn try_resolve(&self, port: u16) -> Result<Vec<u32>, LookupError>;

    /// PIDs listening on `port`, sorted and de-duplicated. Lookup failures
    /// are logged and reported as an empty list.
    fn resolve(&self, port: u16) -> Vec<u32> {
        match self.try_resolve(port) {
            Ok(pids) => pids
                .into_iter()
                .filter(|pid| *pid != 0)
                .sorted()
                .dedup()
                .collect(),
            Err(err) => {
                debug!("{} lookup for port {port} failed: {err}", self.name());
                vec![]
            }
        }
    }
}

/// Reads the kernel's listening socket table directly.
pub struct SocketTableResolver;

impl ProcessResolver for SocketTableResolver {
    fn name(&self) -> &'static str {
        "socket-table"
    }

    fn try_resolve(&self, port: u16) -> Result<Vec<u32>, LookupError> {
        let all = listeners::get_all().map_err(|e| LookupError::Failed(e.to_string()))?;
        Ok(all
            .into_iter()
            .filter(|l| l.socket.port() == port && l.protocol == listeners::Protocol::TCP)
            .map(|l| l.process.pid)
            .collect())
    }
}

/// `lsof -nP -t -iTCP:<port> -sTCP:LISTEN`
pub struct LsofResolver;

impl ProcessResolver for LsofResolver {
    fn name(&self) -> &'static str {
        "lsof"
    }

    fn try_resolve(&self, port: u16) -> Result<Vec<u32>, LookupError> {
        let output = duct::cmd!(
            "lsof",
            "-nP",
            "-t",
            format!("-iTCP:{port}"),
            "-sTCP:LISTEN"
        )
        .stdout_capture()
        .stderr_null()
        .unchecked()
        .run()
        .map_err(|source| LookupError::Tool {
            tool: "lsof",
            source,
        })?;
        // lsof exits 1 with no output when nothing matches
        Ok(parse_lsof_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// `netstat -ano -p TCP`, keeping `LISTENING` rows for the port.
pub struct NetstatResolver;

impl ProcessResolver for NetstatResolver {
    fn name(&self) -> &'static str {
        "netstat"
    }

    fn try_resolve(&self, port: u16) -> Result<Vec<u32>, LookupError> {
        let output = duct::cmd!("netstat", "-ano", "-p", "TCP")
            .stdout_capture()
            .stderr_null()
            .unchecked()
            .run()
            .map_err(|source| LookupError::Tool {
                tool: "netstat",
                source,
            })?;
        if !output.status.success() {
            return Err(LookupError::Failed(format!(
                "netstat exited with {}",
                output.status
            )));
        }
        Ok(parse_netstat_output(
            &String::from_utf8_lossy(&output.stdout),
            port,
        ))
    }
}

/// Socket table first, then the platform tool if the table can't be read.
pub struct AutoResolver {
    primary: SocketTableResolver,
    fallback: Box<dyn ProcessResolver>,
}

impl Default for AutoResolver {
    fn default() -> Self {
        Self {
            primary: SocketTableResolver,
            fallback: platform_tool(),
        }
    }
}

impl ProcessResolver for AutoResolver {
    fn name(&self) -> &'static str {
        "auto"
    }

    fn try_resolve(&self, port: u16) -> Result<Vec<u32>, LookupError> {
        match self.primary.try_resolve(port) {
            Ok(pids) => Ok(pids),
            Err(err) => {
                trace!(
                    "socket table lookup failed ({err}), falling back to {}",
                    self.fallback.name()
                );
                self.fallback.try_resolve(port)
            }
        }
    }
}

#[cfg(windows)]
fn platform_tool() -> Box<dyn ProcessResolver> {
    Box::new(NetstatResolver)
}

#[cfg(not(windows))]
fn platform_tool() -> Box<dyn ProcessResolver> {
    Box::new(LsofResolver)
}

pub fn resolver_for(kind: ResolverKind) -> Arc<dyn ProcessResolver> {
    match kind {
        ResolverKind::Auto => Arc::new(AutoResolver::default()),
        ResolverKind::SocketTable => Arc::new(SocketTableResolver),
        ResolverKind::Lsof => Arc::new(LsofResolver),
        ResolverKind::Netstat => Arc::new(NetstatResolver),
    }
}

/// Runs a lookup on the blocking pool.
pub async fn resolve(resolver: &Arc<dyn ProcessResolver>, port: u16) -> Vec<u32> {
    let resolver = resolver.clone();
    tokio::task::spawn_blocking(move || resolver.resolve(port))
        .await
        .unwrap_or_else(|e| {
            warn!("port {port} lookup task failed: {e}");
            vec![]
        })
}

pub fn parse_lsof_output(stdout: &str) -> Vec<u32> {
    stdout
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}

pub fn parse_netstat_output(stdout: &str, port: u16) -> Vec<u32> {
    let suffix = format!(":{port}");
    stdout
        .lines()
        .filter_map(|line| {
            let parts = line.split_whitespace().collect_vec();
            match parts.as_slice() {
                [proto, local, _foreign, state, pid, ..]
                    if proto.eq_ignore_ascii_case("tcp")
                        && *state == "LISTENING"
                        && local.ends_with(&suffix) =>
                {
                    pid.parse().ok()
                }
                _ => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lsof_output() {
        assert_eq!(parse_lsof_output("1234\n5678\n"), vec![1234, 5678]);
        assert_eq!(parse_lsof_output(""), Vec::<u32>::new());
        assert_eq!(parse_lsof_output("lsof: WARNING\n42\n"), vec![42]);
    }

    #[test]
    fn test_parse_netstat_output() {
        let out = "\
Active Connections

  Proto  Local Address          Foreign Address        State           PID
  TCP    0.0.0.0:135            0.0.0.0:0              LISTENING       1012
  TCP    0.0.0.0:6666           0.0.0.0:0              LISTENING       4242
  TCP    127.0.0.1:6666         127.0.0.1:52144        ESTABLISHED     4242
  TCP    127.0.0.1:52144        127.0.0.1:6666         ESTABLISHED     9000
  TCP    0.0.0.0:66660          0.0.0.0:0              LISTENING       7777
  TCP    [::]:6666              [::]:0                 LISTENING       4243
";
        assert_eq!(parse_netstat_output(out, 6666), vec![4242, 4243]);
        assert_eq!(parse_netstat_output(out, 135), vec![1012]);
        assert!(parse_netstat_output(out, 8080).is_empty());
    }

    struct Fixed(Result<Vec<u32>, &'static str>);

    impl ProcessResolver for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn try_resolve(&self, _port: u16) -> Result<Vec<u32>, LookupError> {
            self.0.clone().map_err(|e| LookupError::Failed(e.to_string()))
        }
    }

    #[test]
    fn test_resolve_sorts_and_dedups() {
        let r = Fixed(Ok(vec![30, 10, 30, 0, 20]));
        assert_eq!(r.resolve(80), vec![10, 20, 30]);
    }

    #[test]
    fn test_resolve_absorbs_failures() {
        let r = Fixed(Err("permission denied"));
        assert!(r.resolve(80).is_empty());
    }

    #[test]
    fn test_auto_falls_back() {
        let auto = AutoResolver {
            primary: SocketTableResolver,
            fallback: Box::new(Fixed(Ok(vec![99]))),
        };
        // Either the socket table answers (nobody on a reserved port) or the
        // fallback does; both are valid, neither may error.
        assert!(auto.try_resolve(1).is_ok());
    }

    #[test]
    fn test_resolver_kind_names() {
        assert_eq!(ResolverKind::SocketTable.to_string(), "socket-table");
        assert_eq!(ResolverKind::default(), ResolverKind::Auto);
        assert_eq!(resolver_for(ResolverKind::Lsof).name(), "lsof");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_socket_table_matches_port() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let other = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let free = other.local_addr().unwrap().port();
        drop(other);

        assert_eq!(SocketTableResolver.resolve(port), vec![std::process::id()]);
        assert_eq!(SocketTableResolver.try_resolve(free).unwrap(), Vec::<u32>::new());
        drop(listener);
    }

    #[tokio::test]
    async fn test_resolve_finds_own_listener() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let resolver = resolver_for(ResolverKind::Auto);
        let pids = resolve(&resolver, port).await;
        // lsof may be missing in minimal containers; an empty answer is allowed
        assert!(pids.is_empty() || pids == vec![std::process::id()]);
        drop(listener);
    }
}
