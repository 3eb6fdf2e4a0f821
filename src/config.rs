//! `portkeeper.toml` loading.
//!
//! The file is read into a raw serde struct that mirrors its layout, then
//! resolved into [`Config`]: durations parsed, the project root made
//! absolute, and the command registry and watchdog roster built.
//!
//! ```toml
//! root = "."
//!
//! [api]
//! port = 3001
//!
//! [watchdog]
//! interval = "60s"
//! ports = [1111, 6666]
//!
//! [servers."dev:1111"]
//! run = "npm run dev:1111"
//! port = 1111
//! ```

use crate::error::{ConfigError, ConfigParseError, FileError};
use crate::ports::ResolverKind;
use crate::registry::{CommandRegistry, ManagedServer};
use crate::{Result, env};
use indexmap::IndexMap;
use itertools::Itertools;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_PORT: u16 = 3001;

/// Configuration schema for portkeeper.toml.
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
#[schemars(title = "portkeeper configuration")]
pub struct PortkeeperToml {
    /// Directory launched servers run in, relative to this file. Defaults to the file's directory.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub root: Option<String>,
    /// Strategy used to find the processes listening on a port
    #[serde(default)]
    pub resolver: ResolverKind,
    #[serde(default)]
    pub api: ApiToml,
    #[serde(default)]
    pub watchdog: WatchdogToml,
    #[serde(default)]
    pub timings: TimingsToml,
    /// Map of script keys to the servers they launch
    #[serde(default)]
    pub servers: IndexMap<String, ServerToml>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ApiToml {
    /// Address the control API binds to (default 127.0.0.1)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bind: Option<String>,
    /// Port the control API listens on (default 3001)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct WatchdogToml {
    /// Time between forced restart cycles, e.g. "60s"
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub interval: Option<String>,
    /// Ports the watchdog keeps alive. Defaults to every registered port.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ports: Option<Vec<u16>>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TimingsToml {
    /// Wait after graceful termination before escalating (default "1s")
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub grace: Option<String>,
    /// Wait after clearing a port before launching on it (default "1s")
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub socket_release: Option<String>,
    /// Wait after spawning before checking the child is still alive (default "1s")
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub spawn_check: Option<String>,
    /// Liveness probe timeout (default "1500ms")
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub probe_timeout: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ServerToml {
    /// Command line that starts the server, e.g. "npm run dev:6666"
    pub run: String,
    /// Port the server binds
    pub port: u16,
}

/// Waits used by the clear-then-launch procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub grace: Duration,
    pub socket_release: Duration,
    pub spawn_check: Duration,
    pub probe_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(1),
            socket_release: Duration::from_secs(1),
            spawn_check: Duration::from_secs(1),
            probe_timeout: Duration::from_millis(1500),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub bind: String,
    pub port: u16,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_API_PORT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatchdogSettings {
    pub interval: Duration,
    pub ports: Vec<u16>,
}

/// Fully resolved configuration shared by the API server and the watchdog.
#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub resolver: ResolverKind,
    pub api: ApiSettings,
    pub watchdog: WatchdogSettings,
    pub timings: Timings,
    pub registry: CommandRegistry,
    pub state_dir: PathBuf,
    pub logs_dir: PathBuf,
    /// File this was read from, if any
    pub path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let registry = CommandRegistry::default_dev();
        let ports = registry.iter().map(|s| s.port).unique().collect();
        Self {
            root: env::CWD.clone(),
            resolver: ResolverKind::default(),
            api: ApiSettings::default(),
            watchdog: WatchdogSettings {
                interval: Duration::from_secs(60),
                ports,
            },
            timings: Timings::default(),
            registry,
            state_dir: env::PORTKEEPER_STATE_DIR.clone(),
            logs_dir: env::PORTKEEPER_LOGS_DIR.clone(),
            path: None,
        }
    }
}

impl Config {
    /// Reads `$PORTKEEPER_CONFIG` (or `./portkeeper.toml`), falling back to
    /// the built-in dev roster when the file does not exist.
    pub fn load() -> Result<Self> {
        let path = &*env::PORTKEEPER_CONFIG;
        let mut config = if path.exists() {
            Self::read(path)?
        } else {
            debug!(
                "no config at {}, using built-in dev roster",
                path.display()
            );
            Self::default()
        };
        if let Some(interval) = interval_override(*env::PORTKEEPER_INTERVAL_SECS) {
            config.watchdog.interval = interval;
        }
        Ok(config)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| FileError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(path, &raw)
    }

    pub fn parse(path: &Path, contents: &str) -> Result<Self> {
        let raw: PortkeeperToml = toml::from_str(contents)
            .map_err(|e| ConfigParseError::from_toml_error(path, contents.to_string(), e))?;
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| env::CWD.clone());
        let mut config = Self::from_raw(raw, &base_dir)?;
        config.path = Some(path.to_path_buf());
        Ok(config)
    }

    fn from_raw(raw: PortkeeperToml, base_dir: &Path) -> Result<Self> {
        let defaults = Self::default();

        let registry = if raw.servers.is_empty() {
            defaults.registry
        } else {
            let mut servers = vec![];
            for (key, server) in raw.servers {
                if server.run.trim().is_empty() {
                    return Err(ConfigError::EmptyCommand { key }.into());
                }
                if server.port == 0 {
                    return Err(ConfigError::InvalidPort { key }.into());
                }
                servers.push(ManagedServer {
                    key,
                    port: server.port,
                    command: server.run,
                });
            }
            CommandRegistry::new(servers)
        };

        let ports = match raw.watchdog.ports {
            Some(ports) if ports.is_empty() => return Err(ConfigError::EmptyRoster.into()),
            Some(ports) => {
                if let Some(port) = ports.iter().find(|p| registry.by_port(**p).is_none()) {
                    return Err(ConfigError::UnmanagedPort { port: *port }.into());
                }
                ports.into_iter().unique().collect()
            }
            None => registry.iter().map(|s| s.port).unique().collect(),
        };

        let root = match raw.root {
            Some(root) if Path::new(&root).is_absolute() => PathBuf::from(root),
            Some(root) => base_dir.join(root),
            None => base_dir.to_path_buf(),
        };

        let dt = defaults.timings;
        Ok(Self {
            root,
            resolver: raw.resolver,
            api: ApiSettings {
                bind: raw.api.bind.unwrap_or(defaults.api.bind),
                port: raw.api.port.unwrap_or(defaults.api.port),
            },
            watchdog: WatchdogSettings {
                interval: nonzero_duration_or(
                    "watchdog.interval",
                    raw.watchdog.interval,
                    defaults.watchdog.interval,
                )?,
                ports,
            },
            timings: Timings {
                grace: duration_or("timings.grace", raw.timings.grace, dt.grace)?,
                socket_release: duration_or(
                    "timings.socket_release",
                    raw.timings.socket_release,
                    dt.socket_release,
                )?,
                spawn_check: duration_or("timings.spawn_check", raw.timings.spawn_check, dt.spawn_check)?,
                probe_timeout: duration_or(
                    "timings.probe_timeout",
                    raw.timings.probe_timeout,
                    dt.probe_timeout,
                )?,
            },
            registry,
            state_dir: defaults.state_dir,
            logs_dir: defaults.logs_dir,
            path: None,
        })
    }

    /// Servers the watchdog owns, one per roster port.
    pub fn roster(&self) -> Vec<ManagedServer> {
        self.watchdog
            .ports
            .iter()
            .filter_map(|port| self.registry.by_port(*port).cloned())
            .collect()
    }

    pub fn pid_file(&self) -> PathBuf {
        self.state_dir.join("watchdog.pid")
    }

    /// Per-port server log, e.g. `logs/6666/6666.log`.
    pub fn port_log_file(&self, port: u16) -> PathBuf {
        self.logs_dir
            .join(port.to_string())
            .join(format!("{port}.log"))
    }

    pub fn watchdog_log_file(&self) -> PathBuf {
        self.logs_dir.join("watchdog").join("watchdog.log")
    }
}

fn duration_or(field: &str, value: Option<String>, default: Duration) -> Result<Duration> {
    match value {
        None => Ok(default),
        Some(value) => humantime::parse_duration(value.trim()).map_err(|_| {
            ConfigError::InvalidDuration {
                field: field.to_string(),
                value,
            }
            .into()
        }),
    }
}

/// Like [`duration_or`], but zero is rejected too.
fn nonzero_duration_or(field: &str, value: Option<String>, default: Duration) -> Result<Duration> {
    let raw = value.clone();
    let duration = duration_or(field, value, default)?;
    if duration.is_zero() {
        return Err(ConfigError::InvalidDuration {
            field: field.to_string(),
            value: raw.unwrap_or_default(),
        }
        .into());
    }
    Ok(duration)
}

/// `PORTKEEPER_INTERVAL_SECS`, ignored when zero.
fn interval_override(secs: Option<u64>) -> Option<Duration> {
    match secs {
        Some(0) => {
            warn!("ignoring PORTKEEPER_INTERVAL_SECS=0");
            None
        }
        secs => secs.map(Duration::from_secs),
    }
}
