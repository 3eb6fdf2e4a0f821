//! Supervisor - start/stop/status procedures for port-bound servers
//!
//! This module is split into focused submodules:
//! - `clear`: graceful-then-forceful clearing of a port
//! - `lifecycle`: start-server, kill-server and server-status
//!
//! The supervisor keeps no record of what it launched. Every procedure
//! re-derives the state of a port from the OS. The only shared state is the
//! per-port lock table that serializes mutations of the same port.

mod clear;
mod lifecycle;

pub use clear::ClearReport;
pub use lifecycle::StartOutcome;

use crate::config::Config;
use crate::launcher::Launcher;
use crate::ports::{self, ProcessResolver};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type PortLock = Arc<tokio::sync::Mutex<()>>;

pub struct Supervisor {
    config: Arc<Config>,
    resolver: Arc<dyn ProcessResolver>,
    launcher: Launcher,
    port_locks: Mutex<HashMap<u16, PortLock>>,
}

impl Supervisor {
    pub fn new(config: Arc<Config>) -> Self {
        let resolver = ports::resolver_for(config.resolver);
        Self::with_resolver(config, resolver)
    }

    pub fn with_resolver(config: Arc<Config>, resolver: Arc<dyn ProcessResolver>) -> Self {
        debug!("supervisor using {} port lookup", resolver.name());
        Self {
            launcher: Launcher::new(config.clone()),
            config,
            resolver,
            port_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The async lock guarding `port`, created on first use.
    fn port_lock(&self, port: u16) -> PortLock {
        let mut locks = self.port_locks.lock().unwrap_or_else(|poisoned| {
            warn!("port lock table was poisoned, recovering");
            poisoned.into_inner()
        });
        locks.entry(port).or_default().clone()
    }
}
