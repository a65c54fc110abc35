//! Per-host machine registry.
//!
//! # Responsibilities
//! - Map host name → latency machine
//! - Create machines lazily on first observation
//! - Guarantee a single machine per host under concurrent first use
//!
//! # Design Decisions
//! - Sharded concurrent map; get-or-create goes through the entry API so
//!   the check and the insert happen under one shard lock
//! - Entries are never evicted
//! - Host names are keyed exactly as supplied (no case folding)

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::error::Result;
use crate::latency::machine::{LatencyMachine, Machine, MachineConfig};
use crate::latency::state::State;
use crate::observability::metrics;

/// Point-in-time view of one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostStatus {
    pub host: String,
    pub state: State,
}

/// Thread-safe map of host name to [`LatencyMachine`].
#[derive(Debug)]
pub struct HostRegistry {
    machines: DashMap<String, Arc<LatencyMachine>>,
    config: MachineConfig,
}

impl HostRegistry {
    /// Create an empty registry. The configuration is checked by building a
    /// throwaway machine so errors surface here instead of on first request.
    pub fn new(config: MachineConfig) -> Result<Self> {
        LatencyMachine::new(config.clone())?;
        Ok(Self {
            machines: DashMap::new(),
            config,
        })
    }

    /// Return the machine for `host`, creating it if this is the first
    /// observation.
    pub fn get_or_create(&self, host: &str) -> Result<Arc<LatencyMachine>> {
        if let Some(machine) = self.machines.get(host) {
            return Ok(machine.value().clone());
        }

        let machine = self
            .machines
            .entry(host.to_owned())
            .or_try_insert_with(|| {
                tracing::debug!(host = %host, "Tracking latency for new host");
                LatencyMachine::new(self.config.clone()).map(Arc::new)
            })?
            .value()
            .clone();
        metrics::record_hosts_tracked(self.machines.len());
        Ok(machine)
    }

    /// Look up an existing machine without creating one.
    pub fn get(&self, host: &str) -> Option<Arc<LatencyMachine>> {
        self.machines.get(host).map(|r| r.value().clone())
    }

    /// State of `host`, if it has been observed.
    pub fn state(&self, host: &str) -> Option<State> {
        self.get(host).map(|machine| machine.state())
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// States of every tracked host, sorted by host name.
    pub fn snapshot(&self) -> Vec<HostStatus> {
        let mut hosts: Vec<HostStatus> = self
            .machines
            .iter()
            .map(|r| HostStatus {
                host: r.key().clone(),
                state: r.value().state(),
            })
            .collect();
        hosts.sort_by(|a, b| a.host.cmp(&b.host));
        hosts
    }
}
