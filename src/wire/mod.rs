//! Live wiring of a blueprint into per-router network namespaces.
//!
//! Every link becomes a veth pair whose ends are moved into the two routers'
//! namespaces, renamed, brought up and addressed. Once every link exists,
//! each router gets a permanent neighbor entry per peer so that no ARP is
//! needed at runtime.
//!
//! Failures are collected per link or per neighbor entry and never abort
//! sibling work.

pub mod backend;
pub mod namespaces;
pub mod sim;
pub mod wirer;

use std::fmt;
use std::io;
use std::time::Duration;

pub use backend::{IpCommandBackend, NamespaceBackend};
pub use namespaces::ContainerNamespaces;
pub use sim::SimulatedBackend;
pub use wirer::{NetworkWirer, Operation, OperationResult, WireReport};

/// Name of a network namespace as known to `ip netns`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceHandle(String);

impl NamespaceHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NamespaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failure of a single namespace operation
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("no namespace handle for router {router}: {reason}")]
    MissingNamespace { router: u32, reason: String },

    #[error("network namespace {0} does not exist")]
    NamespaceNotFound(String),

    #[error("interface {ifname} not found in namespace {namespace}")]
    NoSuchInterface { namespace: String, ifname: String },

    #[error("interface {0} already exists")]
    InterfaceExists(String),

    #[error("address {address} already in use on {ifname}")]
    AddressInUse { address: String, ifname: String },

    #[error("command failed: {command}: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("command timed out after {after:?}: {command}")]
    Timeout { command: String, after: Duration },

    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
}
