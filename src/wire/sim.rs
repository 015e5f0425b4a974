//! In-memory namespace backend.
//!
//! Models just enough kernel state to exercise the wirer without
//! privileges: interfaces per namespace with MAC addresses, up flags and
//! addresses, and a neighbor table per namespace. The errors mirror what
//! `ip` reports for the same mistakes.

use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;

use parking_lot::Mutex;

use super::backend::NamespaceBackend;
use super::{NamespaceHandle, WireError};

/// Key of the host (root) namespace in the simulated state
const HOST: &str = "";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimInterface {
    pub lladdr: String,
    pub up: bool,
    pub addrs: Vec<String>,
    /// MAC of the other end for veth interfaces
    peer: Option<String>,
}

/// A permanent neighbor entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimNeighbor {
    pub ip: Ipv4Addr,
    pub lladdr: String,
    pub ifname: String,
}

#[derive(Debug, Default)]
struct SimState {
    /// Interfaces per namespace; the host namespace is keyed by `HOST`
    interfaces: HashMap<String, BTreeMap<String, SimInterface>>,
    neighbors: HashMap<String, Vec<SimNeighbor>>,
    next_mac: u64,
}

impl SimState {
    fn ns_mut(&mut self, ns: &str) -> Result<&mut BTreeMap<String, SimInterface>, WireError> {
        self.interfaces
            .get_mut(ns)
            .ok_or_else(|| WireError::NamespaceNotFound(ns.to_string()))
    }

    fn iface_mut(&mut self, ns: &str, ifname: &str) -> Result<&mut SimInterface, WireError> {
        self.ns_mut(ns)?
            .get_mut(ifname)
            .ok_or_else(|| WireError::NoSuchInterface {
                namespace: ns.to_string(),
                ifname: ifname.to_string(),
            })
    }

    fn fresh_lladdr(&mut self) -> String {
        self.next_mac += 1;
        let b = self.next_mac.to_be_bytes();
        format!("02:00:{:02x}:{:02x}:{:02x}:{:02x}", b[4], b[5], b[6], b[7])
    }
}

/// Thread-safe simulated namespaces
#[derive(Debug)]
pub struct SimulatedBackend {
    state: Mutex<SimState>,
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        let mut state = SimState::default();
        state.interfaces.insert(HOST.to_string(), BTreeMap::new());
        Self {
            state: Mutex::new(state),
        }
    }
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend with one empty namespace per handle.
    pub fn with_namespaces<'a>(handles: impl IntoIterator<Item = &'a NamespaceHandle>) -> Self {
        let backend = Self::default();
        for handle in handles {
            backend.add_namespace(handle);
        }
        backend
    }

    pub fn add_namespace(&self, ns: &NamespaceHandle) {
        self.state
            .lock()
            .interfaces
            .entry(ns.name().to_string())
            .or_default();
    }

    /// Create a standalone interface, e.g. to provoke a name clash.
    pub fn add_interface(&self, ns: &NamespaceHandle, ifname: &str) -> Result<(), WireError> {
        let mut state = self.state.lock();
        let lladdr = state.fresh_lladdr();
        let ifaces = state.ns_mut(ns.name())?;
        if ifaces.contains_key(ifname) {
            return Err(WireError::InterfaceExists(ifname.to_string()));
        }
        ifaces.insert(
            ifname.to_string(),
            SimInterface {
                lladdr,
                up: false,
                addrs: Vec::new(),
                peer: None,
            },
        );
        Ok(())
    }

    pub fn interface(&self, ns: &NamespaceHandle, ifname: &str) -> Option<SimInterface> {
        self.state
            .lock()
            .interfaces
            .get(ns.name())
            .and_then(|ifaces| ifaces.get(ifname))
            .cloned()
    }

    /// Interface names in `ns`, sorted.
    pub fn interface_names(&self, ns: &NamespaceHandle) -> Vec<String> {
        self.state
            .lock()
            .interfaces
            .get(ns.name())
            .map(|ifaces| ifaces.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Interfaces still in the host namespace
    pub fn host_interface_names(&self) -> Vec<String> {
        self.interface_names(&NamespaceHandle::new(HOST))
    }

    pub fn neighbors(&self, ns: &NamespaceHandle) -> Vec<SimNeighbor> {
        self.state
            .lock()
            .neighbors
            .get(ns.name())
            .cloned()
            .unwrap_or_default()
    }
}

impl NamespaceBackend for SimulatedBackend {
    fn create_veth(&self, a: &str, b: &str) -> Result<(), WireError> {
        let mut state = self.state.lock();
        let (mac_a, mac_b) = (state.fresh_lladdr(), state.fresh_lladdr());
        let host = state.ns_mut(HOST)?;
        for name in [a, b] {
            if host.contains_key(name) {
                return Err(WireError::InterfaceExists(name.to_string()));
            }
        }
        for (name, lladdr, peer) in [(a, mac_a.clone(), mac_b.clone()), (b, mac_b, mac_a)] {
            host.insert(
                name.to_string(),
                SimInterface {
                    lladdr,
                    up: false,
                    addrs: Vec::new(),
                    peer: Some(peer),
                },
            );
        }
        Ok(())
    }

    fn delete_link(&self, ns: Option<&NamespaceHandle>, ifname: &str) -> Result<(), WireError> {
        let mut state = self.state.lock();
        let ns = ns.map_or(HOST, NamespaceHandle::name);
        let iface = state
            .ns_mut(ns)?
            .remove(ifname)
            .ok_or_else(|| WireError::NoSuchInterface {
                namespace: ns.to_string(),
                ifname: ifname.to_string(),
            })?;
        if let Some(peer) = iface.peer {
            for ifaces in state.interfaces.values_mut() {
                ifaces.retain(|_, other| other.lladdr != peer);
            }
        }
        Ok(())
    }

    fn move_to_netns(&self, ifname: &str, ns: &NamespaceHandle) -> Result<(), WireError> {
        let mut state = self.state.lock();
        let target = state.ns_mut(ns.name())?;
        if target.contains_key(ifname) {
            return Err(WireError::InterfaceExists(ifname.to_string()));
        }
        let iface = state
            .ns_mut(HOST)?
            .remove(ifname)
            .ok_or_else(|| WireError::NoSuchInterface {
                namespace: HOST.to_string(),
                ifname: ifname.to_string(),
            })?;
        state.ns_mut(ns.name())?.insert(ifname.to_string(), iface);
        Ok(())
    }

    fn rename(&self, ns: &NamespaceHandle, from: &str, to: &str) -> Result<(), WireError> {
        let mut state = self.state.lock();
        let ifaces = state.ns_mut(ns.name())?;
        if ifaces.contains_key(to) {
            return Err(WireError::InterfaceExists(to.to_string()));
        }
        let iface = ifaces.remove(from).ok_or_else(|| WireError::NoSuchInterface {
            namespace: ns.name().to_string(),
            ifname: from.to_string(),
        })?;
        ifaces.insert(to.to_string(), iface);
        Ok(())
    }

    fn link_up(&self, ns: &NamespaceHandle, ifname: &str) -> Result<(), WireError> {
        self.state.lock().iface_mut(ns.name(), ifname)?.up = true;
        Ok(())
    }

    fn addr_add(&self, ns: &NamespaceHandle, ifname: &str, cidr: &str) -> Result<(), WireError> {
        let mut state = self.state.lock();
        let ifaces = state.ns_mut(ns.name())?;
        let host_part = |addr: &str| addr.split('/').next().unwrap_or(addr).to_string();
        let wanted = host_part(cidr);
        if let Some((owner, _)) = ifaces
            .iter()
            .find(|(_, iface)| iface.addrs.iter().any(|a| host_part(a) == wanted))
        {
            return Err(WireError::AddressInUse {
                address: cidr.to_string(),
                ifname: owner.clone(),
            });
        }
        state.iface_mut(ns.name(), ifname)?.addrs.push(cidr.to_string());
        Ok(())
    }

    fn read_lladdr(&self, ns: &NamespaceHandle, ifname: &str) -> Result<String, WireError> {
        Ok(self.state.lock().iface_mut(ns.name(), ifname)?.lladdr.clone())
    }

    fn neigh_replace(
        &self,
        ns: &NamespaceHandle,
        ip: Ipv4Addr,
        lladdr: &str,
        ifname: &str,
    ) -> Result<(), WireError> {
        let mut state = self.state.lock();
        state.iface_mut(ns.name(), ifname)?;
        let table = state.neighbors.entry(ns.name().to_string()).or_default();
        let entry = SimNeighbor {
            ip,
            lladdr: lladdr.to_string(),
            ifname: ifname.to_string(),
        };
        match table.iter_mut().find(|n| n.ip == ip && n.ifname == ifname) {
            Some(existing) => *existing = entry,
            None => table.push(entry),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(name: &str) -> NamespaceHandle {
        NamespaceHandle::new(name)
    }

    #[test]
    fn test_veth_lifecycle() {
        let sim = SimulatedBackend::with_namespaces(&[ns("a"), ns("b")]);
        sim.create_veth("t1", "t2").unwrap();
        assert_eq!(sim.host_interface_names(), vec!["t1", "t2"]);

        sim.move_to_netns("t1", &ns("a")).unwrap();
        sim.rename(&ns("a"), "t1", "eth1to2").unwrap();
        sim.link_up(&ns("a"), "eth1to2").unwrap();
        sim.addr_add(&ns("a"), "eth1to2", "169.0.0.1/30").unwrap();

        let iface = sim.interface(&ns("a"), "eth1to2").unwrap();
        assert!(iface.up);
        assert_eq!(iface.addrs, vec!["169.0.0.1/30"]);
        assert_eq!(sim.host_interface_names(), vec!["t2"]);
        assert_ne!(sim.read_lladdr(&ns("a"), "eth1to2").unwrap(), "");
    }

    #[test]
    fn test_errors_mirror_ip() {
        let sim = SimulatedBackend::with_namespaces(&[ns("a")]);
        sim.create_veth("t1", "t2").unwrap();
        assert!(matches!(sim.create_veth("t2", "t3"), Err(WireError::InterfaceExists(_))));
        assert!(matches!(
            sim.move_to_netns("t1", &ns("zz")),
            Err(WireError::NamespaceNotFound(_))
        ));
        assert!(matches!(
            sim.move_to_netns("nope", &ns("a")),
            Err(WireError::NoSuchInterface { .. })
        ));

        sim.move_to_netns("t1", &ns("a")).unwrap();
        sim.add_interface(&ns("a"), "eth1to2").unwrap();
        assert!(matches!(
            sim.rename(&ns("a"), "t1", "eth1to2"),
            Err(WireError::InterfaceExists(_))
        ));

        sim.addr_add(&ns("a"), "eth1to2", "169.0.0.1/30").unwrap();
        assert!(matches!(
            sim.addr_add(&ns("a"), "t1", "169.0.0.1/30"),
            Err(WireError::AddressInUse { .. })
        ));
    }

    #[test]
    fn test_delete_link_removes_both_ends() {
        let sim = SimulatedBackend::with_namespaces(&[ns("a")]);
        sim.create_veth("t1", "t2").unwrap();
        sim.move_to_netns("t1", &ns("a")).unwrap();
        sim.rename(&ns("a"), "t1", "eth1to2").unwrap();

        sim.delete_link(None, "t2").unwrap();
        assert!(sim.host_interface_names().is_empty());
        assert!(sim.interface_names(&ns("a")).is_empty());
        assert!(matches!(
            sim.delete_link(None, "t2"),
            Err(WireError::NoSuchInterface { .. })
        ));

        // Standalone interfaces have no peer to take along.
        sim.add_interface(&ns("a"), "lo0").unwrap();
        sim.add_interface(&ns("a"), "lo1").unwrap();
        sim.delete_link(Some(&ns("a")), "lo0").unwrap();
        assert_eq!(sim.interface_names(&ns("a")), vec!["lo1"]);
    }

    #[test]
    fn test_neigh_replace_overwrites() {
        let sim = SimulatedBackend::with_namespaces(&[ns("a")]);
        sim.add_interface(&ns("a"), "eth1").unwrap();
        let ip = Ipv4Addr::new(169, 0, 0, 2);
        sim.neigh_replace(&ns("a"), ip, "02:00:00:00:00:01", "eth1").unwrap();
        sim.neigh_replace(&ns("a"), ip, "02:00:00:00:00:02", "eth1").unwrap();
        let table = sim.neighbors(&ns("a"));
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].lladdr, "02:00:00:00:00:02");
        assert!(sim.neigh_replace(&ns("a"), ip, "x", "eth9").is_err());
    }
}
