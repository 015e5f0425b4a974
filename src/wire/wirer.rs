//! Two-phase link wiring over a worker pool.
//!
//! Phase one creates every veth link, one rayon task per router handling the
//! links to its higher-numbered peers in order. Phase two installs the
//! static neighbor entries and reads peer MAC addresses, so it only starts
//! once phase one has returned for every router.

use std::collections::HashMap;
use std::fmt;

use log::{debug, info, warn};
use rayon::prelude::*;

use super::backend::NamespaceBackend;
use super::{NamespaceHandle, WireError};
use crate::topology::{Blueprint, Neighbor, Router};

/// One unit of wiring work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// The veth link between `x` and `y` (`x < y`)
    Link { x: u32, y: u32 },
    /// The neighbor entry on `router` for `peer`
    StaticNeighbor { router: u32, peer: u32 },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link { x, y } => write!(f, "link {x} <-> {y}"),
            Self::StaticNeighbor { router, peer } => write!(f, "neighbor {router} -> {peer}"),
        }
    }
}

#[derive(Debug)]
pub struct OperationResult {
    pub operation: Operation,
    pub outcome: Result<(), WireError>,
}

impl OperationResult {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Outcome of both wiring phases
#[derive(Debug, Default)]
pub struct WireReport {
    pub links: Vec<OperationResult>,
    pub neighbors: Vec<OperationResult>,
}

impl WireReport {
    pub fn failures(&self) -> impl Iterator<Item = &OperationResult> {
        self.links
            .iter()
            .chain(self.neighbors.iter())
            .filter(|r| !r.is_ok())
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn summary(&self) -> String {
        let ok = |results: &[OperationResult]| results.iter().filter(|r| r.is_ok()).count();
        format!(
            "links {}/{} ok, static neighbors {}/{} ok",
            ok(&self.links),
            self.links.len(),
            ok(&self.neighbors),
            self.neighbors.len()
        )
    }
}

/// Temporary host-side names of a link's veth ends; at most 13 bytes for
/// five-digit router ids, under the 15-byte kernel limit.
pub fn temporary_names(x: u32, y: u32) -> (String, String) {
    (format!("v{x}_{y}a"), format!("v{x}_{y}b"))
}

/// Realizes a blueprint's links through a [`NamespaceBackend`].
///
/// The namespace map must be complete before wiring starts; routers without
/// a handle fail their links with `MissingNamespace`.
pub struct NetworkWirer<'a, B: NamespaceBackend + ?Sized> {
    backend: &'a B,
    namespaces: &'a HashMap<u32, NamespaceHandle>,
}

impl<'a, B: NamespaceBackend + ?Sized> NetworkWirer<'a, B> {
    pub fn new(backend: &'a B, namespaces: &'a HashMap<u32, NamespaceHandle>) -> Self {
        Self { backend, namespaces }
    }

    fn namespace(&self, router: u32) -> Result<&NamespaceHandle, WireError> {
        self.namespaces
            .get(&router)
            .ok_or_else(|| WireError::MissingNamespace {
                router,
                reason: "not in namespace map".to_string(),
            })
    }

    /// Phase one: one veth link per undirected edge, from its lower end.
    pub fn create_links(&self, blueprint: &Blueprint) -> Vec<OperationResult> {
        let results: Vec<OperationResult> = blueprint
            .routers
            .par_iter()
            .flat_map_iter(|router| {
                router
                    .neighbors
                    .iter()
                    .filter(|n| router.idx < n.peeridx)
                    .map(|n| OperationResult {
                        operation: Operation::Link {
                            x: router.idx,
                            y: n.peeridx,
                        },
                        outcome: self.create_link(router, n),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        log_phase("link creation", &results);
        results
    }

    fn create_link(&self, router: &Router, neigh: &Neighbor) -> Result<(), WireError> {
        let ns_x = self.namespace(router.idx)?;
        let ns_y = self.namespace(neigh.peeridx)?;
        let (tmp_x, tmp_y) = temporary_names(router.idx, neigh.peeridx);

        self.backend.create_veth(&tmp_x, &tmp_y)?;
        let configured = self
            .configure_end(&tmp_x, ns_x, &neigh.ifname, &neigh.self_cidr())
            .and_then(|()| self.configure_end(&tmp_y, ns_y, &neigh.peerifname, &neigh.peer_cidr()));
        if configured.is_err() {
            self.remove_partial_link(router.idx, neigh, ns_y);
        }
        configured
    }

    /// Delete a half-configured veth pair so that a later run can recreate
    /// it. Removing either end removes both, so the `y` end is looked up
    /// wherever it can be at this point. The `x` end is only tried while it
    /// is still in the host namespace under its temporary name, so an
    /// existing interface that caused a clash is never touched.
    fn remove_partial_link(&self, x: u32, neigh: &Neighbor, ns_y: &NamespaceHandle) {
        let (tmp_x, tmp_y) = temporary_names(x, neigh.peeridx);
        let candidates = [
            (None, tmp_y.as_str()),
            (None, tmp_x.as_str()),
            (Some(ns_y), tmp_y.as_str()),
            (Some(ns_y), neigh.peerifname.as_str()),
        ];
        for (ns, ifname) in candidates {
            match self.backend.delete_link(ns, ifname) {
                Ok(()) => {
                    debug!("link {x} <-> {}: removed partial veth {ifname}", neigh.peeridx);
                    return;
                }
                Err(WireError::NoSuchInterface { .. } | WireError::NamespaceNotFound(_)) => {}
                Err(err) => {
                    warn!("link {x} <-> {}: could not remove {ifname}: {err}", neigh.peeridx);
                    return;
                }
            }
        }
        warn!("link {x} <-> {}: no partial veth left to remove", neigh.peeridx);
    }

    fn configure_end(
        &self,
        tmp: &str,
        ns: &NamespaceHandle,
        ifname: &str,
        cidr: &str,
    ) -> Result<(), WireError> {
        self.backend.move_to_netns(tmp, ns)?;
        self.backend.rename(ns, tmp, ifname)?;
        self.backend.link_up(ns, ifname)?;
        self.backend.addr_add(ns, ifname, cidr)
    }

    /// Phase two: a permanent neighbor entry for every directed neighbor
    /// relation, carrying the peer's live MAC address.
    pub fn install_static_neighbors(&self, blueprint: &Blueprint) -> Vec<OperationResult> {
        let results: Vec<OperationResult> = blueprint
            .routers
            .par_iter()
            .flat_map_iter(|router| {
                router
                    .neighbors
                    .iter()
                    .map(|n| OperationResult {
                        operation: Operation::StaticNeighbor {
                            router: router.idx,
                            peer: n.peeridx,
                        },
                        outcome: self.install_neighbor(router, n),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        log_phase("static neighbor installation", &results);
        results
    }

    fn install_neighbor(&self, router: &Router, neigh: &Neighbor) -> Result<(), WireError> {
        let ns_local = self.namespace(router.idx)?;
        let ns_peer = self.namespace(neigh.peeridx)?;
        let lladdr = self.backend.read_lladdr(ns_peer, &neigh.peerifname)?;
        self.backend
            .neigh_replace(ns_local, neigh.neighbor_ip, &lladdr, &neigh.ifname)
    }

    /// Run both phases with a full barrier between them.
    pub fn wire(&self, blueprint: &Blueprint) -> WireReport {
        let links = self.create_links(blueprint);
        let neighbors = self.install_static_neighbors(blueprint);
        WireReport { links, neighbors }
    }
}

fn log_phase(phase: &str, results: &[OperationResult]) {
    let mut failed = 0;
    for result in results {
        if let Err(err) = &result.outcome {
            failed += 1;
            warn!("{}: {}", result.operation, err);
        }
    }
    info!(
        "{phase}: {} ok, {failed} failed",
        results.len() - failed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorConfig;
    use crate::topology::{BlueprintGenerator, Graph};
    use crate::wire::SimulatedBackend;

    fn ring_blueprint(n: u32) -> Blueprint {
        let mut g = Graph::with_nodes(n);
        for u in 1..=n {
            g.add_edge(u, u % n + 1).unwrap();
        }
        BlueprintGenerator::new(GeneratorConfig::default())
            .address_graph(&g)
            .unwrap()
    }

    fn handles(n: u32) -> HashMap<u32, NamespaceHandle> {
        (1..=n)
            .map(|i| (i, NamespaceHandle::new(format!("ns{i}"))))
            .collect()
    }

    #[test]
    fn test_create_links_once_per_edge() {
        let bp = ring_blueprint(4);
        let map = handles(4);
        let sim = SimulatedBackend::with_namespaces(map.values());
        let wirer = NetworkWirer::new(&sim, &map);

        let results = wirer.create_links(&bp);
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(OperationResult::is_ok));
        assert!(sim.host_interface_names().is_empty());

        assert_eq!(sim.interface_names(&map[&1]), vec!["eth1to2", "eth1to4"]);
        let iface = sim.interface(&map[&1], "eth1to2").unwrap();
        assert!(iface.up);
        assert_eq!(iface.addrs, vec!["169.254.1.1/30"]);
        let peer = sim.interface(&map[&2], "eth2to1").unwrap();
        assert_eq!(peer.addrs, vec!["169.254.1.2/30"]);
    }

    #[test]
    fn test_missing_namespace_fails_only_its_links() {
        let bp = ring_blueprint(4);
        let mut map = handles(4);
        map.remove(&3);
        let sim = SimulatedBackend::with_namespaces(map.values());
        let report = NetworkWirer::new(&sim, &map).wire(&bp);

        let failed_links: Vec<Operation> = report
            .links
            .iter()
            .filter(|r| !r.is_ok())
            .map(|r| r.operation)
            .collect();
        assert_eq!(
            failed_links,
            vec![Operation::Link { x: 2, y: 3 }, Operation::Link { x: 3, y: 4 }]
        );
        assert!(report.links.iter().filter(|r| r.is_ok()).count() == 2);
        assert!(!report.is_success());
        // Router 1's entries for 2 and 4 still succeed.
        let ok_neighbors = report.neighbors.iter().filter(|r| r.is_ok()).count();
        assert_eq!(ok_neighbors, 4);
    }

    #[test]
    fn test_interface_clash_is_reported_per_link() {
        let bp = ring_blueprint(3);
        let map = handles(3);
        let sim = SimulatedBackend::with_namespaces(map.values());
        sim.add_interface(&map[&1], "eth1to2").unwrap();

        let results = NetworkWirer::new(&sim, &map).create_links(&bp);
        let failures: Vec<_> = results.iter().filter(|r| !r.is_ok()).collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].operation, Operation::Link { x: 1, y: 2 });
        assert!(matches!(failures[0].outcome, Err(WireError::InterfaceExists(_))));
    }

    #[test]
    fn test_failed_link_leaves_nothing_behind() {
        let bp = ring_blueprint(3);
        let map = handles(3);
        let sim = SimulatedBackend::with_namespaces(map.values());
        // Clash on the far end, after the near end is fully configured.
        sim.add_interface(&map[&2], "eth2to1").unwrap();

        let wirer = NetworkWirer::new(&sim, &map);
        let results = wirer.create_links(&bp);
        let failed: Vec<_> = results.iter().filter(|r| !r.is_ok()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].operation, Operation::Link { x: 1, y: 2 });

        assert!(sim.host_interface_names().is_empty());
        assert_eq!(sim.interface_names(&map[&1]), vec!["eth1to3"]);
        assert_eq!(sim.interface_names(&map[&2]), vec!["eth2to1", "eth2to3"]);
        assert!(sim.interface(&map[&2], "eth2to1").unwrap().addrs.is_empty());

        // Once the stray interface is gone the link can be created again.
        sim.delete_link(Some(&map[&2]), "eth2to1").unwrap();
        let retry = wirer.create_links(&bp);
        assert!(retry.iter().filter(|r| r.operation == Operation::Link { x: 1, y: 2 }).all(|r| r.is_ok()));
        assert!(sim.host_interface_names().is_empty());
    }

    #[test]
    fn test_failed_move_removes_host_ends() {
        let bp = ring_blueprint(3);
        let mut map = handles(3);
        // Handle known to the wirer but missing on the host.
        map.insert(3, NamespaceHandle::new("gone"));
        let present: Vec<_> = (1..=2).map(|i| map[&i].clone()).collect();
        let sim = SimulatedBackend::with_namespaces(&present);

        let results = NetworkWirer::new(&sim, &map).create_links(&bp);
        assert_eq!(results.iter().filter(|r| !r.is_ok()).count(), 2);
        assert!(sim.host_interface_names().is_empty());
        assert_eq!(sim.interface_names(&map[&1]), vec!["eth1to2"]);
        assert_eq!(sim.interface_names(&map[&2]), vec!["eth2to1"]);
    }

    #[test]
    fn test_temporary_names_fit_kernel_limit() {
        let (a, b) = temporary_names(99_999, 99_998);
        assert!(a.len() <= 15 && b.len() <= 15);
        assert_ne!(a, b);
    }
}
