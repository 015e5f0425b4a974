#[cfg(test)]
mod wiring_tests {
    use std::collections::HashMap;

    use fabricgen::topology::{Blueprint, BlueprintGenerator, Graph, TopologyKind};
    use fabricgen::wire::{NamespaceHandle, NetworkWirer, Operation, SimulatedBackend, WireError};

    fn ring(n: u32) -> Blueprint {
        let mut graph = Graph::with_nodes(n);
        for u in 1..=n {
            graph.add_edge(u, u % n + 1).unwrap();
        }
        BlueprintGenerator::default().address_graph(&graph).unwrap()
    }

    fn namespaces(bp: &Blueprint) -> HashMap<u32, NamespaceHandle> {
        bp.routers
            .iter()
            .map(|r| (r.idx, NamespaceHandle::new(format!("{}", 1000 + r.idx))))
            .collect()
    }

    fn assert_fully_wired(bp: &Blueprint, sim: &SimulatedBackend, map: &HashMap<u32, NamespaceHandle>) {
        for router in &bp.routers {
            let ns = &map[&router.idx];
            let table = sim.neighbors(ns);
            assert_eq!(table.len(), router.neighbors.len(), "router {}", router.idx);

            for neigh in &router.neighbors {
                let local = sim.interface(ns, &neigh.ifname).unwrap();
                assert!(local.up);
                assert_eq!(local.addrs, vec![neigh.self_cidr()]);

                let peer = sim.interface(&map[&neigh.peeridx], &neigh.peerifname).unwrap();
                let entry = table.iter().find(|e| e.ip == neigh.neighbor_ip).unwrap();
                assert_eq!(entry.lladdr, peer.lladdr);
                assert_eq!(entry.ifname, neigh.ifname);
            }
        }
        assert!(sim.host_interface_names().is_empty());
    }

    #[test]
    fn test_ring_static_neighbors_match_peer_macs() {
        let bp = ring(4);
        let map = namespaces(&bp);
        let sim = SimulatedBackend::with_namespaces(map.values());

        let report = NetworkWirer::new(&sim, &map).wire(&bp);
        assert!(report.is_success(), "{}", report.summary());
        assert_eq!(report.links.len(), 4);
        assert_eq!(report.neighbors.len(), 8);
        assert_eq!(report.summary(), "links 4/4 ok, static neighbors 8/8 ok");
        assert_fully_wired(&bp, &sim, &map);
    }

    #[test]
    fn test_fattree_wiring() {
        let bp = BlueprintGenerator::default()
            .generate(&TopologyKind::FatTree { k: 4 })
            .unwrap();
        let map = namespaces(&bp);
        let sim = SimulatedBackend::with_namespaces(map.values());

        let report = NetworkWirer::new(&sim, &map).wire(&bp);
        assert!(report.is_success(), "{}", report.summary());
        assert_eq!(report.links.len(), bp.link_count());
        assert_fully_wired(&bp, &sim, &map);
    }

    #[test]
    fn test_phases_can_be_sequenced_by_caller() {
        let bp = ring(5);
        let map = namespaces(&bp);
        let sim = SimulatedBackend::with_namespaces(map.values());
        let wirer = NetworkWirer::new(&sim, &map);

        // Without links there is no peer interface to read a MAC from.
        let early = wirer.install_static_neighbors(&bp);
        assert!(early
            .iter()
            .all(|r| matches!(r.outcome, Err(WireError::NoSuchInterface { .. }))));

        assert!(wirer.create_links(&bp).iter().all(|r| r.is_ok()));
        assert!(wirer.install_static_neighbors(&bp).iter().all(|r| r.is_ok()));
        assert_fully_wired(&bp, &sim, &map);
    }

    #[test]
    fn test_failures_are_isolated() {
        let bp = ring(4);
        let map = namespaces(&bp);
        // Router 2's namespace is known to the wirer but absent on the host.
        let sim = SimulatedBackend::with_namespaces(map.iter().filter(|&(&i, _)| i != 2).map(|(_, h)| h));

        let report = NetworkWirer::new(&sim, &map).wire(&bp);
        assert!(!report.is_success());

        let mut failed: Vec<Operation> = report.links.iter().filter(|r| !r.is_ok()).map(|r| r.operation).collect();
        failed.sort_by_key(|op| match op {
            Operation::Link { x, y } => (*x, *y),
            Operation::StaticNeighbor { router, peer } => (*router, *peer),
        });
        assert_eq!(
            failed,
            vec![Operation::Link { x: 1, y: 2 }, Operation::Link { x: 2, y: 3 }]
        );
        // The 3 -- 4 and 1 -- 4 links are unaffected.
        let ns4 = &map[&4];
        assert!(sim.interface(ns4, "eth4to1").is_some());
        assert!(sim.interface(ns4, "eth4to3").is_some());
    }
}
