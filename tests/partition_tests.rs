#[cfg(test)]
mod partition_tests {
    use fabricgen::partition::{
        self, range, validate, Partition, Partitioner, RangePartitioner, SeparatorPartitioner,
        PARTITION_FILE,
    };
    use fabricgen::topology::{Blueprint, BlueprintGenerator, FatTree, Graph, TopologyKind};
    use fabricgen::TopoError;
    use tempfile::tempdir;

    /// Node 45 is joined to every other node; the only other link is 5 -- 40.
    fn hub_with_chord() -> Blueprint {
        let mut graph = Graph::with_nodes(45);
        for u in 1..45 {
            graph.add_edge(u, 45).unwrap();
        }
        graph.add_edge(5, 40).unwrap();
        BlueprintGenerator::default().address_graph(&graph).unwrap()
    }

    #[test]
    fn test_range_partition_sizes() {
        let result = range::partition(100, 125, 3).unwrap();
        assert_eq!(result.sizes(), vec![34, 33, 33, 25]);
        assert_eq!(result.regular_parts()[0], (1..=34).collect::<Vec<i64>>());
        assert_eq!(result.regular_parts()[2], (68..=100).collect::<Vec<i64>>());
        assert_eq!(result.overflow(), (101..=125).collect::<Vec<i64>>().as_slice());
        validate::check_coverage(&result, 125).unwrap();

        assert!(matches!(range::partition(100, 125, 0), Err(TopoError::InvalidPartCount(0))));
    }

    #[test]
    fn test_fattree_range_partition_is_valid() {
        let bp = BlueprintGenerator::default()
            .generate(&TopologyKind::FatTree { k: 8 })
            .unwrap();
        let graph = Graph::from_blueprint(&bp).unwrap();
        let tree = FatTree::new(8).unwrap();

        // Whole pods per part keep every ToR-Leaf link inside a part.
        let result = RangePartitioner::for_fattree(&tree).partition(&graph, 4).unwrap();
        assert_eq!(result.sizes(), vec![16, 16, 16, 16, 16]);
        validate::check_coverage(&result, bp.len()).unwrap();
        partition::check_cut(&bp, &result).unwrap();
    }

    #[test]
    fn test_coverage_reports_all_problems() {
        let bad = Partition::new(vec![vec![1, 2, 3], vec![3, 4, 5, 6], vec![8, 9, 10, 11]]);
        let report = validate::coverage_report(&bad, 10);
        assert_eq!(report.missing, vec![7]);
        assert_eq!(report.duplicates, vec![(3, 2)]);
        assert_eq!(report.out_of_range, vec![11]);

        let err = validate::check_coverage(&bad, 10).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("3:2"), "{message}");
        assert!(message.contains("missing (should include 1..10): 7"), "{message}");
        assert!(message.contains("out of range (not in 1..10): 11"), "{message}");
    }

    #[test]
    fn test_cut_edge_between_regular_parts() {
        let bp = hub_with_chord();
        let part0: Vec<i64> = (1..=20).collect();
        let part1: Vec<i64> = (21..=44).collect();
        let bad = Partition::new(vec![part0.clone(), part1, vec![45]]);
        validate::check_coverage(&bad, 45).unwrap();

        match partition::check_cut(&bp, &bad) {
            Err(TopoError::InvalidPartitionCut { edges }) => assert_eq!(edges, vec![(5, 40)]),
            other => panic!("expected a cut violation, got {other:?}"),
        }

        let part1: Vec<i64> = (21..=44).filter(|&v| v != 40).collect();
        let fixed = Partition::new(vec![part0, part1, vec![40, 45]]);
        partition::check_cut(&bp, &fixed).unwrap();
        validate::check_coverage(&fixed, 45).unwrap();
    }

    #[test]
    fn test_separator_partition_of_generated_graph() {
        let bp = hub_with_chord();
        let graph = Graph::from_blueprint(&bp).unwrap();
        let result = SeparatorPartitioner::default().partition(&graph, 3).unwrap();

        assert_eq!(result.len(), 4);
        assert!(result.overflow().contains(&45));
        validate::check_coverage(&result, bp.len()).unwrap();
        partition::check_cut(&bp, &result).unwrap();
    }

    #[test]
    fn test_partition_file_round_trip() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("conf/frr/fattree4");
        let written = range::fattree_partition(4, 2).unwrap();
        partition::save_partition(&dir, &written).unwrap();

        let read = partition::load_partition(&dir.join(PARTITION_FILE)).unwrap();
        assert_eq!(read, written);

        std::fs::write(dir.join(PARTITION_FILE), "[[1, 2], [3, \"x\"]]").unwrap();
        let err = partition::load_partition(&dir.join(PARTITION_FILE)).unwrap_err();
        assert!(matches!(err, TopoError::InvalidPartitionFile(ref m) if m.contains("subarray 1")));
    }
}
