//! Offline checks of a partition against its blueprint.
//!
//! Both checks are read-only and report every problem they find rather
//! than stopping at the first one.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use super::Partition;
use crate::error::{Result, TopoError};
use crate::topology::Blueprint;

/// Everything wrong with how a partition covers `[1, N]`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoverageReport {
    pub node_count: usize,
    /// Ids in `[1, N]` that appear in no part
    pub missing: Vec<i64>,
    /// Values that appear more than once, with their count
    pub duplicates: Vec<(i64, usize)>,
    /// Values outside `[1, N]`, sorted
    pub out_of_range: Vec<i64>,
}

impl CoverageReport {
    pub fn is_ok(&self) -> bool {
        self.missing.is_empty() && self.duplicates.is_empty() && self.out_of_range.is_empty()
    }
}

fn join<T: fmt::Display>(items: impl IntoIterator<Item = T>) -> String {
    items
        .into_iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for CoverageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sections = Vec::new();
        if !self.duplicates.is_empty() {
            let pairs = self.duplicates.iter().map(|(v, c)| format!("{v}:{c}"));
            sections.push(format!("duplicate values (value:count): {}", join(pairs)));
        }
        if !self.missing.is_empty() {
            sections.push(format!(
                "missing (should include 1..{}): {}",
                self.node_count,
                join(&self.missing)
            ));
        }
        if !self.out_of_range.is_empty() {
            sections.push(format!(
                "out of range (not in 1..{}): {}",
                self.node_count,
                join(&self.out_of_range)
            ));
        }
        if sections.is_empty() {
            return write!(f, "ok");
        }
        write!(f, "{}", sections.join("; "))
    }
}

/// Count how the partition covers `[1, node_count]`.
pub fn coverage_report(partition: &Partition, node_count: usize) -> CoverageReport {
    let in_range = |v: i64| v >= 1 && v as u64 <= node_count as u64;
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    let mut out_of_range = Vec::new();
    for &value in partition.parts().iter().flatten() {
        *counts.entry(value).or_default() += 1;
        if !in_range(value) {
            out_of_range.push(value);
        }
    }
    out_of_range.sort_unstable();

    let missing = (1..=node_count as i64)
        .filter(|id| !counts.contains_key(id))
        .collect();
    let duplicates = counts
        .iter()
        .filter(|(_, count)| **count > 1)
        .map(|(&value, &count)| (value, count))
        .collect();

    CoverageReport {
        node_count,
        missing,
        duplicates,
        out_of_range,
    }
}

/// Every id in `[1, node_count]` must appear exactly once and nothing else
/// may appear.
pub fn check_coverage(partition: &Partition, node_count: usize) -> Result<()> {
    let report = coverage_report(partition, node_count);
    if report.is_ok() {
        Ok(())
    } else {
        Err(TopoError::PartitionCoverage(report))
    }
}

/// Every link leaving a regular part must end in the same part or in the
/// overflow part. Offending links are reported once each as `(u, v)` with
/// `u` the endpoint seen first.
///
/// Ids that are out of range or unassigned are left to the coverage check.
pub fn check_cut(blueprint: &Blueprint, partition: &Partition) -> Result<()> {
    let Some(overflow) = partition.overflow_index() else {
        return Ok(());
    };
    let mut part_of: HashMap<u32, usize> = HashMap::new();
    for (i, part) in partition.parts().iter().enumerate() {
        for &value in part {
            if let Ok(id) = u32::try_from(value) {
                part_of.insert(id, i);
            }
        }
    }

    let mut seen = HashSet::new();
    let mut edges = Vec::new();
    for (i, part) in partition.regular_parts().iter().enumerate() {
        for &value in part {
            let Some(router) = u32::try_from(value).ok().and_then(|u| blueprint.router(u)) else {
                continue;
            };
            for neigh in &router.neighbors {
                let v = neigh.peeridx;
                let Some(&pv) = part_of.get(&v) else { continue };
                if pv != i && pv != overflow && seen.insert((router.idx.min(v), router.idx.max(v))) {
                    edges.push((router.idx, v));
                }
            }
        }
    }

    if edges.is_empty() {
        Ok(())
    } else {
        Err(TopoError::InvalidPartitionCut { edges })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorConfig;
    use crate::topology::{BlueprintGenerator, Graph};

    fn line_blueprint(n: u32) -> Blueprint {
        let mut g = Graph::with_nodes(n);
        for u in 1..n {
            g.add_edge(u, u + 1).unwrap();
        }
        BlueprintGenerator::new(GeneratorConfig::default())
            .address_graph(&g)
            .unwrap()
    }

    #[test]
    fn test_coverage_reports_everything_at_once() {
        let p = Partition::new(vec![vec![1, 2, 3], vec![3, 4, 5, 6], vec![8, 9, 10, 0, 12]]);
        let report = coverage_report(&p, 10);
        assert_eq!(report.missing, vec![7]);
        assert_eq!(report.duplicates, vec![(3, 2)]);
        assert_eq!(report.out_of_range, vec![0, 12]);

        let text = report.to_string();
        assert!(text.contains("3:2"), "{text}");
        assert!(text.contains("missing (should include 1..10): 7"), "{text}");
        assert!(matches!(check_coverage(&p, 10), Err(TopoError::PartitionCoverage(_))));
    }

    #[test]
    fn test_coverage_ok() {
        let p = Partition::new(vec![vec![2, 1], vec![3]]);
        assert!(coverage_report(&p, 3).is_ok());
        assert!(check_coverage(&p, 3).is_ok());
    }

    #[test]
    fn test_cut_through_overflow_is_valid() {
        let bp = line_blueprint(5);
        let p = Partition::new(vec![vec![1, 2], vec![4, 5], vec![3]]);
        assert!(check_cut(&bp, &p).is_ok());
    }

    #[test]
    fn test_cut_between_regular_parts_lists_each_edge_once() {
        let bp = line_blueprint(6);
        let p = Partition::new(vec![vec![1, 2], vec![3, 4], vec![5], vec![6]]);
        match check_cut(&bp, &p) {
            Err(TopoError::InvalidPartitionCut { edges }) => {
                assert_eq!(edges, vec![(2, 3), (4, 5)]);
            }
            other => panic!("expected InvalidPartitionCut, got {other:?}"),
        }
    }

    #[test]
    fn test_cut_ignores_unassigned_nodes() {
        let bp = line_blueprint(3);
        let p = Partition::new(vec![vec![1], vec![3]]);
        assert!(check_cut(&bp, &p).is_ok());
    }
}
