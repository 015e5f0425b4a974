//! Vertex-separator partitioning for arbitrary graphs.
//!
//! The separator is grown greedily by removing the vertex with the highest
//! betweenness centrality; every intermediate cut that splits the graph is
//! scored and the best one kept. Its components are then packed into the
//! requested number of parts and the cut itself becomes the overflow part,
//! so every link between parts ends in the overflow part by construction.

use std::collections::{BTreeSet, VecDeque};

use log::{debug, info};
use rayon::prelude::*;

use super::{Partition, Partitioner};
use crate::error::{Result, TopoError};
use crate::topology::Graph;

/// Sources handled by one rayon task; partial sums are combined in chunk
/// order so the result does not depend on scheduling.
const SOURCE_CHUNK: usize = 32;

/// Weights of the separator score terms (lower score is better)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    /// Largest piece (component or cut) relative to the node count
    pub largest_piece: f64,
    /// Mean cut-to-component link density over the mean degree
    pub connectivity: f64,
    /// Coefficient of variation of the component sizes
    pub imbalance: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            largest_piece: 27.0,
            connectivity: 1.0,
            imbalance: 1.0,
        }
    }
}

/// A vertex cut and the components left after removing it (0-based ids)
#[derive(Debug, Clone, PartialEq)]
pub struct Separator {
    pub cut: Vec<usize>,
    pub components: Vec<Vec<usize>>,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct SeparatorPartitioner {
    /// BFS depth beyond which shortest paths are not expanded
    pub cutoff: Option<u32>,
    pub weights: ScoreWeights,
}

impl Default for SeparatorPartitioner {
    fn default() -> Self {
        Self {
            cutoff: Some(4),
            weights: ScoreWeights::default(),
        }
    }
}

impl SeparatorPartitioner {
    /// Search for the best-scoring separator. `None` if no removal sequence
    /// ever leaves more than one component.
    pub fn find_separator(&self, graph: &Graph) -> Option<Separator> {
        let original = zero_based(graph);
        let n = original.len();
        if n == 0 {
            return None;
        }
        let mean_degree = original.iter().map(Vec::len).sum::<usize>() as f64 / n as f64;

        let mut work = original.clone();
        let mut cut = BTreeSet::new();
        let mut best: Option<Separator> = None;

        for _ in 0..n {
            let centrality = betweenness(&work, self.cutoff);
            let Some(v) = argmax(&centrality) else { break };
            if work[v].is_empty() {
                break;
            }
            cut.insert(v);
            remove_vertex(&mut work, v);

            let comps = components(&work, &cut);
            if comps.len() < 2 {
                continue;
            }
            let score = self.score(&original, mean_degree, &cut, &comps);
            debug!("cut of {} leaves {} components, score {:.4}", cut.len(), comps.len(), score);
            if best.as_ref().map_or(true, |b| score < b.score) {
                best = Some(Separator {
                    cut: cut.iter().copied().collect(),
                    components: comps,
                    score,
                });
            }
        }
        best
    }

    fn score(
        &self,
        original: &[Vec<usize>],
        mean_degree: f64,
        cut: &BTreeSet<usize>,
        comps: &[Vec<usize>],
    ) -> f64 {
        let n = original.len() as f64;
        let k = comps.len() as f64;

        let largest = comps.iter().map(Vec::len).max().unwrap_or(0).max(cut.len());
        let largest_piece = largest as f64 / n;

        let mut cut_links = vec![0usize; original.len()];
        for &u in cut {
            for &v in &original[u] {
                cut_links[v] += 1;
            }
        }
        let density: f64 = comps
            .iter()
            .map(|comp| comp.iter().map(|&u| cut_links[u]).sum::<usize>() as f64 / comp.len() as f64)
            .sum();
        let connectivity = if mean_degree > 0.0 {
            density / k / mean_degree
        } else {
            0.0
        };

        let mean = comps.iter().map(Vec::len).sum::<usize>() as f64 / k;
        let variance = comps
            .iter()
            .map(|comp| (comp.len() as f64 - mean).powi(2))
            .sum::<f64>()
            / k;
        let imbalance = if mean > 0.0 { variance.sqrt() / mean } else { 0.0 };

        self.weights.largest_piece * largest_piece
            + self.weights.connectivity * connectivity
            + self.weights.imbalance * imbalance
    }
}

impl Partitioner for SeparatorPartitioner {
    fn partition(&self, graph: &Graph, parts: u32) -> Result<Partition> {
        if parts == 0 {
            return Err(TopoError::InvalidPartCount(parts));
        }
        let Some(separator) = self.find_separator(graph) else {
            if parts == 1 {
                info!("No separator found, keeping all {} nodes in one part", graph.node_count());
                return Ok(Partition::from_nodes(vec![graph.nodes().collect()], Vec::new()));
            }
            return Err(TopoError::NoSeparator);
        };
        info!(
            "Separator: {} cut nodes, {} components, score {:.4}",
            separator.cut.len(),
            separator.components.len(),
            separator.score
        );

        let sizes: Vec<usize> = separator.components.iter().map(Vec::len).collect();
        let groups = pack_best_fit(&sizes, parts as usize);
        let regular = groups
            .iter()
            .map(|group| {
                let mut nodes: Vec<u32> = group
                    .iter()
                    .flat_map(|&c| separator.components[c].iter().map(|&u| u as u32 + 1))
                    .collect();
                nodes.sort_unstable();
                nodes
            })
            .collect();
        let overflow = separator.cut.iter().map(|&u| u as u32 + 1).collect();
        Ok(Partition::from_nodes(regular, overflow))
    }
}

fn zero_based(graph: &Graph) -> Vec<Vec<usize>> {
    graph
        .nodes()
        .map(|u| graph.neighbors(u).iter().map(|&v| v as usize - 1).collect())
        .collect()
}

/// First index holding the largest value
fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &value) in values.iter().enumerate() {
        if best.map_or(true, |(_, b)| value > b) {
            best = Some((i, value));
        }
    }
    best.map(|(i, _)| i)
}

fn remove_vertex(adj: &mut [Vec<usize>], v: usize) {
    let neighbors = std::mem::take(&mut adj[v]);
    for u in neighbors {
        adj[u].retain(|&w| w != v);
    }
}

/// Connected components of the vertices outside `cut`, discovered in index
/// order.
fn components(adj: &[Vec<usize>], cut: &BTreeSet<usize>) -> Vec<Vec<usize>> {
    let mut visited = vec![false; adj.len()];
    let mut comps = Vec::new();
    for start in 0..adj.len() {
        if visited[start] || cut.contains(&start) {
            continue;
        }
        visited[start] = true;
        let mut comp = Vec::new();
        let mut stack = vec![start];
        while let Some(u) = stack.pop() {
            comp.push(u);
            for &v in &adj[u] {
                if !visited[v] {
                    visited[v] = true;
                    stack.push(v);
                }
            }
        }
        comps.push(comp);
    }
    comps
}

/// Per-source scratch space for Brandes' algorithm
struct Brandes {
    sigma: Vec<f64>,
    dist: Vec<i64>,
    delta: Vec<f64>,
    pred: Vec<Vec<usize>>,
    order: Vec<usize>,
    queue: VecDeque<usize>,
}

impl Brandes {
    fn new(n: usize) -> Self {
        Self {
            sigma: vec![0.0; n],
            dist: vec![-1; n],
            delta: vec![0.0; n],
            pred: vec![Vec::new(); n],
            order: Vec::with_capacity(n),
            queue: VecDeque::with_capacity(n),
        }
    }

    /// Add the dependencies of source `s` to `acc`.
    fn accumulate(&mut self, adj: &[Vec<usize>], s: usize, cutoff: Option<u32>, acc: &mut [f64]) {
        self.sigma.fill(0.0);
        self.dist.fill(-1);
        self.delta.fill(0.0);
        self.pred.iter_mut().for_each(Vec::clear);
        self.order.clear();

        self.sigma[s] = 1.0;
        self.dist[s] = 0;
        self.queue.push_back(s);
        while let Some(u) = self.queue.pop_front() {
            self.order.push(u);
            if cutoff.is_some_and(|c| self.dist[u] > i64::from(c)) {
                continue;
            }
            for &v in &adj[u] {
                if self.dist[v] < 0 {
                    self.dist[v] = self.dist[u] + 1;
                    self.queue.push_back(v);
                }
                if self.dist[v] == self.dist[u] + 1 {
                    self.sigma[v] += self.sigma[u];
                    self.pred[v].push(u);
                }
            }
        }

        while let Some(w) = self.order.pop() {
            if self.sigma[w] > 0.0 {
                let coeff = (1.0 + self.delta[w]) / self.sigma[w];
                for &v in &self.pred[w] {
                    self.delta[v] += self.sigma[v] * coeff;
                }
            }
            if w != s {
                acc[w] += self.delta[w];
            }
        }
    }
}

/// Betweenness centrality of every vertex, sources processed in parallel.
pub fn betweenness(adj: &[Vec<usize>], cutoff: Option<u32>) -> Vec<f64> {
    let n = adj.len();
    let sources: Vec<usize> = (0..n).collect();
    let partials: Vec<Vec<f64>> = sources
        .par_chunks(SOURCE_CHUNK)
        .map(|chunk| {
            let mut acc = vec![0.0; n];
            let mut scratch = Brandes::new(n);
            for &s in chunk {
                scratch.accumulate(adj, s, cutoff, &mut acc);
            }
            acc
        })
        .collect();

    let mut total = vec![0.0; n];
    for partial in partials {
        for (t, p) in total.iter_mut().zip(partial) {
            *t += p;
        }
    }
    total
}

/// Pack items of the given sizes into `bins` groups, minimizing the largest
/// group by binary search over the capacity with best-fit decreasing.
/// Returns item indices per group; there are always exactly `bins` groups.
pub fn pack_best_fit(sizes: &[usize], bins: usize) -> Vec<Vec<usize>> {
    let n = sizes.len();
    let mut groups: Vec<Vec<usize>> = if n == 0 || bins == 0 {
        Vec::new()
    } else if bins == 1 {
        vec![(0..n).collect()]
    } else if bins >= n {
        (0..n).map(|i| vec![i]).collect()
    } else {
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| sizes[b].cmp(&sizes[a]));

        let mut low = sizes.iter().copied().max().unwrap_or(0);
        let mut high: usize = sizes.iter().sum();
        // Capacity `sum` always fits and best-fit then fills the first bin.
        let mut best = vec![order.clone()];
        while low <= high {
            let mid = low + (high - low) / 2;
            match best_fit(&order, sizes, bins, mid) {
                Some(assignment) => {
                    best = assignment;
                    if mid == 0 {
                        break;
                    }
                    high = mid - 1;
                }
                None => low = mid + 1,
            }
        }
        best
    };
    groups.resize_with(bins, Vec::new);
    groups
}

fn best_fit(order: &[usize], sizes: &[usize], bins: usize, capacity: usize) -> Option<Vec<Vec<usize>>> {
    let mut groups = vec![Vec::new(); bins];
    let mut loads = vec![0usize; bins];
    for &item in order {
        let size = sizes[item];
        let bin = (0..bins)
            .filter(|&b| loads[b] + size <= capacity)
            .min_by_key(|&b| capacity - (loads[b] + size))?;
        groups[bin].push(item);
        loads[bin] += size;
    }
    Some(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::validate::{check_coverage, check_cut};
    use crate::topology::{Blueprint, FatTree};
    use crate::config::GeneratorConfig;

    fn graph(n: u32, edges: &[(u32, u32)]) -> Graph {
        let mut g = Graph::with_nodes(n);
        for &(u, v) in edges {
            g.add_edge(u, v).unwrap();
        }
        g
    }

    /// Two triangles joined through node 4
    fn barbell() -> Graph {
        graph(7, &[(1, 2), (2, 3), (1, 3), (3, 4), (4, 5), (5, 6), (6, 7), (5, 7)])
    }

    #[test]
    fn test_betweenness_of_path() {
        let adj = zero_based(&graph(3, &[(1, 2), (2, 3)]));
        let c = betweenness(&adj, None);
        // The middle node lies on both directed shortest paths between the ends.
        assert_eq!(c, vec![0.0, 2.0, 0.0]);
    }

    #[test]
    fn test_bridge_node_is_the_separator() {
        let sep = SeparatorPartitioner::default().find_separator(&barbell()).unwrap();
        assert_eq!(sep.cut, vec![3]);
        assert_eq!(sep.components, vec![vec![0, 2, 1], vec![4, 6, 5]]);

        let p = SeparatorPartitioner::default().partition(&barbell(), 2).unwrap();
        assert_eq!(p.parts(), &[vec![1, 2, 3], vec![5, 6, 7], vec![4]]);
    }

    #[test]
    fn test_complete_graph_has_no_separator() {
        let k4 = graph(4, &[(1, 2), (1, 3), (1, 4), (2, 3), (2, 4), (3, 4)]);
        let partitioner = SeparatorPartitioner::default();
        assert!(matches!(partitioner.partition(&k4, 2), Err(TopoError::NoSeparator)));

        let p = partitioner.partition(&k4, 1).unwrap();
        assert_eq!(p.parts(), &[vec![1, 2, 3, 4], vec![]]);
    }

    #[test]
    fn test_pack_best_fit_minimizes_largest_group() {
        let sizes = [5, 4, 3, 3, 1];
        let groups = pack_best_fit(&sizes, 2);
        let mut loads: Vec<usize> = groups
            .iter()
            .map(|g| g.iter().map(|&i| sizes[i]).sum())
            .collect();
        loads.sort_unstable();
        assert_eq!(loads, vec![8, 8]);
    }

    #[test]
    fn test_pack_pads_to_bin_count() {
        assert_eq!(pack_best_fit(&[3, 2], 4), vec![vec![0], vec![1], vec![], vec![]]);
        assert_eq!(pack_best_fit(&[3, 2], 1), vec![vec![0, 1]]);
        assert_eq!(pack_best_fit(&[], 2), vec![Vec::<usize>::new(), Vec::new()]);
    }

    #[test]
    fn test_fattree_separator_partition_is_valid() {
        let bp: Blueprint = FatTree::new(4)
            .unwrap()
            .generate(&GeneratorConfig::default())
            .unwrap();
        let g = Graph::from_blueprint(&bp).unwrap();
        let p = SeparatorPartitioner::default().partition(&g, 2).unwrap();
        assert_eq!(p.len(), 3);
        check_coverage(&p, bp.len()).unwrap();
        check_cut(&bp, &p).unwrap();
    }

    #[test]
    fn test_deterministic() {
        let g = barbell();
        let a = SeparatorPartitioner::default().partition(&g, 2).unwrap();
        let b = SeparatorPartitioner::default().partition(&g, 2).unwrap();
        assert_eq!(a, b);
    }
}
