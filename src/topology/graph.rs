//! Undirected simple graphs with dense 1-based node ids.
//!
//! This is the intermediate form between a GML file and a blueprint, and the
//! input to the generic partitioner.

use std::collections::HashMap;

use log::{debug, warn};
use rand::Rng;

use crate::error::{Result, TopoError};
use crate::gml_parser::GmlGraph;
use crate::topology::blueprint::Blueprint;

/// Simple undirected graph over nodes `1..=n`.
///
/// Adjacency lists keep insertion order; that order decides link address
/// allocation, so it is part of the reproducibility contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    /// `adj[u - 1]` lists the neighbors of `u`
    adj: Vec<Vec<u32>>,
}

impl Graph {
    pub fn with_nodes(n: u32) -> Self {
        Self {
            adj: vec![Vec::new(); n as usize],
        }
    }

    pub fn node_count(&self) -> u32 {
        self.adj.len() as u32
    }

    pub fn edge_count(&self) -> usize {
        self.adj.iter().map(Vec::len).sum::<usize>() / 2
    }

    pub fn nodes(&self) -> impl Iterator<Item = u32> {
        1..=self.node_count()
    }

    pub fn neighbors(&self, u: u32) -> &[u32] {
        (u as usize)
            .checked_sub(1)
            .and_then(|pos| self.adj.get(pos))
            .map_or(&[], Vec::as_slice)
    }

    /// Add a fresh node and return its id.
    pub fn add_node(&mut self) -> u32 {
        self.adj.push(Vec::new());
        self.node_count()
    }

    /// Add the undirected edge `u -- v`. Returns `false` if it already
    /// existed. Self-loops and unknown endpoints are rejected.
    pub fn add_edge(&mut self, u: u32, v: u32) -> Result<bool> {
        let n = self.node_count();
        if u == 0 || v == 0 || u > n || v > n {
            return Err(TopoError::InvalidBlueprint(format!(
                "edge {u} -- {v} references a node outside 1..={n}"
            )));
        }
        if u == v {
            return Err(TopoError::InvalidBlueprint(format!("self-loop on node {u}")));
        }
        if self.adj[u as usize - 1].contains(&v) {
            return Ok(false);
        }
        self.adj[u as usize - 1].push(v);
        self.adj[v as usize - 1].push(u);
        Ok(true)
    }

    pub fn has_edge(&self, u: u32, v: u32) -> bool {
        self.neighbors(u).contains(&v)
    }

    /// Undirected edges `(u, v)` with `u < v`, in adjacency order.
    pub fn edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.nodes().flat_map(move |u| {
            self.neighbors(u)
                .iter()
                .filter(move |&&v| u < v)
                .map(move |&v| (u, v))
        })
    }

    /// Number of nodes reachable from node 1, using an explicit stack.
    pub fn reachable_from_first(&self) -> usize {
        if self.adj.is_empty() {
            return 0;
        }
        let mut visited = vec![false; self.adj.len()];
        let mut stack = vec![1u32];
        visited[0] = true;
        let mut count = 1;
        while let Some(u) = stack.pop() {
            for &v in self.neighbors(u) {
                let seen = &mut visited[v as usize - 1];
                if !*seen {
                    *seen = true;
                    count += 1;
                    stack.push(v);
                }
            }
        }
        count
    }

    /// Fail with `DisconnectedTopology` unless every node is reachable
    /// from node 1.
    pub fn check_connected(&self) -> Result<()> {
        let total = self.adj.len();
        let reached = self.reachable_from_first();
        if total == 0 || reached != total {
            return Err(TopoError::DisconnectedTopology { reached, total });
        }
        Ok(())
    }

    /// The link structure of a blueprint, neighbors in blueprint order.
    pub fn from_blueprint(blueprint: &Blueprint) -> Result<Self> {
        let mut graph = Graph::with_nodes(blueprint.len() as u32);
        for router in &blueprint.routers {
            for neigh in &router.neighbors {
                graph.add_edge(router.idx, neigh.peeridx)?;
            }
        }
        Ok(graph)
    }

    /// Relabel a GML graph to dense ids in order of first appearance.
    ///
    /// Duplicate nodes and parallel edges collapse; self-loops are dropped.
    pub fn from_gml(gml: &GmlGraph) -> Result<Self> {
        let mut ids: HashMap<i64, u32> = HashMap::new();
        let mut graph = Graph::default();
        for node in &gml.nodes {
            if !ids.contains_key(&node.id) {
                let dense = graph.add_node();
                ids.insert(node.id, dense);
            }
        }

        let lookup = |gml_id: i64| {
            ids.get(&gml_id)
                .copied()
                .ok_or_else(|| TopoError::Gml(format!("edge references unknown node {gml_id}")))
        };
        for edge in &gml.edges {
            let (u, v) = (lookup(edge.source)?, lookup(edge.target)?);
            if u == v {
                warn!("Dropping self-loop on GML node {}", edge.source);
                continue;
            }
            graph.add_edge(u, v)?;
        }
        Ok(graph)
    }

    /// `copies` disjoint copies of this graph, copy `i` offset by
    /// `i * n`, each later copy joined to the earlier ones by a single
    /// uniformly random edge.
    ///
    /// The join edge keeps the union connected; it is a heuristic and does
    /// not try to preserve diameter or cut structure.
    pub fn replicate<R: Rng>(&self, copies: u32, rng: &mut R) -> Result<Self> {
        let n = self.node_count();
        let total = n
            .checked_mul(copies)
            .ok_or_else(|| TopoError::InvalidTopologyId(format!("{n} nodes x {copies} copies")))?;
        let mut graph = Graph::with_nodes(total);
        for i in 0..copies {
            let offset = n * i;
            for u in self.nodes() {
                for &v in self.neighbors(u) {
                    graph.add_edge(u + offset, v + offset)?;
                }
            }
            if i == 0 || n == 0 {
                continue;
            }

            let u = rng.gen_range(offset + 1..=offset + n);
            let v = rng.gen_range(1..=offset);
            debug!("add_edge {u} -- {v}");
            graph.add_edge(u, v)?;
        }
        Ok(graph)
    }
}
