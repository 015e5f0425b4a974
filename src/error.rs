//! Error types shared by topology generation, partitioning and validation.
//!
//! Wiring failures are collected per edge instead of propagated, so they
//! live in [`crate::wire::WireError`].

use std::net::Ipv4Addr;
use std::path::PathBuf;

use crate::partition::validate::CoverageReport;

/// Errors raised while generating, partitioning or validating a topology
#[derive(Debug, thiserror::Error)]
pub enum TopoError {
    #[error("address space exhausted (pool {base}/{prefix_len})")]
    AddressSpaceExhausted { base: Ipv4Addr, prefix_len: u8 },

    #[error("invalid link-local address {0}: not the first or second host of a /30")]
    InvalidLinkAddress(Ipv4Addr),

    #[error("invalid prefix length /{0}")]
    InvalidPrefixLength(u8),

    #[error("unsupported topology kind: {0}")]
    UnsupportedTopology(String),

    #[error("unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("topology not found: {}", .0.display())]
    TopologyNotFound(PathBuf),

    #[error("invalid topology id '{0}'")]
    InvalidTopologyId(String),

    #[error("topology is disconnected: reached {reached} of {total} nodes from node 1")]
    DisconnectedTopology { reached: usize, total: usize },

    #[error("invalid blueprint: {0}")]
    InvalidBlueprint(String),

    #[error("neighbor relation is not symmetric: router {router} lists {peer} without a matching entry")]
    AsymmetricNeighbor { router: u32, peer: u32 },

    #[error("GML parse error: {0}")]
    Gml(String),

    #[error("invalid partition cut: {}", format_edges(.edges))]
    InvalidPartitionCut { edges: Vec<(u32, u32)> },

    #[error("partition does not cover the node set: {0}")]
    PartitionCoverage(CoverageReport),

    #[error("invalid partition file: {0}")]
    InvalidPartitionFile(String),

    #[error("partition count must be at least 1, got {0}")]
    InvalidPartCount(u32),

    #[error("no vertex separator splits the graph into more than one component")]
    NoSeparator,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn format_edges(edges: &[(u32, u32)]) -> String {
    edges
        .iter()
        .map(|(u, v)| format!("{u} => {v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T, E = TopoError> = std::result::Result<T, E>;
