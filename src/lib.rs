//! # Fabricgen - Topology generation and wiring for emulated BGP fabrics
//!
//! This library generates synthetic router topologies, splits them into
//! parts for distributed emulation, and wires the resulting routers
//! together with veth links inside their network namespaces.
//!
//! ## Overview
//!
//! A run produces a [`topology::Blueprint`]: every router's index, BGP AS,
//! router id, originated prefixes and point-to-point neighbors. The
//! blueprint drives everything downstream. Daemon configurations are
//! rendered from it, partitions are validated against its links, and the
//! wirer realizes its links on the host.
//!
//! ## Key Features
//!
//! - **Fat-trees**: ToR, Leaf and Spine tiers for any even `k`
//! - **Graph import**: Topology Zoo GML files, optionally replicated into
//!   several randomly joined copies
//! - **Address planning**: /30 link subnets, router ids and originated /24s
//!   from configurable pools
//! - **Partitioning**: contiguous ranges for fat-trees, a betweenness-based
//!   vertex separator for arbitrary graphs
//! - **Validation**: node coverage and cut-edge checks for partition files
//! - **Wiring**: parallel two-phase veth creation and static neighbor
//!   installation, with an in-memory backend for dry runs
//!
//! ## Architecture
//!
//! - `config`: Generator configuration and YAML loading
//! - `error`: Library error type
//! - `gml_parser`: GML graph parser for Topology Zoo files
//! - `ip`: Address pools
//! - `topology`: Blueprints, graphs and the topology generators
//! - `render`: FRR, BIRD and cRPD configuration rendering
//! - `partition`: Partition files, strategies and validation
//! - `wire`: Namespace backends and the link wirer
//! - `orchestrator`: End-to-end generation into an output directory
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use fabricgen::config::GeneratorConfig;
//! use fabricgen::orchestrator;
//! use fabricgen::partition::{self, RangePartitioner, Partitioner};
//! use fabricgen::topology::{FatTree, Graph, ImageKind, TopologyKind};
//!
//! let config = GeneratorConfig::default();
//! let kind = TopologyKind::FatTree { k: 4 };
//!
//! // Writes conf/frr/fattree4/{blueprint.json,node_<idx>.conf}
//! let dir = orchestrator::generate_topology(&config, ImageKind::Frr, &kind)?;
//!
//! let blueprint = fabricgen::topology::Blueprint::load(&dir.join(orchestrator::BLUEPRINT_FILE))?;
//! let graph = Graph::from_blueprint(&blueprint)?;
//! let parts = RangePartitioner::for_fattree(&FatTree::new(4)?).partition(&graph, 2)?;
//! partition::check_cut(&blueprint, &parts)?;
//! partition::save_partition(&dir, &parts)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Error Handling
//!
//! Library functions return [`Result`] with [`TopoError`]. Wiring failures
//! are [`wire::WireError`] values collected per link instead of aborting
//! the run. The binary wraps both with `color_eyre`.

pub mod config;
pub mod error;
pub mod gml_parser;
pub mod ip;
pub mod orchestrator;
pub mod partition;
pub mod render;
pub mod topology;
pub mod wire;

pub use error::{Result, TopoError};
