//! Network topology module.
//!
//! This module contains the blueprint data model and the generators that
//! produce blueprints for fat-trees and imported or replicated graphs.

pub mod blueprint;
pub mod fattree;
pub mod generator;
pub mod graph;
pub mod types;

// Re-export key types for easier access
pub use blueprint::{interface_name, Blueprint, BlueprintBuilder, Neighbor, Router};
pub use fattree::FatTree;
pub use generator::BlueprintGenerator;
pub use graph::Graph;
pub use types::{ImageKind, TopologyKind};
