//! Contiguous-range partitioning for fat-trees.
//!
//! The ToR and Leaf routers of a fat-tree occupy ids `1..=k*k` and the
//! Spines follow, so balanced contiguous chunks of the core keep every pod
//! mostly together and the Spines form the overflow part.

use log::debug;

use super::{Partition, Partitioner};
use crate::error::{Result, TopoError};
use crate::topology::{FatTree, Graph};

/// Split `1..=core` into `parts` balanced contiguous chunks and append
/// `core+1..=total` as the overflow part.
///
/// Chunks are `core / parts` long and the first `core % parts` get one extra
/// node. With `parts > core` the trailing chunks are empty.
pub fn partition(core: u32, total: u32, parts: u32) -> Result<Partition> {
    if parts == 0 {
        return Err(TopoError::InvalidPartCount(parts));
    }
    let size = core / parts;
    let remainder = core % parts;

    let mut chunks = Vec::with_capacity(parts as usize);
    let mut start = 1;
    for i in 0..parts {
        let len = size + u32::from(i < remainder);
        chunks.push((start..start + len).collect::<Vec<_>>());
        start += len;
    }
    let overflow = (core + 1..=total).collect::<Vec<_>>();
    debug!("range partition sizes {:?} + overflow {}", chunks.iter().map(Vec::len).collect::<Vec<_>>(), overflow.len());
    Ok(Partition::from_nodes(chunks, overflow))
}

/// Contiguous-range partition of a k-ary fat-tree: the core is ToR and Leaf,
/// the Spines overflow.
pub fn fattree_partition(k: u32, parts: u32) -> Result<Partition> {
    let tree = FatTree::new(k)?;
    partition(tree.core_count(), tree.node_count(), parts)
}

/// [`Partitioner`] over a graph whose first `core` ids are the core.
#[derive(Debug, Clone, Copy)]
pub struct RangePartitioner {
    core: u32,
}

impl RangePartitioner {
    pub fn new(core: u32) -> Self {
        Self { core }
    }

    pub fn for_fattree(tree: &FatTree) -> Self {
        Self::new(tree.core_count())
    }
}

impl Partitioner for RangePartitioner {
    fn partition(&self, graph: &Graph, parts: u32) -> Result<Partition> {
        let total = graph.node_count();
        partition(self.core.min(total), total, parts)
    }
}
