//! k-ary fat-tree (Clos) generator.
//!
//! Node ids are tier-ordered: each pod holds `k/2` ToRs then `k/2` Leafs
//! (ids `pod*k + 1 ..= pod*k + k`), and the `k*k/4` Spines follow all pods.
//! Spine group `l` (`k/2` spines) serves Leaf `l` of every pod.

use log::info;

use crate::config::GeneratorConfig;
use crate::error::{Result, TopoError};
use crate::topology::blueprint::{Blueprint, BlueprintBuilder};

/// Tier of a fat-tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Tor,
    Leaf,
    Spine,
}

/// Closed-form index arithmetic for a k-ary fat-tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatTree {
    k: u32,
}

impl FatTree {
    /// `k` must be positive, even, and small enough that all `5k²/4` ids
    /// fit in a `u32`.
    pub fn new(k: u32) -> Result<Self> {
        let fits = k
            .checked_mul(k)
            .and_then(|square| (square / 4).checked_mul(5))
            .is_some();
        if k == 0 || k % 2 != 0 || !fits {
            return Err(TopoError::InvalidTopologyId(k.to_string()));
        }
        Ok(Self { k })
    }

    pub fn k(&self) -> u32 {
        self.k
    }

    fn half(&self) -> u32 {
        self.k / 2
    }

    /// Total routers, `5k²/4`
    pub fn node_count(&self) -> u32 {
        self.k * self.k / 4 * 5
    }

    /// ToR and Leaf routers, `k²`; they occupy ids `1..=k²`
    pub fn core_count(&self) -> u32 {
        self.k * self.k
    }

    pub fn tor_id(&self, pod: u32, tor: u32) -> u32 {
        pod * self.k + tor + 1
    }

    pub fn leaf_id(&self, pod: u32, leaf: u32) -> u32 {
        pod * self.k + self.half() + leaf + 1
    }

    /// Spine `spine` of the group attached to Leaf position `leaf`
    pub fn spine_id(&self, leaf: u32, spine: u32) -> u32 {
        self.core_count() + leaf * self.half() + spine + 1
    }

    pub fn tier(&self, idx: u32) -> Option<Tier> {
        if idx == 0 || idx > self.node_count() {
            return None;
        }
        if idx > self.core_count() {
            return Some(Tier::Spine);
        }
        if (idx - 1) % self.k < self.half() {
            Some(Tier::Tor)
        } else {
            Some(Tier::Leaf)
        }
    }

    /// AS number offset from the base AS: one per ToR, one per pod for the
    /// Leafs, one shared by all Spines.
    pub fn as_offset(&self, idx: u32) -> u32 {
        let pod = idx.saturating_sub(1) / self.k;
        match self.tier(idx) {
            Some(Tier::Tor) => pod * self.half() + (idx - 1) % self.k,
            Some(Tier::Leaf) => self.k * self.half() + pod,
            Some(Tier::Spine) | None => self.k * self.half() + self.k,
        }
    }

    /// Build the blueprint: router ids in node order, `k/2` prefixes per
    /// ToR, then per pod all ToR-Leaf links followed by all Leaf-Spine links.
    pub fn generate(&self, config: &GeneratorConfig) -> Result<Blueprint> {
        let half = self.half();
        let mut routerid_pool = config.router_id_pool.pool()?;
        let mut network_pool = config.network_pool.pool()?;
        let mut link_pool = config.fattree_link_pool.pool()?;

        let mut builder = BlueprintBuilder::new(self.node_count(), &mut routerid_pool, |idx| {
            config.base_as + self.as_offset(idx)
        })?;

        for pod in 0..self.k {
            for tor in 0..half {
                builder.originate(self.tor_id(pod, tor), half as usize, &mut network_pool)?;
            }
        }

        for pod in 0..self.k {
            for tor in 0..half {
                for leaf in 0..half {
                    builder.link(self.tor_id(pod, tor), self.leaf_id(pod, leaf), &mut link_pool)?;
                }
            }
            for leaf in 0..half {
                for spine in 0..half {
                    builder.link(self.leaf_id(pod, leaf), self.spine_id(leaf, spine), &mut link_pool)?;
                }
            }
        }

        let blueprint = builder.build()?;
        info!(
            "Generated fat-tree k={}: {} routers, {} links",
            self.k,
            blueprint.len(),
            blueprint.link_count()
        );
        Ok(blueprint)
    }
}
