//! Blueprint data model: routers, their BGP identity and point-to-point links.
//!
//! A blueprint is produced once per topology and read back by every later
//! stage (partitioning, validation, config rendering, wiring). The JSON form
//! is the on-disk contract:
//!
//! ```json
//! {"routers": [{"idx": 1, "bgpid": "10.1.1.0", "bgp_as": 65000,
//!   "neighbors": [{"self_ip": "169.0.0.1", "selfip_prefixlen": 30,
//!                  "neighbor_ip": "169.0.0.2", "peerip_prefixlen": 30,
//!                  "remote_as": 65002, "peeridx": 2,
//!                  "ifname": "eth1to2", "peerifname": "eth2to1"}],
//!   "networks": ["11.1.1.0"]}]}
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::net::Ipv4Addr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TopoError};
use crate::ip::{link_local_peer, AddressPool};

/// Prefix length of every point-to-point link subnet
pub const LINK_PREFIX_LEN: u8 = 30;

/// One directed end of a point-to-point link, as seen from the local router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbor {
    pub self_ip: Ipv4Addr,
    pub selfip_prefixlen: u8,
    pub neighbor_ip: Ipv4Addr,
    pub peerip_prefixlen: u8,
    pub remote_as: u32,
    pub peeridx: u32,
    pub ifname: String,
    pub peerifname: String,
}

impl Neighbor {
    /// Local address in CIDR form, e.g. `169.0.0.1/30`.
    pub fn self_cidr(&self) -> String {
        format!("{}/{}", self.self_ip, self.selfip_prefixlen)
    }

    /// Remote address in CIDR form.
    pub fn peer_cidr(&self) -> String {
        format!("{}/{}", self.neighbor_ip, self.peerip_prefixlen)
    }

    /// The record the peer holds for the same link.
    fn mirrored(&self, local_idx: u32, local_as: u32) -> Neighbor {
        Neighbor {
            self_ip: self.neighbor_ip,
            selfip_prefixlen: self.peerip_prefixlen,
            neighbor_ip: self.self_ip,
            peerip_prefixlen: self.selfip_prefixlen,
            remote_as: local_as,
            peeridx: local_idx,
            ifname: self.peerifname.clone(),
            peerifname: self.ifname.clone(),
        }
    }
}

/// A BGP speaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Router {
    pub idx: u32,
    pub bgpid: Ipv4Addr,
    pub bgp_as: u32,
    pub neighbors: Vec<Neighbor>,
    /// Locally originated prefixes, serialized without their length
    pub networks: Vec<Ipv4Addr>,
}

/// Every router of one topology instance, ordered by `idx` (1-based, dense)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Blueprint {
    pub routers: Vec<Router>,
}

impl Blueprint {
    pub fn len(&self) -> usize {
        self.routers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routers.is_empty()
    }

    /// Router with the given 1-based index
    pub fn router(&self, idx: u32) -> Option<&Router> {
        let pos = usize::try_from(idx).ok()?.checked_sub(1)?;
        self.routers.get(pos).filter(|r| r.idx == idx)
    }

    pub fn link_count(&self) -> usize {
        self.routers.iter().map(|r| r.neighbors.len()).sum::<usize>() / 2
    }

    /// Undirected edges `(x, y)` with `x < y`, in router order.
    pub fn edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.routers.iter().flat_map(|r| {
            r.neighbors
                .iter()
                .filter(move |n| r.idx < n.peeridx)
                .map(move |n| (r.idx, n.peeridx))
        })
    }

    /// Check the structural invariants every blueprint must satisfy:
    /// dense `[1, N]` ids, peers that exist, and a symmetric neighbor
    /// relation with swapped addresses and interface names.
    pub fn validate(&self) -> Result<()> {
        for (pos, router) in self.routers.iter().enumerate() {
            if router.idx as usize != pos + 1 {
                return Err(TopoError::InvalidBlueprint(format!(
                    "router at position {} has idx {}, expected {}",
                    pos,
                    router.idx,
                    pos + 1
                )));
            }
        }

        for router in &self.routers {
            for neigh in &router.neighbors {
                let asymmetric = || TopoError::AsymmetricNeighbor {
                    router: router.idx,
                    peer: neigh.peeridx,
                };
                let peer = self.router(neigh.peeridx).ok_or_else(asymmetric)?;
                let expected = neigh.mirrored(router.idx, router.bgp_as);
                if neigh.remote_as != peer.bgp_as || !peer.neighbors.contains(&expected) {
                    return Err(asymmetric());
                }
            }
        }
        Ok(())
    }

    /// Read a blueprint from JSON and check its invariants.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let blueprint: Blueprint = serde_json::from_reader(BufReader::new(file))?;
        blueprint.validate()?;
        Ok(blueprint)
    }

    /// Write the blueprint as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

/// Incremental construction of a blueprint.
///
/// Routers are declared first (identity only), then links are added in the
/// generator's fixed order, each one consuming one /30 from the link pool.
#[derive(Debug)]
pub struct BlueprintBuilder {
    routers: Vec<Router>,
}

impl BlueprintBuilder {
    /// Declare `n` routers with ids `1..=n`, allocating router IDs from
    /// `routerid_pool` in id order.
    pub fn new(
        n: u32,
        routerid_pool: &mut AddressPool,
        mut asn_of: impl FnMut(u32) -> u32,
    ) -> Result<Self> {
        let routers = (1..=n)
            .map(|idx| {
                Ok(Router {
                    idx,
                    bgpid: routerid_pool.allocate()?,
                    bgp_as: asn_of(idx),
                    neighbors: Vec::new(),
                    networks: Vec::new(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { routers })
    }

    fn router_mut(&mut self, idx: u32) -> Result<&mut Router> {
        let pos = (idx as usize).wrapping_sub(1);
        self.routers
            .get_mut(pos)
            .ok_or_else(|| TopoError::InvalidBlueprint(format!("no router with idx {idx}")))
    }

    /// Originate `count` prefixes on router `idx`.
    pub fn originate(&mut self, idx: u32, count: usize, network_pool: &mut AddressPool) -> Result<()> {
        for _ in 0..count {
            let prefix = network_pool.allocate()?;
            self.router_mut(idx)?.networks.push(prefix);
        }
        Ok(())
    }

    /// Connect `x` and `y` with a fresh /30; `x` takes the first host.
    pub fn link(&mut self, x: u32, y: u32, link_pool: &mut AddressPool) -> Result<()> {
        if x == y {
            return Err(TopoError::InvalidBlueprint(format!("self-loop on router {x}")));
        }
        let xas = self.router_mut(x)?.bgp_as;
        let yas = self.router_mut(y)?.bgp_as;
        let xip = link_pool.allocate()?;
        let yip = link_local_peer(xip)?;
        log::debug!("link {x} ({xip}) <-> {y} ({yip})");

        let forward = Neighbor {
            self_ip: xip,
            selfip_prefixlen: LINK_PREFIX_LEN,
            neighbor_ip: yip,
            peerip_prefixlen: LINK_PREFIX_LEN,
            remote_as: yas,
            peeridx: y,
            ifname: interface_name(x, y),
            peerifname: interface_name(y, x),
        };
        let reverse = forward.mirrored(x, xas);
        self.router_mut(x)?.neighbors.push(forward);
        self.router_mut(y)?.neighbors.push(reverse);
        Ok(())
    }

    /// Finish construction, checking the blueprint invariants.
    pub fn build(self) -> Result<Blueprint> {
        let blueprint = Blueprint { routers: self.routers };
        blueprint.validate()?;
        Ok(blueprint)
    }
}

/// Interface on router `local` facing router `remote`.
pub fn interface_name(local: u32, remote: u32) -> String {
    format!("eth{local}to{remote}")
}
