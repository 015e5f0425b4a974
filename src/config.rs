//! Generator configuration.
//!
//! Every field has a default that reproduces the reference address plan, so
//! an empty YAML document (or no file at all) is a valid configuration:
//!
//! ```yaml
//! base_as: 65000
//! wan_prefixes_per_host: 10
//! fattree_link_pool: "169.0.0.1/30"
//! graph_link_pool: "169.254.1.1/30"
//! router_id_pool: "10.1.1.0/32"
//! network_pool: "11.1.1.0/24"
//! topozoo_dir: "config/topozoo"
//! output_root: "conf"
//! seed: 0
//! ```

use std::fmt;
use std::fs::File;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TopoError};
use crate::ip::AddressPool;

/// Base address and prefix length of an address pool, written `a.b.c.d/len`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PoolSpec {
    pub base: Ipv4Addr,
    pub prefix_len: u8,
}

impl PoolSpec {
    pub const fn new(base: Ipv4Addr, prefix_len: u8) -> Self {
        Self { base, prefix_len }
    }

    /// A fresh allocator positioned at the base address.
    pub fn pool(&self) -> Result<AddressPool> {
        AddressPool::new(self.base, self.prefix_len)
    }
}

impl TryFrom<String> for PoolSpec {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (base, len) = value
            .split_once('/')
            .ok_or_else(|| format!("pool '{value}' must be written as address/prefix"))?;
        let base = base
            .parse()
            .map_err(|_| format!("invalid pool address '{base}'"))?;
        let prefix_len: u8 = len
            .parse()
            .map_err(|_| format!("invalid prefix length '{len}'"))?;
        if prefix_len > 32 {
            return Err(format!("prefix length /{prefix_len} out of range"));
        }
        Ok(Self { base, prefix_len })
    }
}

impl From<PoolSpec> for String {
    fn from(spec: PoolSpec) -> Self {
        spec.to_string()
    }
}

impl fmt::Display for PoolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.prefix_len)
    }
}

/// Settings shared by every topology generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// AS number that per-node AS numbers are offset from
    pub base_as: u32,
    /// Prefixes originated by every node of an imported graph
    pub wan_prefixes_per_host: usize,
    /// /30 link subnets for fat-trees
    pub fattree_link_pool: PoolSpec,
    /// /30 link subnets for imported and replicated graphs
    pub graph_link_pool: PoolSpec,
    pub router_id_pool: PoolSpec,
    /// Originated prefixes
    pub network_pool: PoolSpec,
    /// Directory holding `<name>.gml` Topology Zoo files
    pub topozoo_dir: PathBuf,
    /// Root of the generated `<image>/<topology>/` directories
    pub output_root: PathBuf,
    /// Seed for the replication RNG
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_as: 65000,
            wan_prefixes_per_host: 10,
            fattree_link_pool: PoolSpec::new(Ipv4Addr::new(169, 0, 0, 1), 30),
            graph_link_pool: PoolSpec::new(Ipv4Addr::new(169, 254, 1, 1), 30),
            router_id_pool: PoolSpec::new(Ipv4Addr::new(10, 1, 1, 0), 32),
            network_pool: PoolSpec::new(Ipv4Addr::new(11, 1, 1, 0), 24),
            topozoo_dir: PathBuf::from("config/topozoo"),
            output_root: PathBuf::from("conf"),
            seed: 0,
        }
    }
}

impl GeneratorConfig {
    /// Reject plans the generators cannot use.
    pub fn validate(&self) -> Result<()> {
        for (name, spec) in [
            ("fattree_link_pool", &self.fattree_link_pool),
            ("graph_link_pool", &self.graph_link_pool),
        ] {
            if spec.prefix_len != 30 {
                return Err(TopoError::InvalidConfig(format!(
                    "{name} must use /30 link subnets, got {spec}"
                )));
            }
            if u32::from(spec.base) & 0b11 != 1 {
                return Err(TopoError::InvalidConfig(format!(
                    "{name} must start at the first host of a /30, got {spec}"
                )));
            }
        }
        Ok(())
    }

    /// Path of the GML file for a Topology Zoo graph.
    pub fn gml_path(&self, name: &str) -> PathBuf {
        self.topozoo_dir.join(format!("{name}.gml"))
    }
}

/// Load and validate a configuration from a YAML file
pub fn load_config(path: &Path) -> Result<GeneratorConfig> {
    info!("Loading configuration from: {:?}", path);
    let file = File::open(path)?;
    let config: GeneratorConfig = serde_yaml::from_reader(file)?;
    config.validate()?;
    Ok(config)
}
