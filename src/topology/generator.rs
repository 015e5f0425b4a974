//! Blueprint generation dispatch over [`TopologyKind`].

use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::GeneratorConfig;
use crate::error::{Result, TopoError};
use crate::gml_parser::parse_gml_file;
use crate::topology::blueprint::{Blueprint, BlueprintBuilder};
use crate::topology::fattree::FatTree;
use crate::topology::graph::Graph;
use crate::topology::types::TopologyKind;

/// Builds blueprints for every supported topology family.
///
/// Generation is single-threaded and deterministic: the same kind, config
/// and seed always yield the same blueprint.
#[derive(Debug, Clone, Default)]
pub struct BlueprintGenerator {
    config: GeneratorConfig,
}

impl BlueprintGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn generate(&self, kind: &TopologyKind) -> Result<Blueprint> {
        match kind {
            TopologyKind::FatTree { k } => FatTree::new(*k)?.generate(&self.config),
            TopologyKind::TopoZoo { name } => {
                let graph = self.load_graph(name)?;
                self.address_graph(&graph)
            }
            TopologyKind::DupZoo { name, copies } => {
                let seed_graph = self.load_graph(name)?;
                let mut rng = StdRng::seed_from_u64(self.config.seed);
                let graph = seed_graph.replicate(*copies, &mut rng)?;
                self.address_graph(&graph)
            }
        }
    }

    fn load_graph(&self, name: &str) -> Result<Graph> {
        let path = self.config.gml_path(name);
        if !path.is_file() {
            return Err(TopoError::TopologyNotFound(path));
        }
        info!("Reading topology from {}", path.display());
        let gml = parse_gml_file(&path)?;
        Graph::from_gml(&gml)
    }

    /// Address an arbitrary connected graph. AS numbers are `base_as + idx`
    /// and every node originates `wan_prefixes_per_host` prefixes.
    ///
    /// Connectivity is checked before any pool is touched.
    pub fn address_graph(&self, graph: &Graph) -> Result<Blueprint> {
        graph.check_connected()?;

        let mut routerid_pool = self.config.router_id_pool.pool()?;
        let mut network_pool = self.config.network_pool.pool()?;
        let mut link_pool = self.config.graph_link_pool.pool()?;
        let base_as = self.config.base_as;

        let mut builder =
            BlueprintBuilder::new(graph.node_count(), &mut routerid_pool, |idx| base_as + idx)?;
        for x in graph.nodes() {
            builder.originate(x, self.config.wan_prefixes_per_host, &mut network_pool)?;
        }
        for (x, y) in graph.edges() {
            builder.link(x, y, &mut link_pool)?;
        }

        let blueprint = builder.build()?;
        info!(
            "Generated graph topology: {} routers, {} links",
            blueprint.len(),
            blueprint.link_count()
        );
        Ok(blueprint)
    }
}
