//! Generation orchestrator.
//!
//! This module coordinates a full generation run: building the blueprint,
//! recreating the topology's output directory, and writing the blueprint and
//! one daemon configuration per router.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::config::GeneratorConfig;
use crate::error::Result;
use crate::render::{config_file_name, render};
use crate::topology::{Blueprint, BlueprintGenerator, ImageKind, TopologyKind};

/// File name of the persisted blueprint inside a topology directory
pub const BLUEPRINT_FILE: &str = "blueprint.json";

/// `<output_root>/<image>/<topology dir name>`
pub fn topology_dir(output_root: &Path, image: ImageKind, kind: &TopologyKind) -> PathBuf {
    output_root.join(image.as_str()).join(kind.dir_name())
}

/// Generate a topology and write all of its artifacts, returning the output
/// directory.
///
/// The blueprint is built before anything is touched on disk, so a failed
/// generation leaves any previous output in place.
pub fn generate_topology(
    config: &GeneratorConfig,
    image: ImageKind,
    kind: &TopologyKind,
) -> Result<PathBuf> {
    let blueprint = BlueprintGenerator::new(config.clone()).generate(kind)?;
    let dir = topology_dir(&config.output_root, image, kind);
    write_topology(&dir, image, &blueprint)?;
    Ok(dir)
}

/// Replace `dir` with the blueprint and rendered configurations.
pub fn write_topology(dir: &Path, image: ImageKind, blueprint: &Blueprint) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;

    blueprint.save(&dir.join(BLUEPRINT_FILE))?;
    for router in &blueprint.routers {
        fs::write(dir.join(config_file_name(router.idx)), render(image, router))?;
    }
    info!(
        "Wrote {} and {} {} configurations to {}",
        BLUEPRINT_FILE,
        blueprint.len(),
        image,
        dir.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TopoError;
    use tempfile::tempdir;

    fn config_in(root: &Path) -> GeneratorConfig {
        GeneratorConfig {
            output_root: root.join("conf"),
            topozoo_dir: root.join("topozoo"),
            ..GeneratorConfig::default()
        }
    }

    #[test]
    fn test_generate_fattree_outputs() {
        let tmp = tempdir().unwrap();
        let config = config_in(tmp.path());
        let dir = generate_topology(&config, ImageKind::Frr, &TopologyKind::FatTree { k: 2 }).unwrap();

        assert_eq!(dir, tmp.path().join("conf/frr/fattree2"));
        let bp = Blueprint::load(&dir.join(BLUEPRINT_FILE)).unwrap();
        assert_eq!(bp.len(), 5);
        for idx in 1..=5 {
            assert!(dir.join(format!("node_{idx}.conf")).is_file());
        }
        assert!(!dir.join("node_6.conf").exists());
    }

    #[test]
    fn test_output_dir_is_recreated() {
        let tmp = tempdir().unwrap();
        let config = config_in(tmp.path());
        let kind = TopologyKind::FatTree { k: 2 };
        let dir = topology_dir(&config.output_root, ImageKind::Bird, &kind);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("stale.conf"), "old").unwrap();

        generate_topology(&config, ImageKind::Bird, &kind).unwrap();
        assert!(!dir.join("stale.conf").exists());
        assert!(dir.join("node_1.conf").is_file());
    }

    #[test]
    fn test_failed_generation_writes_nothing() {
        let tmp = tempdir().unwrap();
        let config = config_in(tmp.path());
        let kind = TopologyKind::TopoZoo { name: "Missing".into() };
        let err = generate_topology(&config, ImageKind::Crpd, &kind).unwrap_err();
        assert!(matches!(err, TopoError::TopologyNotFound(_)));
        assert!(!config.output_root.exists());
    }
}
