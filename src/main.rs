use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;
use env_logger::Env;
use log::info;

use fabricgen::config::{load_config, GeneratorConfig};
use fabricgen::orchestrator::{self, BLUEPRINT_FILE};
use fabricgen::partition::{
    self, range, validate, Partitioner, SeparatorPartitioner, PARTITION_FILE,
};
use fabricgen::topology::{Blueprint, Graph, ImageKind, TopologyKind};
use fabricgen::wire::namespaces::DEFAULT_CONTAINER_ROOT;
use fabricgen::wire::{
    ContainerNamespaces, IpCommandBackend, NamespaceBackend, NamespaceHandle, NetworkWirer,
    SimulatedBackend, WireReport,
};

/// Topology generation, partitioning and wiring for emulated BGP fabrics
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Generator configuration YAML file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a blueprint and router configurations
    Generate {
        /// frr, bird or crpd
        image: String,
        /// fattree, topozoo or dupzoo
        kind: String,
        /// k for fattree, <name> for topozoo, <name>:<copies> for dupzoo
        id: String,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        topozoo_dir: Option<PathBuf>,
        #[arg(long)]
        output_root: Option<PathBuf>,
    },
    /// Write a contiguous-range partition of a fat-tree
    Partition {
        k: u32,
        parts: u32,
        /// Directory receiving partition.json
        path: PathBuf,
    },
    /// Partition a generated topology with the vertex-separator strategy
    PartitionGraph {
        parts: u32,
        /// Directory holding blueprint.json
        path: PathBuf,
    },
    /// Validate the partition of a generated topology
    Check {
        image: String,
        /// Topology directory name, e.g. fattree4
        topo: String,
        #[arg(long)]
        output_root: Option<PathBuf>,
    },
    /// Create the veth links and static neighbors of a blueprint
    Wire {
        blueprint: PathBuf,
        /// Container runtime state directory
        #[arg(long, default_value = DEFAULT_CONTAINER_ROOT)]
        containers: PathBuf,
        /// Worker threads (defaults to available parallelism)
        #[arg(long)]
        threads: Option<usize>,
        /// Timeout for each ip command, in seconds
        #[arg(long, default_value_t = 10)]
        timeout: u64,
        /// Prefix ip commands with sudo
        #[arg(long)]
        sudo: bool,
        /// Wire against in-memory namespaces instead of the host
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(args.log_level.as_str())).init();

    let mut config = match &args.config {
        Some(path) => load_config(path)
            .wrap_err_with(|| format!("Failed to load configuration '{}'", path.display()))?,
        None => GeneratorConfig::default(),
    };

    match args.command {
        Command::Generate {
            image,
            kind,
            id,
            seed,
            topozoo_dir,
            output_root,
        } => {
            if let Some(seed) = seed {
                config.seed = seed;
            }
            if let Some(dir) = topozoo_dir {
                config.topozoo_dir = dir;
            }
            if let Some(dir) = output_root {
                config.output_root = dir;
            }
            let image: ImageKind = image.parse()?;
            let kind = TopologyKind::parse(&kind, &id)?;
            let dir = orchestrator::generate_topology(&config, image, &kind)
                .wrap_err_with(|| format!("Failed to generate {}", kind.dir_name()))?;
            println!("{}", dir.display());
        }
        Command::Partition { k, parts, path } => {
            let result = range::fattree_partition(k, parts)?;
            partition::save_partition(&path, &result)
                .wrap_err_with(|| format!("Failed to write partition to '{}'", path.display()))?;
        }
        Command::PartitionGraph { parts, path } => {
            let blueprint = load_blueprint(&path.join(BLUEPRINT_FILE))?;
            let graph = Graph::from_blueprint(&blueprint)?;
            let result = SeparatorPartitioner::default().partition(&graph, parts)?;
            info!("Partition sizes: {:?}", result.sizes());
            partition::save_partition(&path, &result)
                .wrap_err_with(|| format!("Failed to write partition to '{}'", path.display()))?;
        }
        Command::Check {
            image,
            topo,
            output_root,
        } => {
            let root = output_root.unwrap_or(config.output_root);
            let image: ImageKind = image.parse()?;
            check(&root.join(image.as_str()).join(topo))?;
        }
        Command::Wire {
            blueprint,
            containers,
            threads,
            timeout,
            sudo,
            dry_run,
        } => {
            let mut pool = rayon::ThreadPoolBuilder::new();
            if let Some(n) = threads {
                pool = pool.num_threads(n);
            }
            pool.build_global()
                .wrap_err("Failed to configure the wiring thread pool")?;

            let blueprint = load_blueprint(&blueprint)?;
            let report = if dry_run {
                let namespaces: HashMap<u32, NamespaceHandle> = blueprint
                    .routers
                    .iter()
                    .map(|r| (r.idx, NamespaceHandle::new(format!("sim{}", r.idx))))
                    .collect();
                let backend = SimulatedBackend::with_namespaces(namespaces.values());
                wire(&backend, &namespaces, &blueprint)
            } else {
                let namespaces = ContainerNamespaces::new(
                    containers,
                    fabricgen::wire::namespaces::DEFAULT_NETNS_DIR,
                )
                .resolve_all(blueprint.routers.iter().map(|r| r.idx));
                let backend = IpCommandBackend::new(Duration::from_secs(timeout)).with_sudo(sudo);
                wire(&backend, &namespaces, &blueprint)
            };

            println!("{}", report.summary());
            if !report.is_success() {
                for failure in report.failures() {
                    if let Err(err) = &failure.outcome {
                        eprintln!("{}: {}", failure.operation, err);
                    }
                }
                bail!("wiring finished with {} failures", report.failures().count());
            }
        }
    }
    Ok(())
}

fn load_blueprint(path: &Path) -> Result<Blueprint> {
    Blueprint::load(path).wrap_err_with(|| format!("Failed to load blueprint '{}'", path.display()))
}

fn wire<B: NamespaceBackend>(
    backend: &B,
    namespaces: &HashMap<u32, NamespaceHandle>,
    blueprint: &Blueprint,
) -> WireReport {
    info!(
        "Wiring {} routers and {} links ({} namespaces resolved)",
        blueprint.len(),
        blueprint.link_count(),
        namespaces.len()
    );
    NetworkWirer::new(backend, namespaces).wire(blueprint)
}

/// Run both partition checks on a topology directory, printing each verdict.
fn check(dir: &Path) -> Result<()> {
    let blueprint = load_blueprint(&dir.join(BLUEPRINT_FILE))?;
    let partition_path = dir.join(PARTITION_FILE);
    let partition = partition::load_partition(&partition_path)
        .wrap_err_with(|| format!("Failed to load partition '{}'", partition_path.display()))?;

    let mut ok = true;
    let report = validate::coverage_report(&partition, blueprint.len());
    if report.is_ok() {
        println!("check_unique OK");
    } else {
        ok = false;
        println!("check_unique FAILED: {report}");
    }

    match partition::check_cut(&blueprint, &partition) {
        Ok(()) => println!("check_cut OK"),
        Err(err) => {
            ok = false;
            println!("check_cut FAILED: {err}");
        }
    }

    if !ok {
        bail!("partition of '{}' is invalid", dir.display());
    }
    Ok(())
}
