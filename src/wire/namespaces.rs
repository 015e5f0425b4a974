//! Resolving routers to the network namespaces of their containers.
//!
//! Each router runs in container `emu-real-<idx>`; the runtime records the
//! container's init pid in `<root>/emu-real-<idx>/config.json`. The pid's
//! network namespace is published under `/var/run/netns/<pid>` so that
//! `ip -n <pid>` can reach it.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Deserialize;

use super::{NamespaceHandle, WireError};

pub const DEFAULT_CONTAINER_ROOT: &str = "/opt/lwc/containers";
pub const DEFAULT_NETNS_DIR: &str = "/var/run/netns";

#[derive(Debug, Deserialize)]
struct ContainerState {
    pid: u32,
}

/// Container-runtime lookup of per-router namespace handles
#[derive(Debug, Clone)]
pub struct ContainerNamespaces {
    container_root: PathBuf,
    netns_dir: PathBuf,
}

impl Default for ContainerNamespaces {
    fn default() -> Self {
        Self::new(DEFAULT_CONTAINER_ROOT, DEFAULT_NETNS_DIR)
    }
}

impl ContainerNamespaces {
    pub fn new(container_root: impl Into<PathBuf>, netns_dir: impl Into<PathBuf>) -> Self {
        Self {
            container_root: container_root.into(),
            netns_dir: netns_dir.into(),
        }
    }

    pub fn container_name(idx: u32) -> String {
        format!("emu-real-{idx}")
    }

    fn state_path(&self, idx: u32) -> PathBuf {
        self.container_root
            .join(Self::container_name(idx))
            .join("config.json")
    }

    /// Init pid of the router's container
    pub fn pid_of(&self, idx: u32) -> Result<u32, WireError> {
        let missing = |reason: String| WireError::MissingNamespace { router: idx, reason };
        let path = self.state_path(idx);
        let text = fs::read_to_string(&path)
            .map_err(|e| missing(format!("{}: {e}", path.display())))?;
        let state: ContainerState = serde_json::from_str(&text)
            .map_err(|e| missing(format!("{}: {e}", path.display())))?;
        Ok(state.pid)
    }

    /// Publish the pid's namespace under the netns directory and return its
    /// handle. An existing entry is replaced.
    pub fn resolve(&self, idx: u32) -> Result<NamespaceHandle, WireError> {
        let pid = self.pid_of(idx)?;
        let link = self.netns_dir.join(pid.to_string());
        let target = Path::new("/proc").join(pid.to_string()).join("ns/net");
        publish_link(&target, &link).map_err(|e| WireError::MissingNamespace {
            router: idx,
            reason: format!("linking {} to {}: {e}", link.display(), target.display()),
        })?;
        debug!("router {idx} -> netns {pid}");
        Ok(NamespaceHandle::new(pid.to_string()))
    }

    /// Resolve every router; failures are logged and left out of the map,
    /// so the wirer reports them per link.
    pub fn resolve_all(&self, ids: impl IntoIterator<Item = u32>) -> HashMap<u32, NamespaceHandle> {
        let mut handles = HashMap::new();
        for idx in ids {
            match self.resolve(idx) {
                Ok(handle) => {
                    handles.insert(idx, handle);
                }
                Err(err) => warn!("{err}"),
            }
        }
        handles
    }
}

fn publish_link(target: &Path, link: &Path) -> io::Result<()> {
    if let Some(dir) = link.parent() {
        fs::create_dir_all(dir)?;
    }
    match fs::remove_file(link) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    symlink(target, link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_state(root: &Path, idx: u32, body: &str) {
        let dir = root.join(ContainerNamespaces::container_name(idx));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.json"), body).unwrap();
    }

    #[test]
    fn test_resolve_links_proc_namespace() {
        let root = tempdir().unwrap();
        let netns = tempdir().unwrap();
        write_state(root.path(), 3, r#"{"id": "emu-real-3", "pid": 4242, "status": "running"}"#);

        let namespaces = ContainerNamespaces::new(root.path(), netns.path());
        let handle = namespaces.resolve(3).unwrap();
        assert_eq!(handle.name(), "4242");
        assert_eq!(
            fs::read_link(netns.path().join("4242")).unwrap(),
            PathBuf::from("/proc/4242/ns/net")
        );

        // Resolving again replaces the link.
        assert!(namespaces.resolve(3).is_ok());
    }

    #[test]
    fn test_missing_or_malformed_state() {
        let root = tempdir().unwrap();
        let netns = tempdir().unwrap();
        write_state(root.path(), 2, r#"{"status": "stopped"}"#);
        let namespaces = ContainerNamespaces::new(root.path(), netns.path());

        assert!(matches!(namespaces.pid_of(1), Err(WireError::MissingNamespace { router: 1, .. })));
        assert!(matches!(namespaces.pid_of(2), Err(WireError::MissingNamespace { router: 2, .. })));

        write_state(root.path(), 1, r#"{"pid": 77}"#);
        let handles = namespaces.resolve_all([1, 2]);
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[&1].name(), "77");
    }
}
