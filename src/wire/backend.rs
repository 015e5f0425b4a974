//! Host network-namespace primitives used by the wirer.

use std::net::Ipv4Addr;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use super::{NamespaceHandle, WireError};

/// The namespace and interface operations needed to realize a link.
///
/// Implementations are shared by all wiring workers, so every method takes
/// `&self`.
pub trait NamespaceBackend: Send + Sync {
    /// Create a veth pair `a <-> b` in the host namespace.
    fn create_veth(&self, a: &str, b: &str) -> Result<(), WireError>;

    /// Delete an interface, in `ns` or in the host namespace. Deleting either
    /// end of a veth pair removes both ends.
    fn delete_link(&self, ns: Option<&NamespaceHandle>, ifname: &str) -> Result<(), WireError>;

    /// Move a host interface into `ns`.
    fn move_to_netns(&self, ifname: &str, ns: &NamespaceHandle) -> Result<(), WireError>;

    fn rename(&self, ns: &NamespaceHandle, from: &str, to: &str) -> Result<(), WireError>;

    fn link_up(&self, ns: &NamespaceHandle, ifname: &str) -> Result<(), WireError>;

    /// Assign `cidr` (e.g. `169.0.0.1/30`) to an interface.
    fn addr_add(&self, ns: &NamespaceHandle, ifname: &str, cidr: &str) -> Result<(), WireError>;

    /// Link-layer address of an interface, as `aa:bb:cc:dd:ee:ff`.
    fn read_lladdr(&self, ns: &NamespaceHandle, ifname: &str) -> Result<String, WireError>;

    /// Install or overwrite a permanent neighbor entry.
    fn neigh_replace(
        &self,
        ns: &NamespaceHandle,
        ip: Ipv4Addr,
        lladdr: &str,
        ifname: &str,
    ) -> Result<(), WireError>;
}

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs `ip` commands, each bounded by a timeout.
#[derive(Debug, Clone)]
pub struct IpCommandBackend {
    timeout: Duration,
    sudo: bool,
}

impl Default for IpCommandBackend {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            sudo: false,
        }
    }
}

impl IpCommandBackend {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Prefix every command with `sudo`.
    pub fn with_sudo(mut self, sudo: bool) -> Self {
        self.sudo = sudo;
        self
    }

    /// Full argument vector for `ip <args>`, optionally inside `ns`.
    pub fn ip_argv(&self, ns: Option<&NamespaceHandle>, args: &[&str]) -> Vec<String> {
        let mut argv = Vec::with_capacity(args.len() + 4);
        if self.sudo {
            argv.push("sudo".to_string());
        }
        argv.push("ip".to_string());
        if let Some(ns) = ns {
            argv.push("-n".to_string());
            argv.push(ns.name().to_string());
        }
        argv.extend(args.iter().map(|a| a.to_string()));
        argv
    }

    /// Argument vector for running a plain command inside `ns`.
    pub fn exec_argv(&self, ns: &NamespaceHandle, args: &[&str]) -> Vec<String> {
        let mut argv = self.ip_argv(None, &["netns", "exec", ns.name()]);
        argv.extend(args.iter().map(|a| a.to_string()));
        argv
    }

    /// Run a command, returning stdout on success or the classified failure.
    fn run(&self, argv: &[String], ns: Option<&NamespaceHandle>) -> Result<String, WireError> {
        let command = argv.join(" ");
        let (program, args) = argv.split_first().ok_or_else(|| WireError::CommandFailed {
            command: command.clone(),
            stderr: "empty command".to_string(),
        })?;
        debug!("{command}");

        let spawn_err = |source| WireError::Spawn {
            command: command.clone(),
            source,
        };
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait().map_err(spawn_err)? {
                Some(_) => break,
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(WireError::Timeout {
                        command: command.clone(),
                        after: self.timeout,
                    });
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        }

        let output = child.wait_with_output().map_err(spawn_err)?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(classify_failure(command, stderr, ns, args))
    }
}

/// Map well-known `ip` error messages onto specific variants.
fn classify_failure(
    command: String,
    stderr: String,
    ns: Option<&NamespaceHandle>,
    args: &[String],
) -> WireError {
    let namespace = ns.map(|n| n.name().to_string()).unwrap_or_default();
    let dev = args
        .iter()
        .position(|a| a == "dev")
        .and_then(|i| args.get(i + 1))
        .cloned()
        .unwrap_or_default();

    if stderr.contains("Cannot open network namespace") {
        WireError::NamespaceNotFound(namespace)
    } else if stderr.contains("Cannot find device") || stderr.contains("does not exist") {
        WireError::NoSuchInterface {
            namespace,
            ifname: dev,
        }
    } else if stderr.contains("Address already assigned") {
        let address = args
            .iter()
            .position(|a| a == "add")
            .and_then(|i| args.get(i + 1))
            .cloned()
            .unwrap_or_default();
        WireError::AddressInUse { address, ifname: dev }
    } else if stderr.contains("File exists") {
        WireError::InterfaceExists(dev)
    } else {
        WireError::CommandFailed { command, stderr }
    }
}

impl NamespaceBackend for IpCommandBackend {
    fn create_veth(&self, a: &str, b: &str) -> Result<(), WireError> {
        let argv = self.ip_argv(None, &["link", "add", a, "type", "veth", "peer", "name", b]);
        self.run(&argv, None).map_err(|err| match err {
            WireError::InterfaceExists(_) => WireError::InterfaceExists(a.to_string()),
            other => other,
        })?;
        Ok(())
    }

    fn delete_link(&self, ns: Option<&NamespaceHandle>, ifname: &str) -> Result<(), WireError> {
        let argv = self.ip_argv(ns, &["link", "del", "dev", ifname]);
        self.run(&argv, ns)?;
        Ok(())
    }

    fn move_to_netns(&self, ifname: &str, ns: &NamespaceHandle) -> Result<(), WireError> {
        let argv = self.ip_argv(None, &["link", "set", "dev", ifname, "netns", ns.name()]);
        self.run(&argv, Some(ns))?;
        Ok(())
    }

    fn rename(&self, ns: &NamespaceHandle, from: &str, to: &str) -> Result<(), WireError> {
        let argv = self.ip_argv(Some(ns), &["link", "set", "dev", from, "name", to]);
        self.run(&argv, Some(ns)).map_err(|err| match err {
            WireError::InterfaceExists(_) => WireError::InterfaceExists(to.to_string()),
            other => other,
        })?;
        Ok(())
    }

    fn link_up(&self, ns: &NamespaceHandle, ifname: &str) -> Result<(), WireError> {
        let argv = self.ip_argv(Some(ns), &["link", "set", "dev", ifname, "up"]);
        self.run(&argv, Some(ns))?;
        Ok(())
    }

    fn addr_add(&self, ns: &NamespaceHandle, ifname: &str, cidr: &str) -> Result<(), WireError> {
        let argv = self.ip_argv(Some(ns), &["addr", "add", cidr, "dev", ifname]);
        self.run(&argv, Some(ns))?;
        Ok(())
    }

    fn read_lladdr(&self, ns: &NamespaceHandle, ifname: &str) -> Result<String, WireError> {
        let path = format!("/sys/class/net/{ifname}/address");
        let argv = self.exec_argv(ns, &["cat", &path]);
        let out = self.run(&argv, Some(ns)).map_err(|err| match err {
            WireError::CommandFailed { .. } => WireError::NoSuchInterface {
                namespace: ns.name().to_string(),
                ifname: ifname.to_string(),
            },
            other => other,
        })?;
        Ok(out.trim().to_string())
    }

    fn neigh_replace(
        &self,
        ns: &NamespaceHandle,
        ip: Ipv4Addr,
        lladdr: &str,
        ifname: &str,
    ) -> Result<(), WireError> {
        let ip = ip.to_string();
        let argv = self.ip_argv(
            Some(ns),
            &["neigh", "replace", &ip, "lladdr", lladdr, "nud", "permanent", "dev", ifname],
        );
        self.run(&argv, Some(ns))?;
        Ok(())
    }
}
