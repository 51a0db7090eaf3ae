//! Starting and stopping store nodes against a data directory.

use crate::node::{NodeLaunch, NodeProcess, free_port};
use crate::{BinaryResolver, Error, Result};
use skipgate_client::ShellClient;
use skipgate_types::{BinaryVersion, Endpoint};
use std::collections::HashMap;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Per-attempt start options.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    /// Keep existing files in the data directory. When false the directory
    /// is wiped before the node starts.
    pub no_clean_data: bool,

    /// Extra command-line arguments for this attempt only.
    pub extra_args: Vec<String>,
}

impl StartOptions {
    /// Options that preserve the data directory.
    pub fn preserve_data() -> Self {
        Self {
            no_clean_data: true,
            ..Default::default()
        }
    }
}

/// Result of a start attempt.
///
/// `endpoint == None` means the node refused to come up. A handle with an
/// endpoint must be passed back to [`NodeLifecycleController::stop`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a live handle must be stopped"]
pub struct ProcessHandle {
    pub id: u64,
    pub bound_version: BinaryVersion,
    pub endpoint: Option<Endpoint>,
}

impl ProcessHandle {
    pub fn rejected(id: u64, bound_version: BinaryVersion) -> Self {
        Self {
            id,
            bound_version,
            endpoint: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.endpoint.is_some()
    }
}

/// Starts and stops store processes bound to a binary version and data directory.
#[allow(async_fn_in_trait)]
pub trait NodeLifecycleController {
    /// Starts a node. A node that exits or never becomes reachable yields a
    /// handle without endpoint; `Err` means the attempt could not be made.
    async fn start(
        &mut self,
        version: BinaryVersion,
        data_dir: &Path,
        options: &StartOptions,
    ) -> Result<ProcessHandle>;

    /// Stops a node started by this controller. Stopping a rejected handle is a no-op.
    async fn stop(&mut self, handle: ProcessHandle) -> Result<()>;
}

/// Timeouts and launch settings for [`ProcessNodeController`].
#[derive(Debug, Clone)]
pub struct NodeOptions {
    pub bind_ip: IpAddr,
    pub startup_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub poll_interval: Duration,
    /// Arguments appended to every launch.
    pub extra_args: Vec<String>,
    /// Directory for per-node log files; logs are discarded when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            startup_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(200),
            extra_args: Vec::new(),
            log_dir: None,
        }
    }
}

/// [`NodeLifecycleController`] that launches real store binaries.
pub struct ProcessNodeController {
    resolver: BinaryResolver,
    options: NodeOptions,
    shell: ShellClient,
    nodes: HashMap<u64, NodeProcess>,
    next_id: u64,
}

impl ProcessNodeController {
    pub fn new(resolver: BinaryResolver, options: NodeOptions, shell: ShellClient) -> Self {
        Self {
            resolver,
            options,
            shell,
            nodes: HashMap::new(),
            next_id: 0,
        }
    }

    /// Number of nodes currently tracked as live.
    pub fn running_count(&self) -> usize {
        self.nodes.len()
    }

    /// Stops every node still tracked. Used on teardown paths.
    pub async fn stop_all(&mut self) {
        for (id, mut node) in self.nodes.drain() {
            if let Err(e) = node
                .stop(&self.shell, self.options.shutdown_timeout)
                .await
            {
                warn!(node = id, error = %e, "failed to stop node");
            }
        }
    }

    fn log_file(&self, id: u64, version: BinaryVersion) -> Result<Option<PathBuf>> {
        match &self.options.log_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                Ok(Some(dir.join(format!("node-{id}-{version}.log"))))
            }
            None => Ok(None),
        }
    }
}

impl NodeLifecycleController for ProcessNodeController {
    async fn start(
        &mut self,
        version: BinaryVersion,
        data_dir: &Path,
        options: &StartOptions,
    ) -> Result<ProcessHandle> {
        let binary = self.resolver.resolve(version)?;

        if !options.no_clean_data && data_dir.exists() {
            fs::remove_dir_all(data_dir)?;
        }
        fs::create_dir_all(data_dir)?;

        let id = self.next_id;
        self.next_id += 1;

        let mut extra_args = self.options.extra_args.clone();
        extra_args.extend(options.extra_args.iter().cloned());

        let launch = NodeLaunch {
            id,
            version,
            binary,
            bind_ip: self.options.bind_ip,
            port: free_port(self.options.bind_ip)?,
            data_dir: data_dir.to_path_buf(),
            extra_args,
            log_file: self.log_file(id, version)?,
        };
        let endpoint = launch.endpoint();

        info!(node = id, %version, %endpoint, data_dir = %data_dir.display(), "starting node");

        let mut node = NodeProcess::new(launch);
        if node
            .start(self.options.startup_timeout, self.options.poll_interval)
            .await?
        {
            info!(node = id, %version, %endpoint, "node is up");
            self.nodes.insert(id, node);
            Ok(ProcessHandle {
                id,
                bound_version: version,
                endpoint: Some(endpoint),
            })
        } else {
            info!(node = id, %version, status = ?node.status, "node did not start");
            Ok(ProcessHandle::rejected(id, version))
        }
    }

    async fn stop(&mut self, handle: ProcessHandle) -> Result<()> {
        if !handle.is_live() {
            return Ok(());
        }

        let mut node = self
            .nodes
            .remove(&handle.id)
            .ok_or(Error::UnknownNode(handle.id))?;

        node.stop(&self.shell, self.options.shutdown_timeout).await?;
        info!(node = handle.id, version = %handle.bound_version, "node stopped");
        Ok(())
    }
}
