//! Node process management.

use crate::{Error, Result};
use skipgate_client::ShellClient;
use skipgate_types::{BinaryVersion, Endpoint};
use std::net::{IpAddr, TcpListener};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Status of a store node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Node is stopped.
    Stopped,

    /// Node is starting up.
    Starting,

    /// Node accepts connections.
    Running,

    /// Node exited on its own.
    Exited(Option<i32>),
}

/// Everything needed to launch one node.
#[derive(Debug, Clone)]
pub struct NodeLaunch {
    /// Controller-assigned node ID.
    pub id: u64,

    /// Version the binary was resolved from.
    pub version: BinaryVersion,

    /// Resolved binary.
    pub binary: PathBuf,

    /// Address to bind to.
    pub bind_ip: IpAddr,

    /// Port number.
    pub port: u16,

    /// Data directory.
    pub data_dir: PathBuf,

    /// Additional command-line arguments.
    pub extra_args: Vec<String>,

    /// File receiving the node's stdout and stderr.
    pub log_file: Option<PathBuf>,
}

impl NodeLaunch {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new((self.bind_ip, self.port).into())
    }

    fn command(&self) -> Result<Command> {
        let mut command = Command::new(&self.binary);
        command
            .arg("--dbpath")
            .arg(&self.data_dir)
            .arg("--port")
            .arg(self.port.to_string())
            .arg("--bind_ip")
            .arg(self.bind_ip.to_string())
            .args(&self.extra_args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        match &self.log_file {
            Some(path) => {
                let log = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                command
                    .stdout(Stdio::from(log.try_clone()?))
                    .stderr(Stdio::from(log));
            }
            None => {
                command.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        Ok(command)
    }
}

/// A managed store process.
pub struct NodeProcess {
    /// Launch parameters.
    pub launch: NodeLaunch,

    /// Child process handle.
    pub process: Option<Child>,

    /// Current status.
    pub status: NodeStatus,
}

impl NodeProcess {
    /// Creates a new node process (not started).
    pub fn new(launch: NodeLaunch) -> Self {
        Self {
            launch,
            process: None,
            status: NodeStatus::Stopped,
        }
    }

    /// Spawns the node and waits until it accepts connections.
    ///
    /// Returns `Ok(true)` once the port is reachable and `Ok(false)` when the
    /// process exits or stays unreachable for `timeout`. A node that never
    /// became ready is killed before returning.
    pub async fn start(&mut self, timeout: Duration, poll: Duration) -> Result<bool> {
        self.status = NodeStatus::Starting;

        let child = self
            .launch
            .command()?
            .spawn()
            .map_err(|e| Error::SpawnError {
                binary: self.launch.binary.clone(),
                reason: e.to_string(),
            })?;
        self.process = Some(child);

        let deadline = Instant::now() + timeout;
        let endpoint = self.launch.endpoint();

        loop {
            if let Some(code) = self.exit_code()? {
                debug!(node = self.launch.id, ?code, "node exited during startup");
                self.status = NodeStatus::Exited(code);
                self.process = None;
                return Ok(false);
            }

            if TcpStream::connect(endpoint.addr()).await.is_ok() {
                // The port may belong to someone else; the node has to outlive one poll.
                sleep(poll).await;
                if let Some(code) = self.exit_code()? {
                    debug!(node = self.launch.id, ?code, "port answered but node exited");
                    self.status = NodeStatus::Exited(code);
                    self.process = None;
                    return Ok(false);
                }
                self.status = NodeStatus::Running;
                return Ok(true);
            }

            if Instant::now() >= deadline {
                warn!(node = self.launch.id, ?timeout, "node never became ready, killing it");
                self.kill().await;
                return Ok(false);
            }

            sleep(poll).await;
        }
    }

    /// Stops the node, asking for a clean shutdown first.
    ///
    /// A node that has to be killed is stopped but reported as
    /// [`Error::UncleanShutdown`].
    pub async fn stop(&mut self, shell: &ShellClient, timeout: Duration) -> Result<()> {
        let Some(mut child) = self.process.take() else {
            return Ok(()); // Already stopped
        };

        if let Err(e) = shell.shutdown(self.launch.endpoint()).await {
            warn!(node = self.launch.id, error = %e, "clean shutdown request failed");
        }

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(node = self.launch.id, %status, "node stopped");
                self.status = NodeStatus::Stopped;
                Ok(())
            }
            Ok(Err(e)) => {
                self.status = NodeStatus::Stopped;
                Err(Error::Io(e))
            }
            Err(_) => {
                warn!(node = self.launch.id, ?timeout, "node ignored shutdown, killing it");
                let killed = child.kill().await;
                self.status = NodeStatus::Stopped;
                killed?;
                Err(Error::UncleanShutdown {
                    node: self.launch.id,
                    after: timeout,
                })
            }
        }
    }

    async fn kill(&mut self) {
        if let Some(mut child) = self.process.take() {
            child.kill().await.ok();
        }
        self.status = NodeStatus::Stopped;
    }

    /// `Some(code)` once the process has exited.
    fn exit_code(&mut self) -> Result<Option<Option<i32>>> {
        match &mut self.process {
            Some(child) => Ok(child.try_wait()?.map(|status| status.code())),
            None => Ok(None),
        }
    }
}

/// Picks a currently unused port on `ip`.
pub fn free_port(ip: IpAddr) -> Result<u16> {
    let listener = TcpListener::bind((ip, 0))?;
    Ok(listener.local_addr()?.port())
}
