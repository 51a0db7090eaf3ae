//! Out-of-process repair invocation.

use crate::{BinaryResolver, Error, Result};
use skipgate_types::BinaryVersion;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Exit code reported when the repair process was killed by a signal.
pub const SIGNALED_EXIT: i32 = -1;

/// Runs a repair pass over a data directory and reports its exit status.
#[allow(async_fn_in_trait)]
pub trait RepairInvoker {
    /// Returns the process exit status; `0` means repair succeeded.
    async fn repair(
        &mut self,
        version: BinaryVersion,
        data_dir: &Path,
        port: Option<u16>,
    ) -> Result<i32>;
}

/// [`RepairInvoker`] that runs `<binary> --repair --dbpath <dir>`.
pub struct ProcessRepairInvoker {
    resolver: BinaryResolver,
    timeout: Duration,
}

impl ProcessRepairInvoker {
    pub fn new(resolver: BinaryResolver, timeout: Duration) -> Self {
        Self { resolver, timeout }
    }
}

impl RepairInvoker for ProcessRepairInvoker {
    async fn repair(
        &mut self,
        version: BinaryVersion,
        data_dir: &Path,
        port: Option<u16>,
    ) -> Result<i32> {
        let binary = self.resolver.resolve(version)?;

        let mut command = Command::new(&binary);
        if let Some(port) = port {
            command.arg("--port").arg(port.to_string());
        }
        command
            .arg("--repair")
            .arg("--dbpath")
            .arg(data_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(%version, data_dir = %data_dir.display(), "running repair");

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| Error::Timeout {
                what: format!("repair with {version}"),
                after: self.timeout,
            })?
            .map_err(|e| Error::SpawnError {
                binary: binary.clone(),
                reason: e.to_string(),
            })?;

        let code = output.status.code().unwrap_or(SIGNALED_EXIT);
        debug!(
            %version,
            code,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "repair finished"
        );

        Ok(code)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use skipgate_types::Release;
    use tempfile::TempDir;

    fn invoker(latest: impl AsRef<Path>, multiversion: &Path) -> ProcessRepairInvoker {
        let resolver = BinaryResolver::new(
            latest.as_ref(),
            multiversion,
            "mongod",
            Release::new(4, 4),
        );
        ProcessRepairInvoker::new(resolver, Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_failing_repair_reports_nonzero() {
        let temp = TempDir::new().unwrap();

        let code = invoker("/bin/false", temp.path())
            .repair(BinaryVersion::Latest, temp.path(), Some(27017))
            .await
            .unwrap();
        assert_eq!(code, 1);
    }

    #[tokio::test]
    async fn test_succeeding_repair_reports_zero() {
        let temp = TempDir::new().unwrap();

        let code = invoker("/bin/true", temp.path())
            .repair(BinaryVersion::Latest, temp.path(), None)
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_missing_binary_is_error() {
        let temp = TempDir::new().unwrap();

        let result = invoker(temp.path().join("mongod"), temp.path())
            .repair(BinaryVersion::Latest, temp.path(), None)
            .await;
        assert!(matches!(result, Err(Error::BinaryNotFound { .. })));
    }
}
