//! Data access through the store's shell binary.
//!
//! Each operation evaluates one `runCommand` in a short-lived shell process
//! and parses the JSON reply it prints.

use crate::{DataAccessClient, Document, Error, IndexSpec, KeyPattern, Namespace, Result};
use serde_json::{Value, json};
use skipgate_types::Endpoint;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Error code the store uses for a missing namespace.
const NAMESPACE_NOT_FOUND: i64 = 26;

/// How to invoke the shell.
#[derive(Debug, Clone)]
pub struct ShellOptions {
    /// Shell binary (resolved through `PATH` when relative).
    pub binary: PathBuf,

    /// Upper bound for a single shell invocation.
    pub timeout: Duration,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("mongo"),
            timeout: Duration::from_secs(30),
        }
    }
}

/// [`DataAccessClient`] backed by shell subprocesses.
#[derive(Debug, Clone)]
pub struct ShellClient {
    options: ShellOptions,
}

impl ShellClient {
    pub fn new(options: ShellOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ShellOptions {
        &self.options
    }

    /// Evaluates `script` against `endpoint` and parses the JSON it prints.
    pub async fn eval(&self, endpoint: Endpoint, script: &str) -> Result<Value> {
        debug!(%endpoint, script, "evaluating shell script");

        let mut command = Command::new(&self.options.binary);
        command
            .arg("--quiet")
            .arg("--host")
            .arg(endpoint.ip().to_string())
            .arg("--port")
            .arg(endpoint.port().to_string())
            .arg("--eval")
            .arg(script)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.options.timeout, command.output())
            .await
            .map_err(|_| Error::Timeout(self.options.timeout))?
            .map_err(|e| Error::SpawnError(e.to_string()))?;

        if !output.status.success() {
            return Err(Error::ShellFailed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_reply(&String::from_utf8_lossy(&output.stdout))
    }

    /// Runs a database command and returns the reply once `ok` is set.
    pub async fn run_command(
        &self,
        endpoint: Endpoint,
        database: &str,
        command: &Value,
    ) -> Result<Value> {
        let script = format!(
            "JSON.stringify(db.getSiblingDB({}).runCommand({}))",
            serde_json::to_string(database)?,
            serde_json::to_string(command)?
        );
        let reply = self.eval(endpoint, &script).await?;
        check_ok(&command_name(command), reply)
    }

    /// Asks the node to shut down cleanly.
    ///
    /// The node drops the connection while shutting down, so a failed shell
    /// exit or an empty reply counts as success.
    pub async fn shutdown(&self, endpoint: Endpoint) -> Result<()> {
        match self.run_command(endpoint, "admin", &json!({"shutdown": 1})).await {
            Ok(_) | Err(Error::ShellFailed { .. } | Error::InvalidReply { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl DataAccessClient for ShellClient {
    async fn create_collection(&self, endpoint: Endpoint, ns: &Namespace) -> Result<()> {
        self.run_command(endpoint, &ns.database, &json!({"create": ns.collection}))
            .await
            .map(|_| ())
    }

    async fn insert_one(
        &self,
        endpoint: Endpoint,
        ns: &Namespace,
        document: Document,
    ) -> Result<()> {
        let command = json!({"insert": ns.collection, "documents": [Value::Object(document)]});
        let reply = self.run_command(endpoint, &ns.database, &command).await?;

        match reply.get("n").and_then(Value::as_u64) {
            Some(1) => Ok(()),
            other => Err(Error::InvalidReply {
                command: "insert".into(),
                reason: format!("expected n = 1, got {other:?}"),
            }),
        }
    }

    async fn create_index(
        &self,
        endpoint: Endpoint,
        ns: &Namespace,
        key: &KeyPattern,
    ) -> Result<()> {
        let command = json!({
            "createIndexes": ns.collection,
            "indexes": [{"key": key.to_json(), "name": key.default_index_name()}],
        });
        self.run_command(endpoint, &ns.database, &command)
            .await
            .map(|_| ())
    }

    async fn count(&self, endpoint: Endpoint, ns: &Namespace) -> Result<u64> {
        let reply = self
            .run_command(endpoint, &ns.database, &json!({"count": ns.collection}))
            .await?;

        reply
            .get("n")
            .and_then(|n| n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)))
            .ok_or_else(|| Error::InvalidReply {
                command: "count".into(),
                reason: "missing 'n'".into(),
            })
    }

    async fn list_indexes(&self, endpoint: Endpoint, ns: &Namespace) -> Result<Vec<IndexSpec>> {
        let reply = self
            .run_command(endpoint, &ns.database, &json!({"listIndexes": ns.collection}))
            .await
            .map_err(|e| match e {
                Error::CommandFailed {
                    code: Some(NAMESPACE_NOT_FOUND),
                    ..
                } => Error::CollectionNotFound(ns.to_string()),
                other => other,
            })?;

        let batch = reply
            .pointer("/cursor/firstBatch")
            .cloned()
            .ok_or_else(|| Error::InvalidReply {
                command: "listIndexes".into(),
                reason: "missing cursor.firstBatch".into(),
            })?;

        Ok(serde_json::from_value(batch)?)
    }
}

/// Picks the JSON reply out of shell output.
///
/// Older shells print connection banners even with `--quiet`, so the reply
/// is the last line that parses as a JSON object.
fn parse_reply(stdout: &str) -> Result<Value> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str::<Value>(line).ok())
        .ok_or_else(|| Error::InvalidReply {
            command: "eval".into(),
            reason: format!("no JSON object in shell output: {:?}", stdout.trim()),
        })
}

fn command_name(command: &Value) -> String {
    command
        .as_object()
        .and_then(|m| m.keys().next())
        .cloned()
        .unwrap_or_else(|| "<unknown>".to_string())
}

fn check_ok(command: &str, reply: Value) -> Result<Value> {
    let ok = reply.get("ok").and_then(Value::as_f64).unwrap_or(0.0);
    if ok == 1.0 {
        return Ok(reply);
    }

    Err(Error::CommandFailed {
        command: command.to_string(),
        code: reply.get("code").and_then(Value::as_i64),
        errmsg: reply
            .get("errmsg")
            .and_then(Value::as_str)
            .unwrap_or("no error message")
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply_skips_banner() {
        let out = "MongoDB shell version v4.0.28\nconnecting to: mongodb://127.0.0.1:27017/\n{\"ok\":1}\n";
        assert_eq!(parse_reply(out).unwrap(), json!({"ok": 1}));
    }

    #[test]
    fn test_parse_reply_without_json() {
        let err = parse_reply("Error: couldn't connect\n").unwrap_err();
        assert!(matches!(err, Error::InvalidReply { .. }));
    }

    #[test]
    fn test_check_ok_accepts_double() {
        assert!(check_ok("count", json!({"n": 1, "ok": 1.0})).is_ok());
    }

    #[test]
    fn test_check_ok_reports_errmsg() {
        let err = check_ok(
            "listIndexes",
            json!({"ok": 0, "code": 26, "errmsg": "ns does not exist"}),
        )
        .unwrap_err();

        match err {
            Error::CommandFailed {
                command,
                code,
                errmsg,
            } => {
                assert_eq!(command, "listIndexes");
                assert_eq!(code, Some(26));
                assert_eq!(errmsg, "ns does not exist");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_command_name_is_first_key() {
        assert_eq!(
            command_name(&json!({"createIndexes": "c", "indexes": []})),
            "createIndexes"
        );
    }

    #[tokio::test]
    async fn test_missing_shell_binary_is_spawn_error() {
        let client = ShellClient::new(ShellOptions {
            binary: PathBuf::from("/nonexistent/skipgate-shell"),
            timeout: Duration::from_secs(5),
        });

        let err = client
            .count(Endpoint::localhost(1), &Namespace::test("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SpawnError(_)));
    }
}
