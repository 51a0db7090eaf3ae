//! In-process stand-in for a store and its release train.
//!
//! [`SimulatedStore`] implements all three collaborator traits so the protocol
//! can run without real binaries. Its data lives in the data directory as a
//! JSON file tagged with the data format (the release that created it). A
//! binary opens data written by its own release or the release immediately
//! before it, and refuses anything older. Knobs in [`SimBehavior`] make it
//! misbehave in the ways the protocol is meant to catch.

use serde::{Deserialize, Serialize};
use skipgate_client::{DataAccessClient, Document, IndexSpec, KeyPattern, Namespace};
use skipgate_node::{NodeLifecycleController, ProcessHandle, RepairInvoker, StartOptions};
use skipgate_types::{BinaryVersion, Endpoint, Release};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// Exit code of a repair that finds data it cannot upgrade.
pub const EXIT_NEED_UPGRADE: i32 = 62;

/// Exit code of a repair over a directory that a running node holds.
pub const EXIT_LOCKED: i32 = 100;

const STATE_FILE: &str = "storage.json";
const LOCK_FILE: &str = "mongod.lock";
const REJECTED_MARKER: &str = "rejected-start.marker";
const FIRST_PORT: u16 = 47_017;

/// Ways the simulated store can misbehave.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimBehavior {
    /// Open data from any older release.
    pub accept_skip_level: bool,
    /// Repair always exits 0.
    pub repair_succeeds: bool,
    /// A refused start leaves the data half-upgraded, unreadable by any release.
    pub corrupt_on_rejected_start: bool,
    /// Repair drops every secondary index.
    pub drop_index_on_repair: bool,
    /// A refused start leaves a file behind.
    pub touch_on_rejected_start: bool,
    /// This release never starts.
    pub refuse_start_of: Option<Release>,
    /// Nodes of this release ignore shutdown and are killed on stop.
    pub kill_on_stop_of: Option<Release>,
}

/// Something the simulated store did, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    Started {
        release: Release,
        live: bool,
    },
    Stopped {
        id: u64,
    },
    Repaired {
        release: Release,
        exit_code: i32,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DiskState {
    format: Option<Release>,
    #[serde(default)]
    torn: bool,
    collections: BTreeMap<String, StoredCollection>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredCollection {
    documents: Vec<Document>,
    indexes: Vec<IndexSpec>,
}

impl StoredCollection {
    fn new() -> Self {
        let mut id_index = IndexSpec::new(KeyPattern::ascending("_id"));
        id_index.name = "_id_".to_string();
        Self {
            documents: Vec::new(),
            indexes: vec![id_index],
        }
    }
}

#[derive(Debug)]
struct LiveNode {
    release: Release,
    dir: PathBuf,
    port: u16,
}

#[derive(Debug)]
struct SimState {
    train: Vec<Release>,
    last_lts: Release,
    behavior: SimBehavior,
    live: BTreeMap<u64, LiveNode>,
    next_id: u64,
    next_port: u16,
    events: Vec<SimEvent>,
    max_live: usize,
}

impl SimState {
    fn resolve(&self, version: BinaryVersion) -> skipgate_node::Result<Release> {
        let release = match version {
            BinaryVersion::Latest => self.train.last().copied(),
            BinaryVersion::LastLts => Some(self.last_lts),
            BinaryVersion::Release(release) => Some(release),
        };
        release
            .filter(|release| self.train.contains(release))
            .ok_or_else(|| skipgate_node::Error::BinaryNotFound {
                version,
                path: PathBuf::from(format!("<simulated {version}>")),
            })
    }

    fn can_open(&self, binary: Release, disk: &DiskState) -> bool {
        if disk.torn {
            return false;
        }
        let Some(format) = disk.format else {
            return true;
        };
        if self.behavior.accept_skip_level {
            return true;
        }
        match (position(&self.train, binary), position(&self.train, format)) {
            (Some(b), Some(f)) => b >= f && b - f <= 1,
            _ => false,
        }
    }

    fn holds(&self, dir: &Path) -> bool {
        self.live.values().any(|node| node.dir == dir)
    }

    fn node_at(&self, endpoint: Endpoint) -> skipgate_client::Result<&LiveNode> {
        self.live
            .values()
            .find(|node| node.port == endpoint.port())
            .ok_or_else(|| skipgate_client::Error::ShellFailed {
                code: Some(1),
                stderr: format!("couldn't connect to server {endpoint}"),
            })
    }
}

fn position(train: &[Release], release: Release) -> Option<usize> {
    train.iter().position(|r| *r == release)
}

fn load(dir: &Path) -> io::Result<DiskState> {
    match fs::read(dir.join(STATE_FILE)) {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(io::Error::other),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(DiskState::default()),
        Err(e) => Err(e),
    }
}

fn save(dir: &Path, state: &DiskState) -> io::Result<()> {
    let bytes = serde_json::to_vec_pretty(state).map_err(io::Error::other)?;
    fs::write(dir.join(STATE_FILE), bytes)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Simulated store shared by the node, repair and data-access seams.
///
/// Clones share state, so one instance can be handed to all three.
#[derive(Debug, Clone)]
pub struct SimulatedStore {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedStore {
    /// Releases 3.4 through 5.0.
    pub fn default_train() -> Vec<Release> {
        vec![
            Release::new(3, 4),
            Release::new(3, 6),
            Release::new(4, 0),
            Release::new(4, 2),
            Release::new(4, 4),
            Release::new(5, 0),
        ]
    }

    /// A store that ships `train`. The newest release is `latest`.
    pub fn new(mut train: Vec<Release>, last_lts: Release) -> Self {
        train.sort();
        train.dedup();
        Self {
            state: Arc::new(Mutex::new(SimState {
                train,
                last_lts,
                behavior: SimBehavior::default(),
                live: BTreeMap::new(),
                next_id: 1,
                next_port: FIRST_PORT,
                events: Vec::new(),
                max_live: 0,
            })),
        }
    }

    pub fn with_behavior(self, behavior: SimBehavior) -> Self {
        self.lock().behavior = behavior;
        self
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.lock().events.clone()
    }

    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    /// Most nodes that were ever up at the same time.
    pub fn max_concurrent_live(&self) -> usize {
        self.lock().max_live
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read<T>(
        &self,
        endpoint: Endpoint,
        f: impl FnOnce(&DiskState) -> skipgate_client::Result<T>,
    ) -> skipgate_client::Result<T> {
        let state = self.lock();
        let node = state.node_at(endpoint)?;
        f(&load(&node.dir)?)
    }

    fn write<T>(
        &self,
        endpoint: Endpoint,
        f: impl FnOnce(&mut DiskState) -> skipgate_client::Result<T>,
    ) -> skipgate_client::Result<T> {
        let state = self.lock();
        let node = state.node_at(endpoint)?;
        let mut disk = load(&node.dir)?;
        let value = f(&mut disk)?;
        save(&node.dir, &disk)?;
        Ok(value)
    }
}

impl Default for SimulatedStore {
    fn default() -> Self {
        Self::new(Self::default_train(), Release::new(4, 4))
    }
}

impl NodeLifecycleController for SimulatedStore {
    async fn start(
        &mut self,
        version: BinaryVersion,
        data_dir: &Path,
        options: &StartOptions,
    ) -> skipgate_node::Result<ProcessHandle> {
        let mut state = self.lock();
        let release = state.resolve(version)?;

        let id = state.next_id;
        state.next_id += 1;

        if !options.no_clean_data {
            match fs::remove_dir_all(data_dir) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
                _ => {}
            }
        }
        fs::create_dir_all(data_dir)?;

        let mut disk = load(data_dir)?;
        let accepted = state.behavior.refuse_start_of != Some(release)
            && !state.holds(data_dir)
            && state.can_open(release, &disk);

        if !accepted {
            if state.behavior.corrupt_on_rejected_start {
                disk.torn = true;
                save(data_dir, &disk)?;
            }
            if state.behavior.touch_on_rejected_start {
                fs::write(data_dir.join(REJECTED_MARKER), release.to_string())?;
            }
            state.events.push(SimEvent::Started {
                release,
                live: false,
            });
            info!(%version, %release, format = ?disk.format, "simulated node refused to start");
            return Ok(ProcessHandle::rejected(id, version));
        }

        if disk.format.is_none() {
            disk.format = Some(release);
            save(data_dir, &disk)?;
        }
        fs::write(data_dir.join(LOCK_FILE), id.to_string())?;

        let port = state.next_port;
        state.next_port = state.next_port.wrapping_add(1).max(FIRST_PORT);
        state.live.insert(
            id,
            LiveNode {
                release,
                dir: data_dir.to_path_buf(),
                port,
            },
        );
        state.max_live = state.max_live.max(state.live.len());
        state.events.push(SimEvent::Started {
            release,
            live: true,
        });
        debug!(id, %release, port, "simulated node started");

        Ok(ProcessHandle {
            id,
            bound_version: version,
            endpoint: Some(Endpoint::localhost(port)),
        })
    }

    async fn stop(&mut self, handle: ProcessHandle) -> skipgate_node::Result<()> {
        if !handle.is_live() {
            return Ok(());
        }

        let mut state = self.lock();
        let node = state
            .live
            .remove(&handle.id)
            .ok_or(skipgate_node::Error::UnknownNode(handle.id))?;
        remove_if_exists(&node.dir.join(LOCK_FILE))?;
        state.events.push(SimEvent::Stopped { id: handle.id });

        if state.behavior.kill_on_stop_of == Some(node.release) {
            debug!(id = handle.id, release = %node.release, "simulated node killed");
            return Err(skipgate_node::Error::UncleanShutdown {
                node: handle.id,
                after: Duration::ZERO,
            });
        }
        debug!(id = handle.id, release = %node.release, "simulated node stopped");
        Ok(())
    }
}

impl RepairInvoker for SimulatedStore {
    async fn repair(
        &mut self,
        version: BinaryVersion,
        data_dir: &Path,
        _port: Option<u16>,
    ) -> skipgate_node::Result<i32> {
        let mut state = self.lock();
        let release = state.resolve(version)?;

        let exit_code = if state.holds(data_dir) {
            EXIT_LOCKED
        } else {
            let mut disk = load(data_dir)?;
            if state.behavior.drop_index_on_repair {
                for collection in disk.collections.values_mut() {
                    collection.indexes.retain(|index| index.name == "_id_");
                }
                save(data_dir, &disk)?;
            }
            if state.behavior.repair_succeeds || state.can_open(release, &disk) {
                0
            } else {
                EXIT_NEED_UPGRADE
            }
        };

        state.events.push(SimEvent::Repaired { release, exit_code });
        info!(%version, %release, exit_code, "simulated repair finished");
        Ok(exit_code)
    }
}

impl DataAccessClient for SimulatedStore {
    async fn create_collection(
        &self,
        endpoint: Endpoint,
        ns: &Namespace,
    ) -> skipgate_client::Result<()> {
        self.write(endpoint, |disk| {
            let key = ns.to_string();
            if disk.collections.contains_key(&key) {
                return Err(skipgate_client::Error::CommandFailed {
                    command: "create".to_string(),
                    code: Some(48),
                    errmsg: format!("Collection already exists. NS: {key}"),
                });
            }
            disk.collections.insert(key, StoredCollection::new());
            Ok(())
        })
    }

    async fn insert_one(
        &self,
        endpoint: Endpoint,
        ns: &Namespace,
        document: Document,
    ) -> skipgate_client::Result<()> {
        self.write(endpoint, |disk| {
            disk.collections
                .entry(ns.to_string())
                .or_insert_with(StoredCollection::new)
                .documents
                .push(document);
            Ok(())
        })
    }

    async fn create_index(
        &self,
        endpoint: Endpoint,
        ns: &Namespace,
        key: &KeyPattern,
    ) -> skipgate_client::Result<()> {
        self.write(endpoint, |disk| {
            let collection = disk
                .collections
                .entry(ns.to_string())
                .or_insert_with(StoredCollection::new);
            if !collection.indexes.iter().any(|index| &index.key == key) {
                collection.indexes.push(IndexSpec::new(key.clone()));
            }
            Ok(())
        })
    }

    async fn count(&self, endpoint: Endpoint, ns: &Namespace) -> skipgate_client::Result<u64> {
        self.read(endpoint, |disk| {
            Ok(disk
                .collections
                .get(&ns.to_string())
                .map_or(0, |collection| collection.documents.len() as u64))
        })
    }

    async fn list_indexes(
        &self,
        endpoint: Endpoint,
        ns: &Namespace,
    ) -> skipgate_client::Result<Vec<IndexSpec>> {
        self.read(endpoint, |disk| {
            disk.collections
                .get(&ns.to_string())
                .map(|collection| collection.indexes.clone())
                .ok_or_else(|| skipgate_client::Error::CollectionNotFound(ns.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;
    use test_case::test_case;

    fn release(major: u32, minor: u32) -> Release {
        Release::new(major, minor)
    }

    #[test_case(release(5, 0), None, true; "empty directory")]
    #[test_case(release(4, 0), Some(release(4, 0)), true; "same release")]
    #[test_case(release(4, 2), Some(release(4, 0)), true; "one step up")]
    #[test_case(release(4, 4), Some(release(4, 0)), false; "two steps up")]
    #[test_case(release(5, 0), Some(release(3, 6)), false; "skip level")]
    #[test_case(release(4, 0), Some(release(4, 2)), false; "downgrade")]
    #[test_case(release(5, 0), Some(release(2, 6)), false; "unknown format")]
    fn test_can_open(binary: Release, format: Option<Release>, expected: bool) {
        let store = SimulatedStore::default();
        let disk = DiskState {
            format,
            ..Default::default()
        };
        assert_eq!(store.lock().can_open(binary, &disk), expected);
    }

    #[test]
    fn test_torn_data_opens_nowhere() {
        let store = SimulatedStore::default();
        let disk = DiskState {
            format: Some(release(4, 0)),
            torn: true,
            ..Default::default()
        };
        assert!(!store.lock().can_open(release(4, 0), &disk));
    }

    #[test]
    fn test_resolve_selectors() {
        let store = SimulatedStore::default();
        let state = store.lock();
        assert_eq!(state.resolve(BinaryVersion::Latest).ok(), Some(release(5, 0)));
        assert_eq!(state.resolve(BinaryVersion::LastLts).ok(), Some(release(4, 4)));
        assert!(matches!(
            state.resolve(BinaryVersion::Release(release(2, 6))),
            Err(skipgate_node::Error::BinaryNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_data_survives_restart() {
        let temp = tempdir().expect("Failed to create temp dir");
        let dir = temp.path().join("db");
        let mut store = SimulatedStore::default();
        let ns = Namespace::test("four_zero");

        let handle = store
            .start(BinaryVersion::Release(release(4, 0)), &dir, &StartOptions::default())
            .await
            .expect("start");
        let endpoint = handle.endpoint.expect("live");
        store.create_collection(endpoint, &ns).await.expect("create");
        let mut doc = Document::new();
        doc.insert("a".into(), json!(1));
        store.insert_one(endpoint, &ns, doc).await.expect("insert");
        store
            .create_index(endpoint, &ns, &KeyPattern::ascending("a"))
            .await
            .expect("index");
        store.stop(handle).await.expect("stop");
        assert!(!dir.join(LOCK_FILE).exists());

        let handle = store
            .start(
                BinaryVersion::Release(release(4, 0)),
                &dir,
                &StartOptions::preserve_data(),
            )
            .await
            .expect("restart");
        let endpoint = handle.endpoint.expect("live");
        assert_eq!(store.count(endpoint, &ns).await.expect("count"), 1);
        let names: Vec<String> = store
            .list_indexes(endpoint, &ns)
            .await
            .expect("indexes")
            .into_iter()
            .map(|index| index.name)
            .collect();
        assert_eq!(names, ["_id_", "a_1"]);
        store.stop(handle).await.expect("stop");
        assert_eq!(store.max_concurrent_live(), 1);
    }

    #[tokio::test]
    async fn test_latest_refuses_skip_level_data() {
        let temp = tempdir().expect("Failed to create temp dir");
        let dir = temp.path().join("db");
        let mut store = SimulatedStore::default();

        let handle = store
            .start(BinaryVersion::Release(release(3, 6)), &dir, &StartOptions::default())
            .await
            .expect("start");
        store.stop(handle).await.expect("stop");

        let handle = store
            .start(BinaryVersion::Latest, &dir, &StartOptions::preserve_data())
            .await
            .expect("attempt");
        assert!(!handle.is_live());
        store.stop(handle).await.expect("stopping a rejected handle is a no-op");

        let code = store
            .repair(BinaryVersion::Latest, &dir, None)
            .await
            .expect("repair");
        assert_eq!(code, EXIT_NEED_UPGRADE);
        assert_eq!(store.live_count(), 0);
    }

    #[tokio::test]
    async fn test_repair_of_held_directory_is_locked() {
        let temp = tempdir().expect("Failed to create temp dir");
        let dir = temp.path().join("db");
        let mut store = SimulatedStore::default();

        let handle = store
            .start(BinaryVersion::Release(release(4, 2)), &dir, &StartOptions::default())
            .await
            .expect("start");
        let code = store
            .repair(BinaryVersion::Release(release(4, 2)), &dir, None)
            .await
            .expect("repair");
        assert_eq!(code, EXIT_LOCKED);
        store.stop(handle).await.expect("stop");
    }

    #[tokio::test]
    async fn test_dead_endpoint_is_client_error() {
        let store = SimulatedStore::default();
        let err = store
            .count(Endpoint::localhost(1), &Namespace::test("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, skipgate_client::Error::ShellFailed { .. }));
    }

    #[tokio::test]
    async fn test_unknown_live_handle() {
        let mut store = SimulatedStore::default();
        let handle = ProcessHandle {
            id: 99,
            bound_version: BinaryVersion::Latest,
            endpoint: Some(Endpoint::localhost(FIRST_PORT)),
        };
        assert!(matches!(
            store.stop(handle).await,
            Err(skipgate_node::Error::UnknownNode(99))
        ));
    }
}
