//! Background dispatch thread that keeps a [`Store`] in sync with the
//! coordination service (§4.A).
//!
//! Grounded in `solr_sync.go`'s `Listen()` event loop (one-shot seed of
//! each watched node, then a `select`-style dispatch over whichever watch
//! fires next, re-arming the watch each time) and, for the thread/`Drop`
//! shape, `backend::zookeeper::coordinator::cleaner::Cleaner`.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::Builder;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::bounded;
use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use failure::ResultExt;
use slog::Logger;

use crate::cluster_state::parse_cluster_props;
use crate::cluster_state::parse_state_json;
use crate::cluster_state::strip_solr_suffix;
use crate::config::ZkConfig;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::store::Store;

use super::CoordinationBackend;

const PATH_CLUSTER_PROPS: &str = "clusterprops.json";
const PATH_LIVE_NODES: &str = "live_nodes";

fn state_path(collection: &str) -> String {
    format!("collections/{}/state.json", collection)
}

/// Owns the background thread that watches the coordination service for
/// this client's collection and feeds updates into a [`Store`].
pub struct Watcher {
    handle: Option<JoinHandle<()>>,
    listening: Arc<AtomicBool>,
    logger: Logger,
    shutdown_signal: Option<Sender<()>>,
}

impl Watcher {
    /// Seeds `store` with an initial snapshot (tolerating a missing
    /// `clusterprops.json`) and spawns the dispatch thread. Blocks the
    /// calling thread only for that initial seed.
    pub fn start(
        backend: Arc<dyn CoordinationBackend>,
        config: ZkConfig,
        collection: String,
        store: Arc<Store>,
        logger: Logger,
    ) -> Result<Watcher, Error> {
        seed(&*backend, &collection, &store, &logger)?;

        let listening = Arc::new(AtomicBool::new(true));
        let (sender, receiver) = bounded(0);
        let inner_logger = logger.clone();
        let inner_listening = Arc::clone(&listening);
        let handle = Builder::new()
            .name("cluster-search-client:watcher".into())
            .spawn(move || {
                dispatch(backend, config, collection, store, inner_logger, receiver, inner_listening);
            })
            .context(ErrorKind::SpawnThread("coordination watcher"))?;

        Ok(Watcher {
            handle: Some(handle),
            listening,
            logger,
            shutdown_signal: Some(sender),
        })
    }

    pub fn listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        if let Some(shutdown_signal) = self.shutdown_signal.take() {
            drop(shutdown_signal);
        }
        if let Some(handle) = self.handle.take() {
            if let Err(error) = handle.join() {
                error!(self.logger, "Coordination watcher thread panicked"; "error" => ?error);
            }
        }
    }
}

/// Best-effort initial read of every watched node. `clusterprops.json` is
/// allowed to be absent (freshly bootstrapped clusters have none yet);
/// the state and live-nodes reads are not.
fn seed(backend: &dyn CoordinationBackend, collection: &str, store: &Store, logger: &Logger) -> Result<(), Error> {
    match backend.get_data(PATH_CLUSTER_PROPS) {
        Ok((body, _version)) => {
            let props = parse_cluster_props(&body)?;
            store.set_props(props);
        }
        Err(ref error) if matches!(error.kind(), ErrorKind::NotFound) => {
            debug!(logger, "No cluster properties set, using defaults");
        }
        Err(error) => return Err(error),
    }

    let (body, version) = backend.get_data(&state_path(collection))?;
    let parsed = parse_state_json(collection, &body)?;
    store.set_collection(collection.to_string(), parsed, version);

    let live_nodes = backend.get_children(PATH_LIVE_NODES)?;
    store.set_live_nodes(live_nodes.iter().map(|node| strip_solr_suffix(node)).collect());

    Ok(())
}

/// Runs until `shutdown` is signalled (or disconnected), re-arming watches
/// on the three tracked nodes and reacting to whichever fires.
fn dispatch(
    backend: Arc<dyn CoordinationBackend>,
    config: ZkConfig,
    collection: String,
    store: Arc<Store>,
    logger: Logger,
    shutdown: Receiver<()>,
    listening: Arc<AtomicBool>,
) {
    let mut backoff = Duration::from_millis(config.reconnect_backoff_ms);
    loop {
        let state_watch = backend.get_data_w(&state_path(&collection)).and_then(|(body, version, watch)| {
            let parsed = parse_state_json(&collection, &body)?;
            store.set_collection(collection.clone(), parsed, version);
            Ok(watch)
        });
        let live_nodes_watch = backend.get_children_w(PATH_LIVE_NODES).map(|(nodes, watch)| {
            store.set_live_nodes(nodes.iter().map(|node| strip_solr_suffix(node)).collect());
            watch
        });

        let (state_watch, live_nodes_watch) = match (state_watch, live_nodes_watch) {
            (Ok(state_watch), Ok(live_nodes_watch)) => {
                listening.store(true, Ordering::Relaxed);
                backoff = Duration::from_millis(config.reconnect_backoff_ms);
                (state_watch, live_nodes_watch)
            }
            (state_result, live_nodes_result) => {
                listening.store(false, Ordering::Relaxed);
                let error = state_result.err().or_else(|| live_nodes_result.err()).expect("one side failed");
                warn!(logger, "Coordination watch re-arm failed, backing off"; "error" => %error, "backoff" => ?backoff);
                match shutdown.recv_timeout(backoff) {
                    Ok(()) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return,
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => (),
                }
                backoff *= 2;
                continue;
            }
        };

        let mut select = crossbeam_channel::Select::new();
        let state_index = select.recv(&state_watch);
        let live_nodes_index = select.recv(&live_nodes_watch);
        let shutdown_index = select.recv(&shutdown);
        let operation = select.select();
        match operation.index() {
            i if i == state_index => {
                let _ = operation.recv(&state_watch);
                debug!(logger, "Collection state changed");
            }
            i if i == live_nodes_index => {
                let _ = operation.recv(&live_nodes_watch);
                debug!(logger, "Live node set changed");
            }
            i if i == shutdown_index => {
                let _ = operation.recv(&shutdown);
                return;
            }
            _ => unreachable!("select only registered three operations"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster_state::Collection;
    use slog::Discard;
    use slog::Logger as SlogLogger;
    use std::collections::BTreeMap;
    use std::sync::Mutex as StdMutex;

    struct FixedBackend {
        state: Vec<u8>,
        live_nodes: Vec<String>,
        props_missing: bool,
        seeded: StdMutex<bool>,
    }

    impl CoordinationBackend for FixedBackend {
        fn get_data(&self, path: &str) -> Result<(Vec<u8>, i32), Error> {
            if path == PATH_CLUSTER_PROPS {
                if self.props_missing {
                    return Err(ErrorKind::NotFound.into());
                }
                return Ok((b"{\"urlScheme\":\"http\"}".to_vec(), 0));
            }
            Ok((self.state.clone(), 1))
        }

        fn get_children(&self, path: &str) -> Result<Vec<String>, Error> {
            assert_eq!(path, PATH_LIVE_NODES);
            Ok(self.live_nodes.clone())
        }

        fn get_data_w(&self, _path: &str) -> Result<(Vec<u8>, i32, Receiver<()>), Error> {
            let (_tx, rx) = bounded(0);
            let (data, version) = self.get_data(&state_path("c"))?;
            *self.seeded.lock().unwrap() = true;
            Ok((data, version, rx))
        }

        fn get_children_w(&self, path: &str) -> Result<(Vec<String>, Receiver<()>), Error> {
            let (_tx, rx) = bounded(0);
            let nodes = self.get_children(path)?;
            Ok((nodes, rx))
        }
    }

    fn test_logger() -> Logger {
        SlogLogger::root(Discard, o!())
    }

    fn empty_state_json() -> Vec<u8> {
        let collection = Collection { shards: BTreeMap::new(), replication_factor: "1".into() };
        let mut wrapper = BTreeMap::new();
        wrapper.insert("c".to_string(), collection);
        serde_json::to_vec(&wrapper).unwrap()
    }

    #[test]
    fn seed_tolerates_missing_cluster_props() {
        let backend = FixedBackend {
            state: empty_state_json(),
            live_nodes: vec!["host1:8983_solr".into()],
            props_missing: true,
            seeded: StdMutex::new(false),
        };
        let store = Store::new();
        seed(&backend, "c", &store, &test_logger()).unwrap();
        let state = store.get();
        assert!(state.collections.contains_key("c"));
        assert_eq!(state.live_nodes, vec!["host1:8983".to_string()]);
    }

    #[test]
    fn seed_propagates_missing_state_json() {
        struct MissingState;
        impl CoordinationBackend for MissingState {
            fn get_data(&self, path: &str) -> Result<(Vec<u8>, i32), Error> {
                if path == PATH_CLUSTER_PROPS {
                    return Err(ErrorKind::NotFound.into());
                }
                Err(ErrorKind::NotFound.into())
            }
            fn get_children(&self, _path: &str) -> Result<Vec<String>, Error> {
                Ok(Vec::new())
            }
            fn get_data_w(&self, _path: &str) -> Result<(Vec<u8>, i32, Receiver<()>), Error> {
                let (_tx, rx) = bounded(0);
                Ok((Vec::new(), 0, rx))
            }
            fn get_children_w(&self, _path: &str) -> Result<(Vec<String>, Receiver<()>), Error> {
                let (_tx, rx) = bounded(0);
                Ok((Vec::new(), rx))
            }
        }
        let store = Store::new();
        let result = seed(&MissingState, "c", &store, &test_logger());
        assert!(result.is_err());
    }
}
