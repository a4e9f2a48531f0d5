//! Public entry point (§4.H): wires the coordination watcher, state
//! store, HTTP layer, retrier and router behind one handle.
//!
//! Grounded in `coordinator::Coordinator`, a thin facade holding an `Arc`
//! to its backend and delegating every call to it.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::RngCore;
use rand::SeedableRng;
use slog::Logger;

use crate::cluster_state::ClusterState;
use crate::config::Config;
use crate::config::RouterPolicy;
use crate::coordination::watcher::Watcher;
use crate::coordination::zookeeper::Client as ZookeeperClient;
use crate::coordination::CoordinationBackend;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::http::client::HttpClient;
use crate::http::client::ReqwestTransport;
use crate::http::client::Transport;
use crate::http::options::Options;
use crate::http::response::SelectResponse;
use crate::http::response::UpdateResponse;
use crate::locator;
use crate::retry::Retrier;
use crate::router::AdaptiveRouter;
use crate::router::RoundRobinRouter;
use crate::router::Router;
use crate::store::Store;

/// The crate's facade: one handle per watched collection.
pub struct SolrCloudClient {
    collection: String,
    store: Arc<Store>,
    http: HttpClient,
    retrier: Retrier,
    router: Box<dyn Router>,
    // `rand::thread_rng()` is `!Send` and can't live in a struct reachable
    // from `&self`; a `StdRng` behind a mutex gives the shuffler (§9) an
    // injectable, storable RNG instead.
    rng: Mutex<Box<dyn RngCore + Send>>,
    _watcher: Watcher,
}

impl SolrCloudClient {
    /// Connects to the coordination service, seeds the state store, and
    /// starts watching `config.collection` in the background.
    pub fn new(config: Config, logger: Logger) -> Result<SolrCloudClient, Error> {
        let zookeeper = ZookeeperClient::connect(config.zookeeper.clone(), logger.clone())?;
        let backend: Arc<dyn CoordinationBackend> = Arc::new(zookeeper);
        let store = Arc::new(Store::new());
        let watcher = Watcher::start(
            Arc::clone(&backend),
            config.zookeeper.clone(),
            config.collection.clone(),
            Arc::clone(&store),
            logger.clone(),
        )?;

        let transport: Box<dyn Transport> = Box::new(ReqwestTransport::new(&config.http)?);
        let credentials = match (config.http.user.clone(), config.http.password.clone()) {
            (Some(user), Some(password)) => Some((user, password)),
            _ => None,
        };
        let http = HttpClient::new(transport, config.min_rf, credentials);

        let router: Box<dyn Router> = match config.router.policy {
            RouterPolicy::RoundRobin => Box::new(RoundRobinRouter::new()),
            RouterPolicy::Adaptive => Box::new(AdaptiveRouter::new(config.router.recency)),
        };

        let retrier = Retrier::new(config.retry.retries, Duration::from_millis(config.retry.backoff_ms), logger);

        Ok(SolrCloudClient {
            collection: config.collection,
            store,
            http,
            retrier,
            router,
            rng: Mutex::new(Box::new(StdRng::from_entropy())),
            _watcher: watcher,
        })
    }

    /// A cloned snapshot of the currently known cluster topology.
    pub fn cluster_state(&self) -> ClusterState {
        self.store.get()
    }

    /// Whether the background watcher currently holds live coordination
    /// watches (false while it is backed off and retrying a reconnect).
    pub fn listening(&self) -> bool {
        self._watcher.listening()
    }

    /// Whether replica URIs should be built with `https://` instead of
    /// `http://`, per the coordination service's advertised URL scheme.
    pub fn use_https(&self) -> bool {
        self.store.get().props.url_scheme.as_str() == "https"
    }

    /// Replica URIs for every live node, shuffled.
    pub fn replica_uris(&self) -> Vec<String> {
        let state = self.store.get();
        let mut rng = self.rng.lock().expect("rng lock was poisoned");
        locator::get_replica_uris(&state.props, &state.live_nodes, &mut **rng)
    }

    /// Leader URI followed by every other routable replica for `doc_id`,
    /// deduplicated.
    pub fn leaders_and_replicas(&self, doc_id: &str) -> Result<Vec<String>, Error> {
        let state = self.store.get();
        let collection = state
            .collections
            .get(&self.collection)
            .ok_or_else(|| ErrorKind::NotFound)?;
        locator::get_leaders_and_replicas(collection, doc_id)
    }

    /// The single-element leader URI list for `id` (`GetLeaders`, §6).
    pub fn get_leaders(&self, id: &str) -> Result<Vec<String>, Error> {
        let state = self.store.get();
        let collection = state
            .collections
            .get(&self.collection)
            .ok_or_else(|| ErrorKind::NotFound)?;
        Ok(vec![locator::find_leader(collection, id)?])
    }

    /// Replica URIs named by an explicit `_route_` parameter.
    pub fn replicas_from_route(&self, route: &str) -> Result<Vec<String>, Error> {
        let state = self.store.get();
        let collection = state
            .collections
            .get(&self.collection)
            .ok_or_else(|| ErrorKind::NotFound)?;
        let mut rng = self.rng.lock().expect("rng lock was poisoned");
        locator::get_replicas_from_route(collection, route, &mut **rng)
    }

    /// The shard name named by an explicit `_route_` parameter.
    pub fn shard_from_route(&self, route: &str) -> Result<String, Error> {
        let state = self.store.get();
        let collection = state
            .collections
            .get(&self.collection)
            .ok_or_else(|| ErrorKind::NotFound)?;
        locator::get_shard_from_route(collection, route)
    }

    /// Write `document`, retrying across `candidates` with the configured
    /// backoff budget.
    pub fn update(
        &self,
        candidates: &[String],
        single_doc: bool,
        document: &serde_json::Value,
        opts: &Options,
    ) -> Result<UpdateResponse, Error> {
        let router = self.router.as_ref();
        self.retrier.run(candidates.len(), |_attempt, index| {
            let node = &candidates[index];
            self.http.update(node, &self.collection, single_doc, document, opts, router)
        })
    }

    /// Query `candidates`, retrying the node selection on failure.
    pub fn select(&self, candidates: &[String], opts: &Options) -> Result<SelectResponse, Error> {
        let router = self.router.as_ref();
        self.retrier.run(candidates.len(), |_attempt, _index| {
            self.http.select(candidates, &self.collection, opts, router)
        })
    }
}
