//! Thin wrapper around `zookeeper::ZooKeeper` that re-dials on session
//! loss (§4.A), grounded in the reference implementation's
//! `backend::zookeeper::Client`.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use failure::ResultExt;
use prometheus::Counter;
use prometheus::CounterVec;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::Opts;
use prometheus::Registry;
use slog::Logger;

use zookeeper::ZkError;
use zookeeper::ZkState;
use zookeeper::ZooKeeper;

use crate::config::ZkConfig;
use crate::error::Error;
use crate::error::ErrorKind;

lazy_static! {
    pub static ref ZOO_CONNECTION_COUNT: Counter = Counter::new(
        "cluster_search_client_zookeeper_connect",
        "Number of connections made to the coordination service ensemble"
    ).expect("Failed to create ZOO_CONNECTION_COUNT counter");

    pub static ref ZOO_OP_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "cluster_search_client_zookeeper_op_duration",
            "Duration (in seconds) of coordination-service operations"
        ),
        &["operation"]
    ).expect("Failed to create ZOO_OP_DURATION histogram");

    pub static ref ZOO_OP_ERRORS_COUNT: CounterVec = CounterVec::new(
        Opts::new(
            "cluster_search_client_zookeeper_op_errors",
            "Number of coordination-service operations that failed"
        ),
        &["operation"]
    ).expect("Failed to create ZOO_OP_ERRORS_COUNT counter");
}

/// Attempts to register metrics with the Registry.
///
/// Metrics that fail to register are logged and ignored.
pub fn register_metrics(logger: &Logger, registry: &Registry) {
    if let Err(err) = registry.register(Box::new(ZOO_CONNECTION_COUNT.clone())) {
        debug!(logger, "Failed to register ZOO_CONNECTION_COUNT"; "error" => ?err);
    }
    if let Err(err) = registry.register(Box::new(ZOO_OP_DURATION.clone())) {
        debug!(logger, "Failed to register ZOO_OP_DURATION"; "error" => ?err);
    }
    if let Err(err) = registry.register(Box::new(ZOO_OP_ERRORS_COUNT.clone())) {
        debug!(logger, "Failed to register ZOO_OP_ERRORS_COUNT"; "error" => ?err);
    }
}

/// Holder of the current session with its liveness flag.
struct CurrentClient {
    active: Arc<AtomicBool>,
    keeper: Arc<ZooKeeper>,
}

/// Wrapper around a `ZooKeeper` handle that transparently re-dials the
/// ensemble when the current session is reported closed.
pub struct Client {
    config: ZkConfig,
    keeper: Mutex<CurrentClient>,
    logger: Logger,
}

impl Client {
    pub fn connect(config: ZkConfig, logger: Logger) -> Result<Client, Error> {
        let keeper = Mutex::new(Client::new_session(&config, &logger)?);
        Ok(Client { config, keeper, logger })
    }

    /// Return the current session, re-dialing first if it was marked
    /// inactive by a connection-state listener.
    pub fn get(&self) -> Result<Arc<ZooKeeper>, Error> {
        let mut current = self.keeper.lock().expect("zookeeper client lock was poisoned");
        if !current.active.load(Ordering::Relaxed) {
            *current = Client::new_session(&self.config, &self.logger)?;
        }
        Ok(Arc::clone(&current.keeper))
    }

    fn new_session(config: &ZkConfig, logger: &Logger) -> Result<CurrentClient, Error> {
        info!(logger, "Connecting to coordination service"; "ensemble" => &config.ensemble);
        ZOO_CONNECTION_COUNT.inc();
        let timeout = Duration::from_secs(config.session_timeout);
        let timer = ZOO_OP_DURATION.with_label_values(&["connect"]).start_timer();
        let keeper = ZooKeeper::connect(&config.ensemble, timeout, |_| {}).map_err(|error| {
            ZOO_OP_ERRORS_COUNT.with_label_values(&["connect"]).inc();
            error
        });
        timer.observe_duration();
        let keeper = keeper.context(ErrorKind::BackendConnect)?;

        let active = Arc::new(AtomicBool::new(true));
        let notify = Arc::clone(&active);
        let session_logger = logger.clone();
        keeper.add_listener(move |state| {
            let closed = match state {
                ZkState::AuthFailed => {
                    error!(session_logger, "Coordination service authentication failed");
                    false
                }
                ZkState::Closed => {
                    warn!(session_logger, "Coordination service session closed");
                    true
                }
                ZkState::Connected => {
                    info!(session_logger, "Coordination service session established");
                    false
                }
                ZkState::ConnectedReadOnly => {
                    warn!(session_logger, "Coordination service connection is read-only");
                    false
                }
                _ => false,
            };
            if closed {
                notify.store(false, Ordering::Relaxed);
            }
        });

        Ok(CurrentClient { active, keeper: Arc::new(keeper) })
    }

    /// Wrapper for `ZooKeeper::get_data` to track metrics.
    pub fn get_data(&self, path: &str) -> Result<(Vec<u8>, i32), Error> {
        let keeper = self.get()?;
        let timer = ZOO_OP_DURATION.with_label_values(&["get_data"]).start_timer();
        let result = keeper.get_data(path, false);
        timer.observe_duration();
        match result {
            Ok((data, stat)) => Ok((data, stat.version)),
            Err(ZkError::NoNode) => Err(ErrorKind::NotFound.into()),
            Err(error) => {
                ZOO_OP_ERRORS_COUNT.with_label_values(&["get_data"]).inc();
                Err(error).context(ErrorKind::Backend("get_data"))?
            }
        }
    }

    /// Wrapper for `ZooKeeper::get_children` to track metrics.
    pub fn get_children(&self, path: &str) -> Result<Vec<String>, Error> {
        let keeper = self.get()?;
        let timer = ZOO_OP_DURATION.with_label_values(&["get_children"]).start_timer();
        let result = keeper.get_children(path, false);
        timer.observe_duration();
        match result {
            Ok(children) => Ok(children),
            Err(ZkError::NoNode) => Err(ErrorKind::NotFound.into()),
            Err(error) => {
                ZOO_OP_ERRORS_COUNT.with_label_values(&["get_children"]).inc();
                Err(error).context(ErrorKind::Backend("get_children"))?
            }
        }
    }

    /// Read `path` and install a one-shot data watch; the returned
    /// receiver fires once when the node next changes.
    pub fn get_data_w(&self, path: &str) -> Result<(Vec<u8>, i32, crossbeam_channel::Receiver<()>), Error> {
        let keeper = self.get()?;
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let timer = ZOO_OP_DURATION.with_label_values(&["get_data_w"]).start_timer();
        let result = keeper.get_data_w(path, ChannelWatcher(sender));
        timer.observe_duration();
        match result {
            Ok((data, stat)) => Ok((data, stat.version, receiver)),
            Err(ZkError::NoNode) => Err(ErrorKind::NotFound.into()),
            Err(error) => {
                ZOO_OP_ERRORS_COUNT.with_label_values(&["get_data_w"]).inc();
                Err(error).context(ErrorKind::Backend("get_data_w"))?
            }
        }
    }

    /// Read `path`'s children and install a one-shot children watch; the
    /// returned receiver fires once when the child set next changes.
    pub fn get_children_w(&self, path: &str) -> Result<(Vec<String>, crossbeam_channel::Receiver<()>), Error> {
        let keeper = self.get()?;
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let timer = ZOO_OP_DURATION.with_label_values(&["get_children_w"]).start_timer();
        let result = keeper.get_children_w(path, ChannelWatcher(sender));
        timer.observe_duration();
        match result {
            Ok(children) => Ok((children, receiver)),
            Err(ZkError::NoNode) => Err(ErrorKind::NotFound.into()),
            Err(error) => {
                ZOO_OP_ERRORS_COUNT.with_label_values(&["get_children_w"]).inc();
                Err(error).context(ErrorKind::Backend("get_children_w"))?
            }
        }
    }
}

/// Forwards a single watch firing onto a channel so the dispatch loop can
/// `select!` over coordination-service events.
struct ChannelWatcher(crossbeam_channel::Sender<()>);

impl zookeeper::Watcher for ChannelWatcher {
    fn handle(&self, _event: zookeeper::WatchedEvent) {
        let _ = self.0.send(());
    }
}
