//! Coordination-service integration (§4.A): a `zookeeper`-backed client and
//! the background watcher thread that keeps a `Store` in sync with it.
//!
//! This is one of the crate's small set of trait boundaries (alongside
//! the HTTP `Transport`, the `Router`, and the `Clock` it depends on);
//! everything else is concrete types.

pub mod watcher;
pub mod zookeeper;

use crate::error::Error;

/// Coordination backend seam: the watcher thread talks to this instead of
/// `zookeeper::Client` directly, so tests can substitute an in-memory
/// double (`mock::CoordinationBackend`).
pub trait CoordinationBackend: Send + Sync {
    /// Read a node's raw contents and version, or `NotFound` if absent.
    fn get_data(&self, path: &str) -> Result<(Vec<u8>, i32), Error>;

    /// Read a node's children, or `NotFound` if absent.
    fn get_children(&self, path: &str) -> Result<Vec<String>, Error>;

    /// Read a node and a channel that fires once when it next changes.
    fn get_data_w(&self, path: &str) -> Result<(Vec<u8>, i32, crossbeam_channel::Receiver<()>), Error>;

    /// Read a node's children and a channel that fires once when the
    /// child set next changes.
    fn get_children_w(&self, path: &str) -> Result<(Vec<String>, crossbeam_channel::Receiver<()>), Error>;
}

impl CoordinationBackend for self::zookeeper::Client {
    fn get_data(&self, path: &str) -> Result<(Vec<u8>, i32), Error> {
        self::zookeeper::Client::get_data(self, path)
    }

    fn get_children(&self, path: &str) -> Result<Vec<String>, Error> {
        self::zookeeper::Client::get_children(self, path)
    }

    fn get_data_w(&self, path: &str) -> Result<(Vec<u8>, i32, crossbeam_channel::Receiver<()>), Error> {
        self::zookeeper::Client::get_data_w(self, path)
    }

    fn get_children_w(&self, path: &str) -> Result<(Vec<String>, crossbeam_channel::Receiver<()>), Error> {
        self::zookeeper::Client::get_children_w(self, path)
    }
}
