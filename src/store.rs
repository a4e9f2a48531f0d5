//! Thread-safe snapshot of cluster topology (§4.B).

use std::sync::Mutex;

use std::collections::BTreeMap;

use crate::cluster_state::ClusterProps;
use crate::cluster_state::ClusterState;
use crate::cluster_state::Collection;

/// Mutex-guarded holder of the latest known [`ClusterState`].
///
/// Readers get a cloned snapshot; `set_live_nodes` and `set_collections`
/// atomically replace the respective field (plus `version` for the
/// latter) without disturbing the other.
#[derive(Default)]
pub struct Store {
    state: Mutex<ClusterState>,
}

impl Store {
    pub fn new() -> Store {
        Store {
            state: Mutex::new(ClusterState::default()),
        }
    }

    /// Return a value copy of the current snapshot.
    pub fn get(&self) -> ClusterState {
        let state = self.state.lock().expect("cluster state lock was poisoned");
        state.clone()
    }

    pub fn set_live_nodes(&self, live_nodes: Vec<String>) {
        let mut state = self.state.lock().expect("cluster state lock was poisoned");
        state.live_nodes = live_nodes;
    }

    pub fn set_collection(&self, name: String, collection: Collection, version: i32) {
        let mut state = self.state.lock().expect("cluster state lock was poisoned");
        state.collections.insert(name, collection);
        state.version = version;
    }

    pub fn set_props(&self, props: ClusterProps) {
        let mut state = self.state.lock().expect("cluster state lock was poisoned");
        state.props = props;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_live_nodes_does_not_disturb_collections() {
        let store = Store::new();
        let collection = Collection {
            shards: BTreeMap::new(),
            replication_factor: "1".into(),
        };
        store.set_collection("c".into(), collection, 3);
        store.set_live_nodes(vec!["host1:8983".into()]);
        let state = store.get();
        assert_eq!(state.live_nodes, vec!["host1:8983".to_string()]);
        assert_eq!(state.version, 3);
        assert!(state.collections.contains_key("c"));
    }

    #[test]
    fn get_returns_independent_copies() {
        let store = Store::new();
        store.set_live_nodes(vec!["a".into()]);
        let mut first = store.get();
        first.live_nodes.push("b".into());
        let second = store.get();
        assert_eq!(second.live_nodes, vec!["a".to_string()]);
    }
}
