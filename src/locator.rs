//! Shard/leader/replica lookup over a cluster-state snapshot (§4.D).

use rand::seq::SliceRandom;
use rand::RngCore;

use crate::cluster_state::ClusterProps;
use crate::cluster_state::Collection;
use crate::cluster_state::Shard;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::hash;
use crate::key::CompositeKey;

/// Find the unique active shard whose range contains `key`'s hash.
pub fn find_shard(collection: &Collection, key: &str) -> Result<&Shard, Error> {
    let composite = CompositeKey::parse(key)?;
    let target = hash::hash(&composite);
    collection
        .shards
        .values()
        .find(|shard| shard.is_active() && shard.range.contains(target))
        .ok_or_else(|| ErrorKind::NotFound.into())
}

/// All routable replica base URLs of the shard owning `key`, in
/// map-iteration order.
pub fn find_live_replica_urls(collection: &Collection, key: &str) -> Result<Vec<String>, Error> {
    let shard = find_shard(collection, key)?;
    Ok(shard
        .routable_replicas()
        .map(|replica| replica.base_url.clone())
        .collect())
}

/// The leader URL for `key`'s shard, or an empty string if it has none.
pub fn find_leader(collection: &Collection, key: &str) -> Result<String, Error> {
    let shard = find_shard(collection, key)?;
    Ok(shard
        .leader()
        .map(|replica| replica.base_url.clone())
        .unwrap_or_default())
}

/// Union of the leader for `doc_id` and the live replicas for its shard
/// key, leader first, deduplicated, empty entries dropped.
pub fn get_leaders_and_replicas(collection: &Collection, doc_id: &str) -> Result<Vec<String>, Error> {
    let leader = find_leader(collection, doc_id)?;
    let shard_key = doc_id.splitn(2, '!').next().unwrap_or("");
    let route = ensure_trailing_bang(shard_key);
    let replicas = find_live_replica_urls(collection, &route)?;

    let mut seen = std::collections::HashSet::with_capacity(replicas.len() + 1);
    let mut all = Vec::with_capacity(replicas.len() + 1);
    if !leader.is_empty() {
        seen.insert(leader.clone());
        all.push(leader);
    }
    for replica in replicas {
        if replica.is_empty() || seen.contains(&replica) {
            continue;
        }
        seen.insert(replica.clone());
        all.push(replica);
    }
    Ok(all)
}

/// All live-node URLs formatted as `"<scheme>://<node>/v2/c"`, shuffled
/// using `rng` (§9: the shuffler accepts an injectable RNG so its output
/// is reproducible in tests).
pub fn get_replica_uris(props: &ClusterProps, live_nodes: &[String], rng: &mut dyn RngCore) -> Vec<String> {
    let scheme = props.url_scheme.as_str();
    let uris: Vec<String> = live_nodes
        .iter()
        .map(|node| format!("{}://{}/v2/c", scheme, node))
        .collect();
    shuffle(uris, rng)
}

/// Like `find_live_replica_urls`, but ensures `route` ends in `!` and
/// shuffles the result using `rng`.
pub fn get_replicas_from_route(collection: &Collection, route: &str, rng: &mut dyn RngCore) -> Result<Vec<String>, Error> {
    let route = ensure_trailing_bang(route);
    let replicas = find_live_replica_urls(collection, &route)?;
    Ok(shuffle(replicas, rng))
}

/// Like `find_shard`, but returns the shard's name.
pub fn get_shard_from_route(collection: &Collection, route: &str) -> Result<String, Error> {
    let route = ensure_trailing_bang(route);
    let shard = find_shard(collection, &route)?;
    Ok(shard.name.clone())
}

fn ensure_trailing_bang(route: &str) -> String {
    if route.ends_with('!') {
        route.to_string()
    } else {
        format!("{}!", route)
    }
}

/// Uniformly shuffle `items` using `rng`; a single-element list is
/// returned unchanged.
fn shuffle(mut items: Vec<String>, rng: &mut dyn RngCore) -> Vec<String> {
    if items.len() > 1 {
        items.shuffle(rng);
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster_state::HashRange;
    use crate::cluster_state::Replica;
    use std::collections::BTreeMap;

    fn replica(base_url: &str, leader: bool, state: &str) -> Replica {
        Replica {
            core: "core".into(),
            base_url: base_url.into(),
            node_name: "node".into(),
            leader,
            state: state.into(),
        }
    }

    fn one_shard_collection() -> Collection {
        let mut replicas = BTreeMap::new();
        replicas.insert("core_node1".to_string(), replica("http://leader", true, "active"));
        replicas.insert("core_node2".to_string(), replica("http://follower", false, "recovering"));
        let mut shards = BTreeMap::new();
        shards.insert(
            "shard1".to_string(),
            Shard {
                name: "shard1".into(),
                range: HashRange { low: i32::MIN, high: i32::MAX },
                state: "active".into(),
                replicas,
            },
        );
        Collection {
            shards,
            replication_factor: "2".into(),
        }
    }

    #[test]
    fn find_shard_returns_the_unique_covering_shard() {
        let collection = one_shard_collection();
        let shard = find_shard(&collection, "mykey").unwrap();
        assert_eq!(shard.name, "shard1");
    }

    #[test]
    fn find_shard_fails_with_not_found_when_no_shard_covers_the_hash() {
        let collection = Collection {
            shards: BTreeMap::new(),
            replication_factor: "1".into(),
        };
        let result = find_shard(&collection, "mykey");
        assert!(result.is_err());
    }

    #[test]
    fn find_leader_returns_the_leader_base_url() {
        let collection = one_shard_collection();
        assert_eq!(find_leader(&collection, "mykey").unwrap(), "http://leader");
    }

    #[test]
    fn get_leaders_and_replicas_puts_leader_first_and_dedupes() {
        let collection = one_shard_collection();
        let all = get_leaders_and_replicas(&collection, "mykey!abc").unwrap();
        assert_eq!(all[0], "http://leader");
        assert!(all.contains(&"http://follower".to_string()));
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn shuffle_leaves_single_element_lists_unchanged() {
        let mut rng = crate::mock::deterministic_rng();
        assert_eq!(shuffle(vec!["only".to_string()], &mut rng), vec!["only".to_string()]);
    }

    #[test]
    fn shuffle_with_an_injected_rng_is_reproducible() {
        let items = vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()];
        let first = shuffle(items.clone(), &mut crate::mock::deterministic_rng());
        let second = shuffle(items, &mut crate::mock::deterministic_rng());
        assert_eq!(first, second);
    }

    #[test]
    fn get_replica_uris_is_reproducible_with_an_injected_rng() {
        let props = ClusterProps::default();
        let live_nodes = vec!["host1:8983".to_string(), "host2:8983".to_string(), "host3:8983".to_string()];
        let first = get_replica_uris(&props, &live_nodes, &mut crate::mock::deterministic_rng());
        let second = get_replica_uris(&props, &live_nodes, &mut crate::mock::deterministic_rng());
        assert_eq!(first, second);
    }
}
