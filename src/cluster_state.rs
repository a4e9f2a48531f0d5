use std::collections::BTreeMap;

use serde_derive::Deserialize;
use serde_derive::Serialize;

use crate::error::Error;
use crate::error::ErrorKind;

/// Inclusive 32-bit signed hash range owned by a shard.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct HashRange {
    pub low: i32,
    pub high: i32,
}

impl HashRange {
    /// Parse a `"LOWHEX-HIGHHEX"` range as two signed 32-bit hex numbers.
    pub fn parse(range: &str) -> Result<HashRange, Error> {
        let mut parts = range.splitn(2, '-');
        let low = parts.next();
        let high = parts.next();
        let (low, high) = match (low, high) {
            (Some(low), Some(high)) => (low, high),
            _ => {
                return Err(ErrorKind::ParseError(format!("invalid hash range '{}'", range)).into())
            }
        };
        let low = i64::from_str_radix(low, 16)
            .map_err(|_| ErrorKind::ParseError(format!("invalid hash range '{}'", range)))? as i32;
        let high = i64::from_str_radix(high, 16)
            .map_err(|_| ErrorKind::ParseError(format!("invalid hash range '{}'", range)))? as i32;
        Ok(HashRange { low, high })
    }

    /// True if `hash` falls within this inclusive range.
    pub fn contains(&self, hash: i32) -> bool {
        hash >= self.low && hash <= self.high
    }
}

/// A single node-hosted copy of a shard.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct Replica {
    pub core: String,
    #[serde(rename = "base_url")]
    pub base_url: String,
    #[serde(rename = "node_name")]
    pub node_name: String,
    #[serde(default, deserialize_with = "deserialize_bool_string")]
    pub leader: bool,
    pub state: String,
}

impl Replica {
    /// A replica accepts reads/writes routing iff it is active or recovering.
    pub fn is_routable(&self) -> bool {
        self.state == "active" || self.state == "recovering"
    }
}

fn deserialize_bool_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.map(|value| value == "true").unwrap_or(false))
}

/// A hash-range partition of a collection, owning a set of replicas.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct Shard {
    #[serde(skip)]
    pub name: String,

    #[serde(deserialize_with = "deserialize_range")]
    pub range: HashRange,
    pub state: String,
    pub replicas: BTreeMap<String, Replica>,
}

fn deserialize_range<'de, D>(deserializer: D) -> Result<HashRange, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;
    let raw = String::deserialize(deserializer)?;
    HashRange::parse(&raw).map_err(serde::de::Error::custom)
}

impl Shard {
    /// A shard only serves traffic while its own state is `active`.
    pub fn is_active(&self) -> bool {
        self.state == "active"
    }

    /// The first routable replica with `leader = true`, if any.
    pub fn leader(&self) -> Option<&Replica> {
        self.replicas
            .values()
            .find(|replica| replica.leader && replica.is_routable())
    }

    /// All routable replicas, in map-iteration order.
    pub fn routable_replicas(&self) -> impl Iterator<Item = &Replica> {
        self.replicas.values().filter(|replica| replica.is_routable())
    }
}

/// A named collection of shards.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct Collection {
    pub shards: BTreeMap<String, Shard>,

    #[serde(default, rename = "replicationFactor")]
    pub replication_factor: String,
}

impl Collection {
    /// Attach shard names from map keys; `state.json` carries them implicitly.
    pub(crate) fn fill_shard_names(&mut self) {
        for (name, shard) in self.shards.iter_mut() {
            shard.name = name.clone();
        }
    }
}

/// Scheme used to build replica/node URLs; defaults to `http` when the
/// coordination service has no `clusterprops.json` node.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlScheme {
    Http,
    Https,
}

impl Default for UrlScheme {
    fn default() -> UrlScheme {
        UrlScheme::Http
    }
}

impl UrlScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlScheme::Http => "http",
            UrlScheme::Https => "https",
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct ClusterProps {
    #[serde(rename = "urlScheme", default)]
    pub url_scheme: UrlScheme,
}

impl Default for ClusterProps {
    fn default() -> ClusterProps {
        ClusterProps {
            url_scheme: UrlScheme::default(),
        }
    }
}

/// The full, immutable-once-built snapshot of cluster topology.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct ClusterState {
    pub live_nodes: Vec<String>,
    pub version: i32,
    pub collections: BTreeMap<String, Collection>,
    pub props: ClusterProps,
}

/// Parse the JSON body of `/R/collections/<collection>/state.json`.
///
/// The document is keyed by collection name at the top level, per §6.
pub fn parse_state_json(collection: &str, body: &[u8]) -> Result<Collection, Error> {
    let mut wrapper: BTreeMap<String, Collection> = serde_json::from_slice(body)
        .map_err(|_| ErrorKind::ParseError("collection state.json".into()))?;
    let mut state = wrapper
        .remove(collection)
        .ok_or_else(|| ErrorKind::ParseError(format!("collection {} missing from state.json", collection)))?;
    state.fill_shard_names();
    Ok(state)
}

/// Parse the JSON body of `/R/clusterprops.json`.
pub fn parse_cluster_props(body: &[u8]) -> Result<ClusterProps, Error> {
    serde_json::from_slice(body).map_err(|_| ErrorKind::ParseError("clusterprops.json".into()).into())
}

/// Strip the `_solr` suffix carried by live-node znode children.
pub fn strip_solr_suffix(node: &str) -> String {
    node.trim_end_matches("_solr").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_range_parses_signed_hex() {
        let range = HashRange::parse("80000000-ffffffff").unwrap();
        assert_eq!(range.low, i32::MIN);
        assert_eq!(range.high, -1);
    }

    #[test]
    fn hash_range_contains_is_inclusive() {
        let range = HashRange::parse("0-10").unwrap();
        assert!(range.contains(0));
        assert!(range.contains(0x10));
        assert!(!range.contains(0x11));
    }

    #[test]
    fn hash_range_rejects_malformed_input() {
        assert!(HashRange::parse("not-a-range-either").is_err());
        assert!(HashRange::parse("onlyonehalf").is_err());
    }

    #[test]
    fn strip_solr_suffix_only_trims_trailing() {
        assert_eq!(strip_solr_suffix("host1:8983_solr"), "host1:8983");
        assert_eq!(strip_solr_suffix("host1:8983"), "host1:8983");
    }

    #[test]
    fn cluster_props_defaults_to_http() {
        let props = ClusterProps::default();
        assert_eq!(props.url_scheme.as_str(), "http");
    }

    #[test]
    fn parse_state_json_fills_shard_names_and_unwraps_collection() {
        let body = br#"{
            "mycollection": {
                "shards": {
                    "shard1": {
                        "range": "80000000-ffffffff",
                        "state": "active",
                        "replicas": {
                            "core_node1": {
                                "core": "mycollection_shard1_replica1",
                                "base_url": "http://node1:8983/solr",
                                "node_name": "node1:8983_solr",
                                "leader": "true",
                                "state": "active"
                            }
                        }
                    }
                },
                "replicationFactor": "1"
            }
        }"#;
        let collection = parse_state_json("mycollection", body).unwrap();
        let shard = collection.shards.get("shard1").unwrap();
        assert_eq!(shard.name, "shard1");
        assert!(shard.leader().is_some());
    }
}
