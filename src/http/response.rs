//! Wire response shapes for the Solr-like update/select envelopes.

use serde_derive::Deserialize;

/// Body returned by a `/collection/update` call.
#[derive(Clone, Debug, Deserialize)]
pub struct UpdateResponse {
    #[serde(rename = "responseHeader")]
    pub response_header: UpdateResponseHeader,
    #[serde(default)]
    pub error: Option<UpdateError>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UpdateResponseHeader {
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub rf: u32,
    #[serde(default, rename = "min_rf")]
    pub min_rf: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UpdateError {
    #[serde(default)]
    pub msg: String,
}

/// Body returned by a `/collection/select` call; the envelope's shape
/// varies with the query (facets, highlighting, grouping, ...), so it is
/// kept as a raw JSON document for the caller to interpret.
#[derive(Clone, Debug, Deserialize)]
pub struct SelectResponse {
    #[serde(flatten)]
    pub body: serde_json::Value,
}
