//! Provenance records as stored in `se.json`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// One JSON-LD graph record: the named graph describing an entity's
/// revision history.
///
/// The identifying `@id` is a typed field; the rest of the object (normally
/// a single `@graph` array) is kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    #[serde(rename = "@id")]
    id: String,
    #[serde(flatten)]
    body: Map<String, Value>,
}

impl ProvenanceRecord {
    pub fn new(id: impl Into<String>, body: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            body,
        }
    }

    /// The record's graph name (`<entity IRI>/prov/`).
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Node objects in the record's `@graph`, or an empty slice.
    pub fn graph_nodes(&self) -> &[Value] {
        match self.body.get("@graph") {
            Some(Value::Array(nodes)) => nodes,
            _ => &[],
        }
    }

    /// SHA-256 over the record's canonical JSON (keys sorted), hex encoded.
    pub fn digest(&self) -> String {
        // serde_json::Map is key-ordered, so this serialization is stable.
        let mut canonical = self.body.clone();
        canonical.insert("@id".to_string(), Value::String(self.id.clone()));
        let text = Value::Object(canonical).to_string();
        format!("sha256:{:x}", Sha256::digest(text.as_bytes()))
    }
}
