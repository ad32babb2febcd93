use std::collections::BTreeMap;
use std::fmt;

use canopy_core::{NaturalKey, ResourceSpec};
use serde::{Deserialize, Serialize};

/// How a stored record is addressed.
///
/// Before the remote system has assigned an ID the natural key is the only
/// identity available; afterwards the opaque remote ID takes over.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyId {
    Remote(String),
    Natural(NaturalKey),
}

/// Composite store key: resource kind plus identity.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct StateKey {
    pub kind: String,
    pub id: KeyId,
}

impl StateKey {
    pub fn remote(kind: impl Into<String>, remote_id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: KeyId::Remote(remote_id.into()),
        }
    }

    pub fn natural(kind: impl Into<String>, key: NaturalKey) -> Self {
        Self {
            kind: kind.into(),
            id: KeyId::Natural(key),
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.id {
            KeyId::Remote(id) => write!(f, "{}[{}]", self.kind, id),
            KeyId::Natural(key) => write!(f, "{}.{}", self.kind, key),
        }
    }
}

/// Last-known state of one managed resource instance.
///
/// A record exists only while the resource is `Present`; absence of a record
/// means `Absent`. Transient lifecycle phases are never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub kind: String,
    pub natural_key: NaturalKey,
    pub remote_id: String,
    /// Everything the remote reported at the last read, computed fields included.
    #[serde(rename = "last_observed_spec")]
    pub observed: ResourceSpec,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    pub observed_at: jiff::Timestamp,
}

impl ResourceState {
    pub fn key(&self) -> StateKey {
        StateKey::remote(&self.kind, &self.remote_id)
    }
}
