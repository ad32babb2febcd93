use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::record::{ResourceState, StateKey};

/// On-disk / in-bucket layout shared by the document-backed stores.
///
/// Entries are kept as a list because JSON object keys must be strings and
/// [`StateKey`] is structured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDocument {
    pub version: u32,
    pub resources: Vec<StateEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEntry {
    pub key: StateKey,
    pub state: ResourceState,
}

impl StateDocument {
    /// Bump when the record layout changes.
    pub const VERSION: u32 = 1;

    pub fn from_slice(bytes: &[u8]) -> Result<BTreeMap<StateKey, ResourceState>, StorageError> {
        let doc: StateDocument = serde_json::from_slice(bytes)?;
        if doc.version > Self::VERSION {
            return Err(StorageError::UnsupportedVersion {
                found: doc.version,
                supported: Self::VERSION,
            });
        }
        Ok(doc
            .resources
            .into_iter()
            .map(|e| (e.key, e.state))
            .collect())
    }

    pub fn to_vec(entries: &BTreeMap<StateKey, ResourceState>) -> Result<Vec<u8>, StorageError> {
        let doc = StateDocument {
            version: Self::VERSION,
            resources: entries
                .iter()
                .map(|(key, state)| StateEntry {
                    key: key.clone(),
                    state: state.clone(),
                })
                .collect(),
        };
        Ok(serde_json::to_vec_pretty(&doc)?)
    }
}
