use std::fmt;

use serde::{Deserialize, Serialize};

/// User-chosen identity of a resource, known before any remote ID exists.
///
/// `scope` is the container the name is unique within (a resource group,
/// a project, a namespace).
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct NaturalKey {
    pub scope: String,
    pub name: String,
}

impl NaturalKey {
    pub fn new(scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.scope, self.name)
    }
}
