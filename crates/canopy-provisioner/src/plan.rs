use std::fmt;

use canopy_core::{FieldChange, NaturalKey, ResourceSpec};
use canopy_storage::ResourceState;
use serde::Serialize;

/// What `execute` will do for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Update,
    /// A force-new field changed: delete, then create.
    Replace,
    Delete,
    Ok,
}

/// Why an entry has its action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cause {
    FirstProvision,
    /// The remote object changed (or vanished) out from under us.
    Drift,
    InSync,
    /// The declaration changed since the last apply.
    ConfigChanged,
    /// In state but no longer declared.
    Orphaned,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Replace => "replace",
            Action::Delete => "delete",
            Action::Ok => "ok",
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanEntry {
    pub kind: String,
    pub natural_key: NaturalKey,
    pub action: Action,
    pub cause: Cause,
    /// Field-level differences, desired vs observed.
    pub changes: Vec<FieldChange>,
    /// `None` for orphans.
    pub desired: Option<ResourceSpec>,
    /// `None` when nothing is recorded yet.
    pub state: Option<ResourceState>,
}

impl PlanEntry {
    pub fn is_actionable(&self) -> bool {
        self.action != Action::Ok
    }
}

pub fn has_changes(entries: &[PlanEntry]) -> bool {
    entries.iter().any(PlanEntry::is_actionable)
}
