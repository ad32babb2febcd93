use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::{FieldKind, Schema};
use crate::spec::ResourceSpec;
use crate::value::Value;

/// One user-visible field whose desired value differs from what was observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Dotted path, e.g. `compute_pool_profile.0.count`.
    pub path: String,
    /// Last observed value (`Null` when absent).
    pub old: Value,
    /// Desired value (`Null` when the user removed it).
    pub new: Value,
    /// Applying this change requires replacing the remote object.
    pub force_new: bool,
}

/// Compare desired against observed state, field by field.
///
/// Computed-only fields are ignored, as are optional+computed fields the user
/// left unset and sensitive fields the remote did not report.
/// Diff-suppression predicates are honoured. An empty result
/// means the remote object already matches the declaration.
pub fn diff(schema: &Schema, desired: &ResourceSpec, observed: &ResourceSpec) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    diff_map(
        schema,
        desired.as_map(),
        observed.as_map(),
        "",
        false,
        &mut changes,
    );
    changes
}

/// True if any change in the list forces replacement.
pub fn requires_replacement(changes: &[FieldChange]) -> bool {
    changes.iter().any(|c| c.force_new)
}

fn diff_map(
    schema: &Schema,
    desired: &BTreeMap<String, Value>,
    observed: &BTreeMap<String, Value>,
    prefix: &str,
    parent_force_new: bool,
    out: &mut Vec<FieldChange>,
) {
    for (name, field) in schema.fields() {
        if field.is_computed_only() {
            continue;
        }
        let path = format!("{prefix}{name}");
        let force_new = parent_force_new || field.force_new;
        let new = desired.get(name).filter(|v| !v.is_null());
        let old = observed.get(name).filter(|v| !v.is_null());

        match (new, old) {
            (None, _) if field.computed => {}
            // Write-only secrets are not echoed back, so absence proves nothing.
            (Some(_), None) if field.sensitive => {}
            (None, None) => {}
            (None, Some(old)) => {
                if !old.is_empty() {
                    out.push(FieldChange {
                        path,
                        old: old.clone(),
                        new: Value::Null,
                        force_new: force_new || field.has_force_new(),
                    });
                }
            }
            (Some(new), None) => {
                if !new.is_empty() {
                    out.push(FieldChange {
                        path,
                        old: Value::Null,
                        new: new.clone(),
                        force_new: force_new || field.has_force_new(),
                    });
                }
            }
            (Some(new), Some(old)) => match (&field.kind, new, old) {
                (FieldKind::Blocks(sub), Value::List(new_items), Value::List(old_items))
                    if new_items.len() == old_items.len() =>
                {
                    for (i, (n, o)) in new_items.iter().zip(old_items).enumerate() {
                        match (n, o) {
                            (Value::Block(n), Value::Block(o)) => {
                                diff_map(sub, n, o, &format!("{path}.{i}."), force_new, out)
                            }
                            _ if n != o => out.push(FieldChange {
                                path: format!("{path}.{i}"),
                                old: o.clone(),
                                new: n.clone(),
                                force_new: force_new || field.has_force_new(),
                            }),
                            _ => {}
                        }
                    }
                }
                (FieldKind::Blocks(_), _, _) => out.push(FieldChange {
                    path,
                    old: old.clone(),
                    new: new.clone(),
                    force_new: force_new || field.has_force_new(),
                }),
                (FieldKind::List(_), Value::List(new_items), Value::List(old_items))
                    if new_items.len() == old_items.len() =>
                {
                    let same = new_items
                        .iter()
                        .zip(old_items)
                        .all(|(n, o)| field.equivalent(o, n));
                    if !same {
                        out.push(FieldChange {
                            path,
                            old: old.clone(),
                            new: new.clone(),
                            force_new,
                        });
                    }
                }
                _ => {
                    if !field.equivalent(old, new) {
                        out.push(FieldChange {
                            path,
                            old: old.clone(),
                            new: new.clone(),
                            force_new,
                        });
                    }
                }
            },
        }
    }
}
