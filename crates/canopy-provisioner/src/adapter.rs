use std::collections::BTreeMap;

use canopy_core::{NaturalKey, ResourceSpec, Schema, ValidationError, Value};

/// Per-resource-kind translation between declared state and the remote
/// API's request/response shapes.
///
/// Everything here is pure: no I/O, no clocks, no shared state. Two laws
/// hold for every implementation:
/// - `flatten` populates every computed field the response carries.
/// - `flatten(expand(s))` agrees with `s` on every field the user supplied
///   (after [`Schema::normalize`]), except fields derived from the remote
///   ID such as the natural key's scope. Those are recovered only once the
///   response carries its ID.
pub trait ResourceAdapter: Send + Sync {
    type Request: Send + Sync;
    type Response: Send + Sync;

    /// Resource kind identifier, e.g. `"openshift_cluster"`.
    fn kind(&self) -> &str;

    fn schema(&self) -> &Schema;

    /// Natural identity (scope + name) declared in the resource spec.
    fn natural_key(&self, spec: &ResourceSpec) -> Result<NaturalKey, ValidationError>;

    /// Remote ID addressed by a natural key. Deterministic, so repeated
    /// creates land on the same object.
    fn remote_id(&self, key: &NaturalKey) -> String;

    /// Parse an external identity (for import) back into a natural key.
    fn parse_remote_id(&self, id: &str) -> Result<NaturalKey, ValidationError>;

    /// Build the remote request. Rejects cross-field violations the
    /// constraint table cannot express.
    fn expand(&self, spec: &ResourceSpec) -> Result<Self::Request, ValidationError>;

    fn flatten(&self, response: &Self::Response) -> ResourceSpec;

    /// The remote ID reported by a response, if any.
    fn response_id(&self, response: &Self::Response) -> Option<String>;

    /// Tags recorded in state alongside the observed spec.
    fn tags(&self, spec: &ResourceSpec) -> BTreeMap<String, String> {
        spec.get("tags")
            .and_then(Value::as_block)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }
}
