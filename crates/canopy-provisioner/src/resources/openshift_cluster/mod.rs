//! Managed OpenShift cluster (`openshift_cluster`).
//!
//! Identified by resource group + cluster name within a subscription.

mod expand;
mod flatten;
pub mod model;
mod schema;

use canopy_core::resource_id::ResourceId;
use canopy_core::{NaturalKey, ResourceSpec, Schema, ValidationError};

use self::model::{OpenShiftManagedCluster, PROVIDER_NAMESPACE, RESOURCE_TYPE};
use crate::adapter::ResourceAdapter;

pub use self::schema::cluster_schema;

pub const KIND: &str = "openshift_cluster";

pub struct OpenShiftClusterAdapter {
    subscription_id: String,
    schema: Schema,
}

impl OpenShiftClusterAdapter {
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            schema: cluster_schema(),
        }
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }
}

impl ResourceAdapter for OpenShiftClusterAdapter {
    type Request = OpenShiftManagedCluster;
    type Response = OpenShiftManagedCluster;

    fn kind(&self) -> &str {
        KIND
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn natural_key(&self, spec: &ResourceSpec) -> Result<NaturalKey, ValidationError> {
        let field = |name: &str| {
            spec.get_str(name)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ValidationError::single(name, "required field is missing"))
        };
        let name = field("name");
        let scope = field("resource_group_name");
        match (scope, name) {
            (Ok(scope), Ok(name)) => Ok(NaturalKey::new(scope, name)),
            (Err(a), Err(b)) => Err(ValidationError::from(
                a.errors.into_iter().chain(b.errors).collect::<Vec<_>>(),
            )),
            (Err(e), _) | (_, Err(e)) => Err(e),
        }
    }

    fn remote_id(&self, key: &NaturalKey) -> String {
        ResourceId::builder()
            .segment("subscriptions", &self.subscription_id)
            .segment("resourceGroups", &key.scope)
            .segment("providers", PROVIDER_NAMESPACE)
            .segment(RESOURCE_TYPE, &key.name)
            .build()
            .to_string()
    }

    fn parse_remote_id(&self, id: &str) -> Result<NaturalKey, ValidationError> {
        let invalid = |reason: String| ValidationError::single("id", reason);
        let parsed = ResourceId::parse(id).map_err(|e| invalid(e.to_string()))?;
        let subscription = parsed
            .require("subscriptions")
            .map_err(|e| invalid(e.to_string()))?;
        if subscription != self.subscription_id {
            return Err(invalid(format!(
                "subscription {subscription:?} does not match the configured subscription {:?}",
                self.subscription_id
            )));
        }
        let provider = parsed.get("providers").unwrap_or_default();
        if !provider.eq_ignore_ascii_case(PROVIDER_NAMESPACE) {
            return Err(invalid(format!(
                "expected provider {PROVIDER_NAMESPACE}, got {provider:?}"
            )));
        }
        let scope = parsed
            .require("resourceGroups")
            .map_err(|e| invalid(e.to_string()))?;
        let name = parsed
            .require(RESOURCE_TYPE)
            .map_err(|e| invalid(e.to_string()))?;
        Ok(NaturalKey::new(scope, name))
    }

    fn expand(&self, spec: &ResourceSpec) -> Result<OpenShiftManagedCluster, ValidationError> {
        expand::expand(spec)
    }

    fn flatten(&self, response: &OpenShiftManagedCluster) -> ResourceSpec {
        flatten::flatten(response)
    }

    fn response_id(&self, response: &OpenShiftManagedCluster) -> Option<String> {
        response.id.clone().filter(|id| !id.is_empty())
    }
}
