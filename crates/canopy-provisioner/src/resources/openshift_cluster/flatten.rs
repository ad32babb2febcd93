use std::collections::BTreeMap;

use canopy_core::resource_id::ResourceId;
use canopy_core::schema::sort_blocks;
use canopy_core::suppress::normalize_location;
use canopy_core::value::block;
use canopy_core::{ResourceSpec, Value};

use super::model::{AgentPoolProfile, MasterPoolProfile, OpenShiftManagedCluster, Properties};

/// Observed spec for a read response. Sets every field the response carries,
/// computed ones included; pool lists come back sorted by name.
pub(super) fn flatten(cluster: &OpenShiftManagedCluster) -> ResourceSpec {
    let mut spec = ResourceSpec::new();
    spec.set("name", cluster.name.clone());
    spec.set(
        "location",
        cluster.location.as_deref().map(normalize_location),
    );
    spec.set(
        "resource_group_name",
        cluster
            .id
            .as_deref()
            .and_then(|id| ResourceId::parse(id).ok())
            .and_then(|id| id.get("resourceGroups").map(str::to_string)),
    );

    if let Some(plan) = &cluster.plan {
        spec.set(
            "purchase_plan",
            vec![block(compact([
                ("name", plan.name.clone()),
                ("product", plan.product.clone()),
                ("promotion_code", plan.promotion_code.clone()),
                ("publisher", plan.publisher.clone()),
            ]))],
        );
    }

    if let Some(props) = &cluster.properties {
        flatten_properties(props, &mut spec);
    }

    if !cluster.tags.is_empty() {
        spec.set(
            "tags",
            block(cluster.tags.iter().map(|(k, v)| (k.clone(), v.clone()))),
        );
    }
    spec
}

fn flatten_properties(props: &Properties, spec: &mut ResourceSpec) {
    spec.set("openshift_version", props.openshift_version.clone());
    spec.set("cluster_version", props.cluster_version.clone());
    spec.set("public_hostname", props.public_hostname.clone());
    spec.set("fqdn", props.fqdn.clone());

    if let Some(network) = &props.network_profile {
        spec.set(
            "network_profile",
            vec![block(compact([
                ("vnet_cidr", network.vnet_cidr.clone()),
                ("vnet_id", network.vnet_id.clone()),
                ("peer_vnet_id", network.peer_vnet_id.clone()),
            ]))],
        );
    }

    if !props.router_profiles.is_empty() {
        let mut routers: Vec<Value> = props
            .router_profiles
            .iter()
            .map(|r| {
                block(compact([
                    ("name", r.name.clone()),
                    ("public_subdomain", r.public_subdomain.clone()),
                    ("fqdn", r.fqdn.clone()),
                ]))
            })
            .collect();
        sort_blocks(&mut routers, "name");
        spec.set("router_profiles", routers);
    }

    if let Some(master) = &props.master_pool_profile {
        spec.set("master_pool_profile", vec![master_pool(master)]);
    }

    let (infra, compute): (Vec<&AgentPoolProfile>, Vec<&AgentPoolProfile>) = props
        .agent_pool_profiles
        .iter()
        .partition(|p| p.role.as_deref() == Some("infra"));
    if !infra.is_empty() {
        spec.set(
            "infra_pool_profile",
            infra.into_iter().map(agent_pool).collect::<Vec<_>>(),
        );
    }
    if !compute.is_empty() {
        let mut compute: Vec<Value> = compute.into_iter().map(agent_pool).collect();
        sort_blocks(&mut compute, "name");
        spec.set("compute_pool_profile", compute);
    }

    let aad = props
        .auth_profile
        .iter()
        .flat_map(|auth| &auth.identity_providers)
        .find_map(|idp| idp.provider.as_ref());
    if let Some(aad) = aad {
        spec.set(
            "azure_active_directory",
            vec![block(compact([
                ("client_id", aad.client_id.clone()),
                ("client_secret", aad.secret.clone()),
                ("tenant_id", aad.tenant_id.clone()),
                ("customer_admin_group_id", aad.customer_admin_group_id.clone()),
            ]))],
        );
    }
}

fn master_pool(p: &MasterPoolProfile) -> Value {
    block(compact([
        ("name", p.name.clone().map(Value::from)),
        ("count", p.count.map(Value::from)),
        ("vm_size", p.vm_size.clone().map(Value::from)),
        ("subnet_cidr", p.subnet_cidr.clone().map(Value::from)),
        ("os_type", p.os_type.clone().map(Value::from)),
    ]))
}

fn agent_pool(p: &AgentPoolProfile) -> Value {
    block(compact([
        ("name", p.name.clone().map(Value::from)),
        ("count", p.count.map(Value::from)),
        ("vm_size", p.vm_size.clone().map(Value::from)),
        ("subnet_cidr", p.subnet_cidr.clone().map(Value::from)),
        ("os_type", p.os_type.clone().map(Value::from)),
        ("role", p.role.clone().map(Value::from)),
    ]))
}

/// Drop absent fields so a block only carries what the remote reported.
fn compact<V: Into<Value>, const N: usize>(
    fields: [(&'static str, Option<V>); N],
) -> BTreeMap<String, Value> {
    fields
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k.to_string(), v.into())))
        .collect()
}
