use std::collections::{BTreeMap, HashSet};

use canopy_core::suppress::normalize_location;
use canopy_core::{FieldError, ResourceSpec, ValidationError, Value};
use ipnet::IpNet;

use super::model::{
    AAD_PROVIDER_KIND, AadIdentityProvider, AgentPoolProfile, AuthProfile, IdentityProvider,
    MasterPoolProfile, NetworkProfile, OpenShiftManagedCluster, Properties, PurchasePlan,
    RouterProfile,
};

type Block = BTreeMap<String, Value>;

/// Reads fields out of one block, recording a path-qualified error for
/// every required field that is missing.
struct Fields<'a> {
    map: &'a Block,
    prefix: String,
}

impl<'a> Fields<'a> {
    fn new(map: &'a Block, prefix: impl Into<String>) -> Self {
        Self {
            map,
            prefix: prefix.into(),
        }
    }

    fn path(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    fn str(&self, key: &str) -> Option<String> {
        self.map.get(key).and_then(Value::as_str).map(str::to_string)
    }

    fn int(&self, key: &str) -> Option<i64> {
        self.map.get(key).and_then(Value::as_int)
    }

    fn required(&self, key: &str, errors: &mut Vec<FieldError>) -> Option<String> {
        let value = self.str(key);
        if value.is_none() {
            errors.push(FieldError::new(self.path(key), "required field is missing"));
        }
        value
    }
}

fn blocks<'a>(spec: &'a ResourceSpec, field: &str) -> Vec<(String, &'a Block)> {
    spec.get_list(field)
        .unwrap_or_default()
        .iter()
        .enumerate()
        .filter_map(|(i, item)| item.as_block().map(|b| (format!("{field}.{i}."), b)))
        .collect()
}

/// A pool's subnet, kept for the cross-field checks.
struct Subnet {
    path: String,
    cidr: Option<IpNet>,
}

/// Build the create/update document from a normalized spec.
pub(super) fn expand(spec: &ResourceSpec) -> Result<OpenShiftManagedCluster, ValidationError> {
    let root = Fields::new(spec.as_map(), "");
    let mut errors = Vec::new();
    let mut subnets = Vec::new();
    let mut pool_names = Vec::new();

    let name = root.required("name", &mut errors);
    let location = root.required("location", &mut errors).map(|l| normalize_location(&l));
    root.required("resource_group_name", &mut errors);
    let openshift_version = root.required("openshift_version", &mut errors);

    let plan = blocks(spec, "purchase_plan").first().map(|(prefix, b)| {
        let f = Fields::new(b, prefix.clone());
        PurchasePlan {
            name: f.str("name"),
            product: f.str("product"),
            promotion_code: f.str("promotion_code"),
            publisher: f.str("publisher"),
        }
    });

    let mut vnet = None;
    let network_profile = match blocks(spec, "network_profile").first() {
        Some((prefix, b)) => {
            let f = Fields::new(b, prefix.clone());
            let vnet_cidr = f.required("vnet_cidr", &mut errors);
            vnet = vnet_cidr.as_deref().and_then(|c| c.parse::<IpNet>().ok());
            Some(NetworkProfile {
                vnet_cidr,
                vnet_id: None,
                peer_vnet_id: f.str("peer_vnet_id"),
            })
        }
        None => {
            errors.push(FieldError::new("network_profile", "at least one block is required"));
            None
        }
    };

    let router_profiles = blocks(spec, "router_profiles")
        .into_iter()
        .map(|(prefix, b)| RouterProfile {
            name: Fields::new(b, prefix).str("name"),
            public_subdomain: None,
            fqdn: None,
        })
        .collect();

    let master_pool_profile = match blocks(spec, "master_pool_profile").as_slice() {
        [(prefix, b)] => {
            let f = Fields::new(b, prefix.clone());
            subnets.push(Subnet {
                path: f.path("subnet_cidr"),
                cidr: f.str("subnet_cidr").and_then(|c| c.parse().ok()),
            });
            pool_names.push((f.path("name"), f.str("name")));
            Some(MasterPoolProfile {
                name: f.str("name"),
                count: f.int("count"),
                vm_size: f.required("vm_size", &mut errors),
                subnet_cidr: f.required("subnet_cidr", &mut errors),
                os_type: f.str("os_type"),
            })
        }
        _ => {
            errors.push(FieldError::new("master_pool_profile", "exactly one block is required"));
            None
        }
    };

    let mut agent_pool_profiles = Vec::new();
    let infra = blocks(spec, "infra_pool_profile");
    if infra.len() != 1 {
        errors.push(FieldError::new("infra_pool_profile", "exactly one block is required"));
    }
    let compute = blocks(spec, "compute_pool_profile");
    if compute.is_empty() {
        errors.push(FieldError::new("compute_pool_profile", "at least one block is required"));
    }
    for (is_infra, (prefix, b)) in infra
        .into_iter()
        .map(|p| (true, p))
        .chain(compute.into_iter().map(|p| (false, p)))
    {
        let f = Fields::new(b, prefix);
        let role = f.str("role");
        // Reads give back one flat list; the role is what separates the pools again.
        match (is_infra, role.as_deref()) {
            (true, Some(r)) if r != "infra" => {
                errors.push(FieldError::new(f.path("role"), "the infra pool must have role \"infra\""));
            }
            (false, Some("infra")) => {
                errors.push(FieldError::new(
                    f.path("role"),
                    "role \"infra\" is reserved for infra_pool_profile",
                ));
            }
            _ => {}
        }
        subnets.push(Subnet {
            path: f.path("subnet_cidr"),
            cidr: f.str("subnet_cidr").and_then(|c| c.parse().ok()),
        });
        pool_names.push((f.path("name"), f.str("name")));
        agent_pool_profiles.push(AgentPoolProfile {
            name: f.str("name"),
            count: f.int("count"),
            vm_size: f.required("vm_size", &mut errors),
            subnet_cidr: f.required("subnet_cidr", &mut errors),
            os_type: f.str("os_type"),
            role,
        });
    }

    check_pool_names(&pool_names, &mut errors);
    check_subnets(vnet, &subnets, &mut errors);

    let auth_profile = blocks(spec, "azure_active_directory").first().map(|(prefix, b)| {
        let f = Fields::new(b, prefix.clone());
        AuthProfile {
            identity_providers: vec![IdentityProvider {
                name: Some("Azure AD".to_string()),
                provider: Some(AadIdentityProvider {
                    kind: Some(AAD_PROVIDER_KIND.to_string()),
                    client_id: f.required("client_id", &mut errors),
                    secret: f.required("client_secret", &mut errors),
                    tenant_id: f.str("tenant_id"),
                    customer_admin_group_id: f.str("customer_admin_group_id"),
                }),
            }],
        }
    });

    if !errors.is_empty() {
        return Err(ValidationError::from(errors));
    }

    let tags = spec
        .get("tags")
        .and_then(Value::as_block)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default();

    Ok(OpenShiftManagedCluster {
        id: None,
        name,
        location,
        plan,
        properties: Some(Properties {
            provisioning_state: None,
            openshift_version,
            cluster_version: None,
            public_hostname: None,
            fqdn: None,
            network_profile,
            router_profiles,
            master_pool_profile,
            agent_pool_profiles,
            auth_profile,
        }),
        tags,
    })
}

fn check_pool_names(names: &[(String, Option<String>)], errors: &mut Vec<FieldError>) {
    let mut seen = HashSet::new();
    for (path, name) in names {
        if let Some(name) = name
            && !seen.insert(name.as_str())
        {
            errors.push(FieldError::new(
                path,
                format!("pool name {name:?} is used by more than one pool"),
            ));
        }
    }
}

/// Every subnet lies inside the vnet; distinct subnets are disjoint.
/// Pools may share an identical subnet.
fn check_subnets(vnet: Option<IpNet>, subnets: &[Subnet], errors: &mut Vec<FieldError>) {
    for (i, subnet) in subnets.iter().enumerate() {
        let Some(cidr) = subnet.cidr else {
            continue;
        };
        if let Some(vnet) = vnet
            && !vnet.contains(&cidr)
        {
            errors.push(FieldError::new(
                &subnet.path,
                format!("{cidr} is not inside network_profile.0.vnet_cidr ({vnet})"),
            ));
        }
        for other in &subnets[..i] {
            if let Some(prior) = other.cidr
                && prior != cidr
                && (prior.contains(&cidr) || cidr.contains(&prior))
            {
                errors.push(FieldError::new(
                    &subnet.path,
                    format!("{cidr} overlaps {prior} ({})", other.path),
                ));
            }
        }
    }
}
