use canopy_core::{DiffSuppress, FieldSchema, Schema, Validator};

const OS_TYPES: &[&str] = &["Linux", "Windows"];

pub fn cluster_schema() -> Schema {
    Schema::new()
        .field(
            "name",
            FieldSchema::string()
                .required()
                .force_new()
                .validate(Validator::NoEmptyStrings),
        )
        .field(
            "location",
            FieldSchema::string()
                .required()
                .force_new()
                .suppress(DiffSuppress::LocationDifference),
        )
        .field(
            "resource_group_name",
            FieldSchema::string()
                .required()
                .force_new()
                .validate(Validator::ResourceGroupName),
        )
        .field(
            "purchase_plan",
            FieldSchema::blocks(
                Schema::new()
                    .field("name", FieldSchema::string().computed())
                    .field("product", FieldSchema::string().computed())
                    .field("promotion_code", FieldSchema::string().computed())
                    .field("publisher", FieldSchema::string().computed()),
            )
            .optional()
            .computed()
            .max_items(1),
        )
        .field(
            "openshift_version",
            FieldSchema::string()
                .required()
                .validate(Validator::NoEmptyStrings),
        )
        .field("cluster_version", FieldSchema::string().computed())
        .field("public_hostname", FieldSchema::string().computed())
        .field("fqdn", FieldSchema::string().computed())
        .field(
            "network_profile",
            FieldSchema::blocks(
                Schema::new()
                    .field(
                        "vnet_cidr",
                        FieldSchema::string()
                            .required()
                            .force_new()
                            .validate(Validator::Cidr),
                    )
                    .field("vnet_id", FieldSchema::string().computed())
                    .field(
                        "peer_vnet_id",
                        FieldSchema::string()
                            .optional()
                            .validate(Validator::ResourceId),
                    ),
            )
            .required()
            .force_new()
            .max_items(1),
        )
        .field(
            "router_profiles",
            FieldSchema::blocks(
                Schema::new()
                    .field(
                        "name",
                        FieldSchema::string()
                            .optional()
                            .computed()
                            .validate(Validator::NoEmptyStrings),
                    )
                    .field("public_subdomain", FieldSchema::string().computed())
                    .field("fqdn", FieldSchema::string().computed()),
            )
            .optional()
            .max_items(1)
            .ordered_by("name"),
        )
        .field(
            "master_pool_profile",
            FieldSchema::blocks(pool_schema("master", 3, None))
                .required()
                .max_items(1),
        )
        .field(
            "infra_pool_profile",
            FieldSchema::blocks(pool_schema("infra", 3, Some("infra")))
                .required()
                .max_items(1),
        )
        .field(
            "compute_pool_profile",
            FieldSchema::blocks(pool_schema("compute", 4, Some("compute")))
                .required()
                .ordered_by("name"),
        )
        .field(
            "azure_active_directory",
            FieldSchema::blocks(
                Schema::new()
                    .field(
                        "client_id",
                        FieldSchema::string()
                            .required()
                            .force_new()
                            .validate(Validator::Uuid),
                    )
                    .field(
                        "client_secret",
                        FieldSchema::string()
                            .required()
                            .force_new()
                            .sensitive()
                            .validate(Validator::NoEmptyStrings),
                    )
                    .field(
                        "tenant_id",
                        FieldSchema::string()
                            .optional()
                            .computed()
                            .force_new()
                            .validate(Validator::UuidOrEmpty),
                    )
                    .field(
                        "customer_admin_group_id",
                        FieldSchema::string()
                            .optional()
                            .validate(Validator::NoEmptyStrings),
                    ),
            )
            .optional()
            .computed()
            .force_new()
            .max_items(1),
        )
        .field("tags", FieldSchema::string_map().optional().computed())
}

/// Master, infra and compute pools share a shape; agent pools also carry a role.
fn pool_schema(default_name: &str, default_count: i64, default_role: Option<&str>) -> Schema {
    let schema = Schema::new()
        .field(
            "name",
            FieldSchema::string()
                .optional()
                .default(default_name)
                .validate(Validator::AgentPoolName),
        )
        .field(
            "count",
            FieldSchema::int()
                .optional()
                .default(default_count)
                .validate(Validator::IntAtLeast(1)),
        )
        .field(
            "vm_size",
            FieldSchema::string()
                .required()
                .force_new()
                .suppress(DiffSuppress::CaseDifference)
                .validate(Validator::NoEmptyStrings),
        )
        .field(
            "subnet_cidr",
            FieldSchema::string()
                .required()
                .force_new()
                .validate(Validator::Cidr),
        )
        .field(
            "os_type",
            FieldSchema::string()
                .optional()
                .force_new()
                .default("Linux")
                .suppress(DiffSuppress::CaseDifference)
                .validate(Validator::StringInSlice {
                    values: OS_TYPES,
                    ignore_case: true,
                }),
        );

    match default_role {
        Some(role) => schema.field(
            "role",
            FieldSchema::string()
                .optional()
                .default(role)
                .validate(Validator::AgentPoolName),
        ),
        None => schema,
    }
}
