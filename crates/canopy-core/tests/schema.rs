use canopy_core::schema::REDACTED;
use canopy_core::value::block;
use canopy_core::{DiffSuppress, FieldSchema, ResourceSpec, Schema, Validator, Value};

fn pool_schema() -> Schema {
    Schema::new()
        .field(
            "name",
            FieldSchema::string()
                .optional()
                .default("master")
                .validate(Validator::AgentPoolName),
        )
        .field("count", FieldSchema::int().optional().default(3))
        .field(
            "vm_size",
            FieldSchema::string()
                .required()
                .force_new()
                .suppress(DiffSuppress::CaseDifference),
        )
}

fn cluster_schema() -> Schema {
    Schema::new()
        .field(
            "name",
            FieldSchema::string()
                .required()
                .force_new()
                .validate(Validator::NoEmptyStrings),
        )
        .field("fqdn", FieldSchema::string().computed())
        .field(
            "pool",
            FieldSchema::blocks(pool_schema()).required().max_items(1),
        )
        .field(
            "secret",
            FieldSchema::string().optional().sensitive(),
        )
        .field("tags", FieldSchema::string_map().optional())
}

fn valid_spec() -> ResourceSpec {
    ResourceSpec::new()
        .with("name", "c1")
        .with("pool", vec![block([("vm_size", "Standard_D4s_v3")])])
}

#[test]
fn valid_spec_passes() {
    let schema = cluster_schema();
    let spec = schema.apply_defaults(&valid_spec());
    assert!(schema.validate(&spec).is_ok());
}

#[test]
fn missing_required_fields_are_all_reported() {
    let schema = cluster_schema();
    let err = schema.validate(&ResourceSpec::new()).unwrap_err();
    assert!(err.has_path("name"));
    assert!(err.has_path("pool"));
    assert_eq!(err.errors.len(), 2);
}

#[test]
fn computed_only_field_cannot_be_supplied() {
    let schema = cluster_schema();
    let spec = valid_spec().with("fqdn", "c1.example.com");
    let err = schema.validate(&spec).unwrap_err();
    assert!(err.has_path("fqdn"));
}

#[test]
fn unknown_field_is_rejected() {
    let schema = cluster_schema();
    let spec = valid_spec().with("colour", "blue");
    let err = schema.validate(&spec).unwrap_err();
    assert!(err.has_path("colour"));
}

#[test]
fn nested_errors_carry_the_element_path() {
    let schema = cluster_schema();
    let spec = ResourceSpec::new().with("name", "c1").with(
        "pool",
        vec![block([
            ("name", Value::from("Master_Pool")),
            ("count", Value::from("three")),
        ])],
    );
    let err = schema.validate(&spec).unwrap_err();
    assert!(err.has_path("pool.0.name"));
    assert!(err.has_path("pool.0.count"));
    assert!(err.has_path("pool.0.vm_size"));
}

#[test]
fn max_items_is_enforced() {
    let schema = cluster_schema();
    let pool = block([("vm_size", "Standard_D4s_v3")]);
    let spec = ResourceSpec::new()
        .with("name", "c1")
        .with("pool", vec![pool.clone(), pool]);
    let err = schema.validate(&spec).unwrap_err();
    assert!(err.has_path("pool"));
}

#[test]
fn empty_name_fails_validator() {
    let schema = cluster_schema();
    let spec = valid_spec().with("name", "  ");
    let err = schema.validate(&spec).unwrap_err();
    assert!(err.has_path("name"));
    assert!(err.to_string().contains("must not be empty"));
}

#[test]
fn defaults_fill_nested_blocks() {
    let schema = cluster_schema();
    let spec = schema.apply_defaults(&valid_spec());
    let pool = spec.get_block("pool").unwrap();
    assert_eq!(pool.get("name"), Some(&Value::from("master")));
    assert_eq!(pool.get("count"), Some(&Value::Int(3)));
}

#[test]
fn defaults_do_not_override_user_values() {
    let schema = cluster_schema();
    let spec = ResourceSpec::new().with("name", "c1").with(
        "pool",
        vec![block([
            ("vm_size", Value::from("Standard_D4s_v3")),
            ("count", Value::Int(5)),
        ])],
    );
    let spec = schema.apply_defaults(&spec);
    assert_eq!(spec.get_block("pool").unwrap().get("count"), Some(&Value::Int(5)));
}

#[test]
fn user_view_strips_computed_fields() {
    let schema = cluster_schema();
    let observed = valid_spec().with("fqdn", "c1.example.com");
    let view = schema.user_view(&observed);
    assert!(!view.contains("fqdn"));
    assert!(view.contains("name"));
}

#[test]
fn redact_hides_sensitive_values() {
    let schema = cluster_schema();
    let spec = valid_spec().with("secret", "hunter2");
    let redacted = schema.redact(&spec);
    assert_eq!(redacted.get_str("secret"), Some(REDACTED));
    assert_eq!(redacted.get_str("name"), Some("c1"));
}

#[test]
fn spec_parses_from_plain_json() {
    let spec = ResourceSpec::from_json(serde_json::json!({
        "name": "c1",
        "pool": [{"vm_size": "Standard_D4s_v3", "count": 4}],
        "tags": {"env": "prod"},
    }))
    .unwrap();
    assert_eq!(spec.get_str("name"), Some("c1"));
    assert_eq!(spec.get_block("pool").unwrap().get("count"), Some(&Value::Int(4)));
    assert!(cluster_schema().validate(&spec).is_ok());
}
