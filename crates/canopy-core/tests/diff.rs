use canopy_core::diff::{diff, requires_replacement};
use canopy_core::value::block;
use canopy_core::{DiffSuppress, FieldSchema, ResourceSpec, Schema, Value};

fn schema() -> Schema {
    Schema::new()
        .field("name", FieldSchema::string().required().force_new())
        .field("version", FieldSchema::string().required())
        .field("fqdn", FieldSchema::string().computed())
        .field("tenant", FieldSchema::string().optional().computed())
        .field(
            "pool",
            FieldSchema::blocks(
                Schema::new()
                    .field("count", FieldSchema::int().optional().default(3))
                    .field(
                        "vm_size",
                        FieldSchema::string()
                            .required()
                            .force_new()
                            .suppress(DiffSuppress::CaseDifference),
                    ),
            )
            .required(),
        )
}

fn observed() -> ResourceSpec {
    ResourceSpec::new()
        .with("name", "c1")
        .with("version", "v3.11")
        .with("fqdn", "c1.example.com")
        .with("tenant", "server-assigned")
        .with(
            "pool",
            vec![block([
                ("count", Value::Int(3)),
                ("vm_size", Value::from("Standard_D4s_v3")),
            ])],
        )
}

fn desired() -> ResourceSpec {
    ResourceSpec::new()
        .with("name", "c1")
        .with("version", "v3.11")
        .with(
            "pool",
            vec![block([
                ("count", Value::Int(3)),
                ("vm_size", Value::from("Standard_D4s_v3")),
            ])],
        )
}

#[test]
fn identical_user_fields_produce_no_changes() {
    assert!(diff(&schema(), &desired(), &observed()).is_empty());
}

#[test]
fn case_only_difference_is_suppressed() {
    let desired = desired().with(
        "pool",
        vec![block([
            ("count", Value::Int(3)),
            ("vm_size", Value::from("standard_d4s_v3")),
        ])],
    );
    assert!(diff(&schema(), &desired, &observed()).is_empty());
}

#[test]
fn in_place_change_is_not_force_new() {
    let desired = desired().with("version", "v4.3");
    let changes = diff(&schema(), &desired, &observed());
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].path, "version");
    assert_eq!(changes[0].old, Value::from("v3.11"));
    assert_eq!(changes[0].new, Value::from("v4.3"));
    assert!(!requires_replacement(&changes));
}

#[test]
fn nested_force_new_field_requires_replacement() {
    let desired = desired().with(
        "pool",
        vec![block([
            ("count", Value::Int(3)),
            ("vm_size", Value::from("Standard_D8s_v3")),
        ])],
    );
    let changes = diff(&schema(), &desired, &observed());
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].path, "pool.0.vm_size");
    assert!(requires_replacement(&changes));
}

#[test]
fn nested_scalar_change_is_in_place() {
    let desired = desired().with(
        "pool",
        vec![block([
            ("count", Value::Int(5)),
            ("vm_size", Value::from("Standard_D4s_v3")),
        ])],
    );
    let changes = diff(&schema(), &desired, &observed());
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].path, "pool.0.count");
    assert!(!changes[0].force_new);
}

#[test]
fn optional_computed_field_left_unset_is_ignored() {
    let changes = diff(&schema(), &desired(), &observed());
    assert!(changes.iter().all(|c| c.path != "tenant"));
}

#[test]
fn optional_computed_field_set_by_user_is_compared() {
    let desired = desired().with("tenant", "mine");
    let changes = diff(&schema(), &desired, &observed());
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].path, "tenant");
}

#[test]
fn adding_a_block_is_a_whole_field_change() {
    let pool = block([("vm_size", "Standard_D4s_v3")]);
    let desired = desired().with("pool", vec![pool.clone(), pool]);
    let changes = diff(&schema(), &desired, &observed());
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].path, "pool");
    assert!(changes[0].force_new);
}
