mod common;

use std::sync::Arc;

use canopy_core::{NaturalKey, Value};
use canopy_provisioner::resources::OpenShiftClusterAdapter;
use canopy_provisioner::{Action, Cancellation, Cause, ErrorKind, ImportRequest, Provisioner, plan};
use canopy_storage::{MemoryStore, StateKey, StateStore};
use common::{FakeControlPlane, cluster_id, cluster_spec, reconciler};

type TestProvisioner = Provisioner<OpenShiftClusterAdapter, Arc<FakeControlPlane>, MemoryStore>;

fn provisioner(plane: &Arc<FakeControlPlane>) -> TestProvisioner {
    Provisioner::new(reconciler(plane), MemoryStore::new())
}

fn key(name: &str) -> NaturalKey {
    NaturalKey::new("rg1", name)
}

#[tokio::test(start_paused = true)]
async fn apply_records_state_under_remote_id() {
    let plane = FakeControlPlane::new();
    let p = provisioner(&plane);
    let cancel = Cancellation::never();

    let state = p.apply(&cluster_spec("c1"), &cancel).await.unwrap();

    let stored = p
        .store()
        .get(&StateKey::remote("openshift_cluster", cluster_id("rg1", "c1")))
        .await
        .unwrap();
    assert_eq!(stored, Some(state));

    // Second apply finds the record and does nothing remotely.
    p.apply(&cluster_spec("c1"), &cancel).await.unwrap();
    assert_eq!(plane.creates(), 1);
    assert_eq!(p.store().len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn apply_converges_after_out_of_band_drift() {
    let plane = FakeControlPlane::new();
    let p = provisioner(&plane);
    let cancel = Cancellation::never();

    let state = p.apply(&cluster_spec("c1"), &cancel).await.unwrap();
    let mut changed = plane.object(&state.remote_id).unwrap();
    if let Some(master) = changed
        .properties
        .as_mut()
        .and_then(|props| props.master_pool_profile.as_mut())
    {
        master.count = Some(5);
    }
    plane.insert(&state.remote_id, changed);

    p.apply(&cluster_spec("c1"), &cancel).await.unwrap();

    let remote = plane.object(&state.remote_id).unwrap();
    assert_eq!(remote.properties.unwrap().master_pool_profile.unwrap().count, Some(3));
    let entries = p.plan(&[cluster_spec("c1")], &cancel).await.unwrap();
    assert!(!plan::has_changes(&entries), "{entries:?}");
}

#[tokio::test(start_paused = true)]
async fn failed_apply_leaves_store_untouched() {
    let plane = FakeControlPlane::new();
    plane.never_finish();
    let p = provisioner(&plane);

    let err = p
        .apply(&cluster_spec("c1"), &Cancellation::never())
        .await
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Timeout { .. }));
    assert!(p.store().is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn rejected_create_leaves_store_untouched() {
    let plane = FakeControlPlane::new();
    plane.reject_creates("quota exceeded for Standard_D4s_v3");
    let p = provisioner(&plane);

    let err = p
        .apply(&cluster_spec("c1"), &Cancellation::never())
        .await
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Remote(_)));
    assert!(err.to_string().contains("quota exceeded"));
    assert!(p.store().is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn refresh_drops_record_when_remote_is_gone() {
    let plane = FakeControlPlane::new();
    let p = provisioner(&plane);
    let cancel = Cancellation::never();

    let state = p.apply(&cluster_spec("c1"), &cancel).await.unwrap();
    assert!(p.refresh(&key("c1"), &cancel).await.unwrap().is_some());

    plane.remove(&state.remote_id);
    assert!(p.refresh(&key("c1"), &cancel).await.unwrap().is_none());
    assert!(p.store().is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn destroy_removes_object_and_record() {
    let plane = FakeControlPlane::new();
    let p = provisioner(&plane);
    let cancel = Cancellation::never();

    p.apply(&cluster_spec("c1"), &cancel).await.unwrap();
    p.destroy(&key("c1"), &cancel).await.unwrap();

    assert_eq!(plane.object_count(), 0);
    assert!(p.store().is_empty().await);
    // Unmanaged: nothing to do.
    p.destroy(&key("c1"), &cancel).await.unwrap();
    assert_eq!(plane.deletes(), 1);
}

#[tokio::test(start_paused = true)]
async fn import_then_apply_is_a_no_op() {
    let plane = FakeControlPlane::new();
    let cancel = Cancellation::never();

    // Created by someone else.
    provisioner(&plane)
        .apply(&cluster_spec("c1"), &cancel)
        .await
        .unwrap();

    let p = provisioner(&plane);
    let err = p.apply(&cluster_spec("c1"), &cancel).await.unwrap_err();
    let existing = err.existing_remote_id().unwrap().to_string();

    p.import(&ImportRequest::new("openshift_cluster", existing), &cancel)
        .await
        .unwrap();
    p.apply(&cluster_spec("c1"), &cancel).await.unwrap();
    assert_eq!(plane.creates(), 1);
}

#[tokio::test(start_paused = true)]
async fn import_refuses_already_managed_key() {
    let plane = FakeControlPlane::new();
    let p = provisioner(&plane);
    let cancel = Cancellation::never();

    p.apply(&cluster_spec("c1"), &cancel).await.unwrap();
    let err = p
        .import(
            &ImportRequest::new("openshift_cluster", cluster_id("rg1", "c1")),
            &cancel,
        )
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test(start_paused = true)]
async fn apply_all_runs_instances_independently() {
    let plane = FakeControlPlane::new();
    let p = provisioner(&plane);

    let mut bad = cluster_spec("c3");
    bad.remove("openshift_version");
    let err = p
        .apply_all(
            &[cluster_spec("c1"), cluster_spec("c2"), bad],
            &Cancellation::never(),
        )
        .await
        .unwrap_err();
    // Validation happens up front.
    assert!(err.is_validation());
    assert_eq!(plane.creates(), 0);

    let results = p
        .apply_all(&[cluster_spec("c1"), cluster_spec("c2")], &Cancellation::never())
        .await
        .unwrap();
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(plane.creates(), 2);
    assert_eq!(p.store().len().await, 2);
}

#[tokio::test(start_paused = true)]
async fn apply_all_rejects_duplicate_declarations() {
    let plane = FakeControlPlane::new();
    let p = provisioner(&plane);

    let err = p
        .apply_all(&[cluster_spec("c1"), cluster_spec("c1")], &Cancellation::never())
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(plane.creates(), 0);
}

#[tokio::test(start_paused = true)]
async fn plan_classifies_every_declaration() {
    let plane = FakeControlPlane::new();
    let p = provisioner(&plane);
    let cancel = Cancellation::never();

    for name in ["keep", "scale", "move", "orphan", "vanish"] {
        p.apply(&cluster_spec(name), &cancel).await.unwrap();
    }
    plane.remove(&cluster_id("rg1", "vanish"));

    let mut scale = cluster_spec("scale");
    let mut compute = scale.get_list("compute_pool_profile").unwrap().to_vec();
    if let Value::Block(pool) = &mut compute[0] {
        pool.insert("count".into(), Value::from(8_i64));
    }
    scale.set("compute_pool_profile", compute);

    let mut moved = cluster_spec("move");
    moved.set("location", "westeurope");

    let specs = [
        cluster_spec("keep"),
        scale,
        moved,
        cluster_spec("vanish"),
        cluster_spec("fresh"),
    ];
    let entries = p.plan(&specs, &cancel).await.unwrap();

    let summary: Vec<_> = entries
        .iter()
        .map(|e| (e.natural_key.name.as_str(), e.action, e.cause))
        .collect();
    assert_eq!(
        summary,
        [
            ("keep", Action::Ok, Cause::InSync),
            ("scale", Action::Update, Cause::ConfigChanged),
            ("move", Action::Replace, Cause::ConfigChanged),
            ("vanish", Action::Create, Cause::Drift),
            ("fresh", Action::Create, Cause::FirstProvision),
            ("orphan", Action::Delete, Cause::Orphaned),
        ]
    );
    assert!(plan::has_changes(&entries));
    assert_eq!(entries[1].changes[0].path, "compute_pool_profile.0.count");

    // Planning is read-only.
    assert_eq!(plane.creates(), 5);
    assert_eq!(plane.deletes(), 0);
    assert_eq!(p.store().len().await, 5);
}

#[tokio::test(start_paused = true)]
async fn plan_reports_out_of_band_drift() {
    let plane = FakeControlPlane::new();
    let p = provisioner(&plane);
    let cancel = Cancellation::never();

    let state = p.apply(&cluster_spec("c1"), &cancel).await.unwrap();
    let mut changed = plane.object(&state.remote_id).unwrap();
    if let Some(master) = changed
        .properties
        .as_mut()
        .and_then(|props| props.master_pool_profile.as_mut())
    {
        master.count = Some(5);
    }
    plane.insert(&state.remote_id, changed);

    let entries = p.plan(&[cluster_spec("c1")], &cancel).await.unwrap();
    assert_eq!(entries[0].action, Action::Update);
    assert_eq!(entries[0].cause, Cause::Drift);
}

#[tokio::test(start_paused = true)]
async fn execute_converges_and_second_plan_is_clean() {
    let plane = FakeControlPlane::new();
    let p = provisioner(&plane);
    let cancel = Cancellation::never();

    for name in ["scale", "move", "orphan"] {
        p.apply(&cluster_spec(name), &cancel).await.unwrap();
    }

    let mut scale = cluster_spec("scale");
    let mut compute = scale.get_list("compute_pool_profile").unwrap().to_vec();
    if let Value::Block(pool) = &mut compute[0] {
        pool.insert("count".into(), Value::from(8_i64));
    }
    scale.set("compute_pool_profile", compute);
    let mut moved = cluster_spec("move");
    moved.set("location", "westeurope");
    let specs = [scale, moved, cluster_spec("fresh")];

    let entries = p.plan(&specs, &cancel).await.unwrap();
    p.execute(&entries, &cancel).await.unwrap();

    assert!(plane.object(&cluster_id("rg1", "orphan")).is_none());
    let moved = plane.object(&cluster_id("rg1", "move")).unwrap();
    assert_eq!(moved.location.as_deref(), Some("westeurope"));
    assert!(plane.object(&cluster_id("rg1", "fresh")).is_some());
    assert_eq!(p.store().len().await, 3);

    let again = p.plan(&specs, &cancel).await.unwrap();
    assert!(!plan::has_changes(&again), "{again:?}");
}

#[tokio::test(start_paused = true)]
async fn destroy_all_empties_the_store() {
    let plane = FakeControlPlane::new();
    let p = provisioner(&plane);
    let cancel = Cancellation::never();

    for name in ["a1", "a2", "a3"] {
        p.apply(&cluster_spec(name), &cancel).await.unwrap();
    }
    p.destroy_all(&cancel).await.unwrap();

    assert_eq!(plane.object_count(), 0);
    assert!(p.store().list().await.unwrap().is_empty());
}
