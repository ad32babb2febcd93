#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use canopy_core::ResourceSpec;
use canopy_provisioner::remote::BoxFuture;
use canopy_provisioner::resources::openshift_cluster::model::OpenShiftManagedCluster;
use canopy_provisioner::resources::OpenShiftClusterAdapter;
use canopy_provisioner::{
    OperationHandle, OperationStatus, PollConfig, ReconcilerConfig, Reconciler, RemoteClient,
    RemoteError, Submission, Timeouts,
};
use serde_json::json;

pub const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000001";

pub type TestReconciler = Reconciler<OpenShiftClusterAdapter, Arc<FakeControlPlane>>;

enum Mutation {
    Upsert(OpenShiftManagedCluster),
    Delete,
}

struct PendingOp {
    target: String,
    mutation: Mutation,
    polls_left: u32,
}

#[derive(Default)]
struct Inner {
    objects: BTreeMap<String, OpenShiftManagedCluster>,
    operations: HashMap<String, PendingOp>,
    next_op: u64,
    /// Status fetches that answer `Running` before the outcome is revealed.
    polls_until_done: u32,
    fail_with: Option<serde_json::Value>,
    cancel_remotely: bool,
    never_finish: bool,
    transient_poll_failures: u32,
    reject_create: Option<String>,
    /// Operations finish but are then unknown to the status endpoint.
    lose_operations: bool,
}

/// In-memory stand-in for the managed cluster control plane.
///
/// Mutations are asynchronous by default: `create`/`delete` return a pending
/// operation which applies once it has been polled to completion. Reads
/// assign the computed fields and never echo the AAD secret.
pub struct FakeControlPlane {
    inner: Mutex<Inner>,
    pub creates: AtomicU32,
    pub gets: AtomicU32,
    pub deletes: AtomicU32,
    pub polls: AtomicU32,
}

impl Default for FakeControlPlane {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                polls_until_done: 1,
                ..Inner::default()
            }),
            creates: AtomicU32::new(0),
            gets: AtomicU32::new(0),
            deletes: AtomicU32::new(0),
            polls: AtomicU32::new(0),
        }
    }
}

impl FakeControlPlane {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `0` makes every mutation complete synchronously.
    pub fn set_polls_until_done(&self, n: u32) {
        self.inner.lock().unwrap().polls_until_done = n;
    }

    pub fn fail_operations_with(&self, payload: serde_json::Value) {
        self.inner.lock().unwrap().fail_with = Some(payload);
    }

    pub fn cancel_operations_remotely(&self) {
        self.inner.lock().unwrap().cancel_remotely = true;
    }

    pub fn never_finish(&self) {
        self.inner.lock().unwrap().never_finish = true;
    }

    pub fn fail_next_polls_transiently(&self, n: u32) {
        self.inner.lock().unwrap().transient_poll_failures = n;
    }

    pub fn reject_creates(&self, message: &str) {
        self.inner.lock().unwrap().reject_create = Some(message.to_string());
    }

    pub fn lose_operations(&self) {
        self.inner.lock().unwrap().lose_operations = true;
    }

    /// Place an object directly, as if someone created it out of band.
    pub fn insert(&self, id: &str, cluster: OpenShiftManagedCluster) {
        let object = materialize(id, cluster);
        self.inner
            .lock()
            .unwrap()
            .objects
            .insert(id.to_lowercase(), object);
    }

    /// Drop an object out of band.
    pub fn remove(&self, id: &str) {
        self.inner.lock().unwrap().objects.remove(&id.to_lowercase());
    }

    pub fn object(&self, id: &str) -> Option<OpenShiftManagedCluster> {
        self.inner
            .lock()
            .unwrap()
            .objects
            .get(&id.to_lowercase())
            .cloned()
    }

    pub fn object_count(&self) -> usize {
        self.inner.lock().unwrap().objects.len()
    }

    pub fn creates(&self) -> u32 {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> u32 {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }

    fn submit(&self, target: &str, mutation: Mutation) -> Submission<OpenShiftManagedCluster> {
        let mut inner = self.inner.lock().unwrap();
        if inner.polls_until_done == 0
            && inner.fail_with.is_none()
            && !inner.cancel_remotely
            && !inner.never_finish
        {
            let result = apply(&mut inner.objects, target, mutation);
            return Submission::Done(result);
        }
        inner.next_op += 1;
        let op_id = format!("op-{}", inner.next_op);
        let polls_left = inner.polls_until_done;
        inner.operations.insert(
            op_id.clone(),
            PendingOp {
                target: target.to_string(),
                mutation,
                polls_left,
            },
        );
        Submission::Pending(OperationHandle::new(op_id))
    }

    fn status(&self, handle: &OperationHandle) -> Result<OperationStatus<OpenShiftManagedCluster>, RemoteError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.transient_poll_failures > 0 {
            inner.transient_poll_failures -= 1;
            return Err(RemoteError::Transient("connection reset by peer".into()));
        }
        if inner.never_finish {
            return Ok(OperationStatus::Running { retry_after: None });
        }
        if inner.lose_operations {
            if let Some(op) = inner.operations.remove(&handle.id) {
                apply(&mut inner.objects, &op.target, op.mutation);
            }
            return Err(RemoteError::NotFound);
        }
        let Some(op) = inner.operations.get_mut(&handle.id) else {
            return Err(RemoteError::NotFound);
        };
        if op.polls_left > 1 {
            op.polls_left -= 1;
            return Ok(OperationStatus::Running { retry_after: None });
        }
        let Some(op) = inner.operations.remove(&handle.id) else {
            return Err(RemoteError::NotFound);
        };
        if let Some(payload) = inner.fail_with.clone() {
            return Ok(OperationStatus::Failed(payload));
        }
        if inner.cancel_remotely {
            return Ok(OperationStatus::Canceled);
        }
        let result = apply(&mut inner.objects, &op.target, op.mutation);
        Ok(OperationStatus::Succeeded(result))
    }
}

fn apply(
    objects: &mut BTreeMap<String, OpenShiftManagedCluster>,
    target: &str,
    mutation: Mutation,
) -> Option<OpenShiftManagedCluster> {
    match mutation {
        Mutation::Upsert(cluster) => {
            let object = materialize(target, cluster);
            objects.insert(target.to_lowercase(), object.clone());
            Some(redact(object))
        }
        Mutation::Delete => {
            objects.remove(&target.to_lowercase());
            None
        }
    }
}

/// Fill in everything the control plane computes.
fn materialize(id: &str, mut cluster: OpenShiftManagedCluster) -> OpenShiftManagedCluster {
    let name = cluster.name.clone().unwrap_or_default();
    let location = cluster.location.clone().unwrap_or_default();
    cluster.id = Some(id.to_string());

    let props = cluster.properties.get_or_insert_with(Default::default);
    props.provisioning_state = Some("Succeeded".to_string());
    props.cluster_version = Some("v3.11.154".to_string());
    props.public_hostname = Some(format!("openshift.{name}.example.com"));
    props.fqdn = Some(format!("{name}.{location}.cloudapp.azure.com"));
    if let Some(network) = props.network_profile.as_mut() {
        network.vnet_id = Some(format!("{id}/virtualNetworks/vnet-{name}"));
    }
    for router in &mut props.router_profiles {
        let router_name = router.name.get_or_insert_with(|| "default".to_string()).clone();
        router.public_subdomain = Some(format!("apps.{name}.example.com"));
        router.fqdn = Some(format!("{router_name}.{name}.example.com"));
    }
    // Pools come back in whatever order the service stores them.
    props.agent_pool_profiles.reverse();
    cluster
}

fn redact(mut cluster: OpenShiftManagedCluster) -> OpenShiftManagedCluster {
    if let Some(auth) = cluster
        .properties
        .as_mut()
        .and_then(|p| p.auth_profile.as_mut())
    {
        for idp in &mut auth.identity_providers {
            if let Some(provider) = idp.provider.as_mut() {
                provider.secret = None;
            }
        }
    }
    cluster
}

impl RemoteClient for FakeControlPlane {
    type Request = OpenShiftManagedCluster;
    type Response = OpenShiftManagedCluster;

    fn create<'a>(
        &'a self,
        id: &'a str,
        request: &'a OpenShiftManagedCluster,
    ) -> BoxFuture<'a, Result<Submission<OpenShiftManagedCluster>, RemoteError>> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let rejected = self.inner.lock().unwrap().reject_create.clone();
        let result = match rejected {
            Some(message) => Err(RemoteError::Rejected(message)),
            None => Ok(self.submit(id, Mutation::Upsert(request.clone()))),
        };
        Box::pin(std::future::ready(result))
    }

    fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<OpenShiftManagedCluster, RemoteError>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let result = self
            .object(id)
            .map(redact)
            .ok_or(RemoteError::NotFound);
        Box::pin(std::future::ready(result))
    }

    fn delete<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Submission<OpenShiftManagedCluster>, RemoteError>> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        let result = if self.object(id).is_some() {
            Ok(self.submit(id, Mutation::Delete))
        } else {
            Err(RemoteError::NotFound)
        };
        Box::pin(std::future::ready(result))
    }

    fn poll_status<'a>(
        &'a self,
        handle: &'a OperationHandle,
    ) -> BoxFuture<'a, Result<OperationStatus<OpenShiftManagedCluster>, RemoteError>> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Box::pin(std::future::ready(self.status(handle)))
    }
}

/// Short intervals so paused-clock tests advance quickly.
pub fn test_config() -> ReconcilerConfig {
    ReconcilerConfig {
        require_import: true,
        poll: PollConfig {
            interval: Duration::from_secs(10),
            min_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(60),
        },
        timeouts: Timeouts {
            create: Duration::from_secs(30 * 60),
            update: Duration::from_secs(30 * 60),
            read: Duration::from_secs(60),
            delete: Duration::from_secs(30 * 60),
        },
    }
}

pub fn reconciler(plane: &Arc<FakeControlPlane>) -> TestReconciler {
    reconciler_with(plane, test_config())
}

pub fn reconciler_with(plane: &Arc<FakeControlPlane>, config: ReconcilerConfig) -> TestReconciler {
    canopy_provisioner::logging::init_for_tests();
    Reconciler::new(
        OpenShiftClusterAdapter::new(SUBSCRIPTION),
        Arc::clone(plane),
        config,
    )
}

pub fn cluster_id(resource_group: &str, name: &str) -> String {
    format!(
        "/subscriptions/{SUBSCRIPTION}/resourceGroups/{resource_group}/providers/Microsoft.ContainerService/openShiftManagedClusters/{name}"
    )
}

/// Three pools on one shared subnet inside a /8 vnet.
pub fn cluster_spec(name: &str) -> ResourceSpec {
    ResourceSpec::from_json(json!({
        "name": name,
        "location": "East US",
        "resource_group_name": "rg1",
        "openshift_version": "v3.11",
        "network_profile": [{ "vnet_cidr": "10.0.0.0/8" }],
        "master_pool_profile": [{
            "count": 3,
            "vm_size": "Standard_D4s_v3",
            "subnet_cidr": "10.0.0.0/24",
        }],
        "infra_pool_profile": [{
            "count": 3,
            "vm_size": "Standard_D4s_v3",
            "subnet_cidr": "10.0.0.0/24",
        }],
        "compute_pool_profile": [{
            "count": 4,
            "vm_size": "Standard_D4s_v3",
            "subnet_cidr": "10.0.0.0/24",
        }],
        "tags": { "env": "test" },
    }))
    .unwrap()
}
