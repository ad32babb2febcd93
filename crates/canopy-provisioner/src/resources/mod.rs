//! Resource kinds the engine knows how to reconcile.

pub mod openshift_cluster;

pub use self::openshift_cluster::OpenShiftClusterAdapter;
