//! canopy-provisioner
//!
//! Reconcile engine for declaratively described remote resources. A
//! [`Reconciler`] drives one resource kind through create/read/update/delete
//! and import against a [`RemoteClient`], waiting out long-running remote
//! operations with the [`OperationPoller`]. [`Provisioner`] binds a
//! reconciler to a state store and adds plan/apply on top.
//!
//! Public API:
//! - `Reconciler::create_or_update` / `read` / `delete` / `import`
//! - `OperationPoller::await_completion`
//! - `Provisioner::plan` / `execute` / `apply` / `apply_all` / `refresh` / `destroy` / `import`

pub mod adapter;
pub mod cancel;
pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrate;
pub mod plan;
pub mod poller;
pub mod reconciler;
pub mod remote;
pub mod resources;

pub use crate::adapter::ResourceAdapter;
pub use crate::cancel::{CancelHandle, Cancellation};
pub use crate::config::{ProvisionerConfig, ReconcilerConfig, StateBackend, Timeouts};
pub use crate::error::{ConfigError, ErrorKind, Operation, ReconcileError};
pub use crate::orchestrate::Provisioner;
pub use crate::plan::{Action, Cause, PlanEntry};
pub use crate::poller::{OperationPoller, PollConfig, PollError};
pub use crate::reconciler::{ImportRequest, Phase, Reconciler};
pub use crate::remote::{
    OperationHandle, OperationStatus, RemoteClient, RemoteError, Submission,
};
