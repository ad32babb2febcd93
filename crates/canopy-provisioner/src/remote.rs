//! Contract for the remote control plane.
//!
//! The engine never speaks a wire protocol itself. A generated SDK client,
//! an HTTP wrapper or a test double implements [`RemoteClient`] for one
//! resource kind's request/response shapes.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Opaque remote diagnostic attached to a failed operation.
pub type Diagnostic = serde_json::Value;

#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    #[error("not found")]
    NotFound,

    /// Timeouts, connection resets, throttling: the same call may be repeated.
    #[error("{0}")]
    Transient(String),

    /// The remote refused the request outright.
    #[error("{0}")]
    Rejected(String),
}

/// Handle to an in-flight asynchronous mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
    pub id: String,
    /// Server-suggested wait before the first status fetch.
    pub retry_after: Option<Duration>,
}

impl OperationHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            retry_after: None,
        }
    }
}

/// Outcome of submitting a mutation.
#[derive(Debug, Clone)]
pub enum Submission<R> {
    /// Completed synchronously, optionally with the resulting object.
    Done(Option<R>),
    /// Accepted; completion must be awaited through `poll_status`.
    Pending(OperationHandle),
}

/// One status fetch for a pending operation.
#[derive(Debug, Clone)]
pub enum OperationStatus<R> {
    Running { retry_after: Option<Duration> },
    Succeeded(Option<R>),
    Failed(Diagnostic),
    Canceled,
}

/// Remote control plane for one resource kind.
///
/// `create` is an upsert addressed by the ID derived from the natural key,
/// so repeating it after a lost response is safe.
pub trait RemoteClient: Send + Sync {
    type Request: Send + Sync;
    type Response: Send;

    fn create<'a>(
        &'a self,
        id: &'a str,
        request: &'a Self::Request,
    ) -> BoxFuture<'a, Result<Submission<Self::Response>, RemoteError>>;

    fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Self::Response, RemoteError>>;

    fn delete<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Submission<Self::Response>, RemoteError>>;

    /// Plain status fetch. Never re-issues the mutation.
    fn poll_status<'a>(
        &'a self,
        handle: &'a OperationHandle,
    ) -> BoxFuture<'a, Result<OperationStatus<Self::Response>, RemoteError>>;
}

impl<C: RemoteClient + ?Sized> RemoteClient for Arc<C> {
    type Request = C::Request;
    type Response = C::Response;

    fn create<'a>(
        &'a self,
        id: &'a str,
        request: &'a Self::Request,
    ) -> BoxFuture<'a, Result<Submission<Self::Response>, RemoteError>> {
        (**self).create(id, request)
    }

    fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Self::Response, RemoteError>> {
        (**self).get(id)
    }

    fn delete<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Submission<Self::Response>, RemoteError>> {
        (**self).delete(id)
    }

    fn poll_status<'a>(
        &'a self,
        handle: &'a OperationHandle,
    ) -> BoxFuture<'a, Result<OperationStatus<Self::Response>, RemoteError>> {
        (**self).poll_status(handle)
    }
}
