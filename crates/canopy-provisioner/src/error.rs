use std::fmt;
use std::time::Duration;

use canopy_core::{NaturalKey, ValidationError};
use canopy_storage::StorageError;
use thiserror::Error;

use crate::remote::RemoteError;

/// The reconcile step an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Read,
    Delete,
    Import,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Read => "read",
            Operation::Delete => "delete",
            Operation::Import => "import",
        })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    /// Bad input spec. Never retried, never sent to the remote.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Found a pre-existing remote object while import-on-create is disallowed.
    #[error("already exists with id {remote_id:?}; import it to bring it under management")]
    AlreadyExists { remote_id: String },

    #[error("remote object not found")]
    NotFound,

    #[error("{operation} did not complete within {timeout:?}")]
    Timeout {
        operation: Operation,
        timeout: Duration,
    },

    /// The caller's cancellation signal fired. The remote mutation, if any,
    /// keeps running out-of-band.
    #[error("canceled while waiting for {operation}")]
    Canceled { operation: Operation },

    #[error("{operation} failed remotely: {payload}")]
    RemoteOperationFailed {
        operation: Operation,
        payload: serde_json::Value,
    },

    /// Safe to retry the same call.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    #[error("remote API rejected the request: {0}")]
    Remote(String),

    #[error("state store error: {0}")]
    State(#[from] StorageError),
}

/// Error surfaced by every reconcile operation.
///
/// Always carries the resource kind and natural key so the operator can
/// tell which declaration failed.
#[derive(Debug, Error)]
#[error("{resource_kind} {natural_key}: {kind}")]
pub struct ReconcileError {
    pub resource_kind: String,
    pub natural_key: String,
    #[source]
    pub kind: ErrorKind,
}

impl ReconcileError {
    pub fn new(resource_kind: &str, natural_key: &NaturalKey, kind: impl Into<ErrorKind>) -> Self {
        Self {
            resource_kind: resource_kind.to_string(),
            natural_key: natural_key.to_string(),
            kind: kind.into(),
        }
    }

    /// For failures before a natural key could be derived from the resource spec.
    pub fn unkeyed(resource_kind: &str, kind: impl Into<ErrorKind>) -> Self {
        Self {
            resource_kind: resource_kind.to_string(),
            natural_key: "(unknown)".to_string(),
            kind: kind.into(),
        }
    }

    /// Transient failures and poll timeouts may be retried with the same call.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::TransientNetwork(_) | ErrorKind::Timeout { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound)
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.kind, ErrorKind::Validation(_))
    }

    /// The discovered remote ID, if this is an `AlreadyExists` error.
    pub fn existing_remote_id(&self) -> Option<&str> {
        match &self.kind {
            ErrorKind::AlreadyExists { remote_id } => Some(remote_id),
            _ => None,
        }
    }
}

impl ErrorKind {
    /// Classify a remote client error for the given operation.
    pub fn from_remote(operation: Operation, err: RemoteError) -> Self {
        match err {
            RemoteError::NotFound => ErrorKind::NotFound,
            RemoteError::Transient(msg) => ErrorKind::TransientNetwork(msg),
            RemoteError::Rejected(msg) => {
                ErrorKind::Remote(format!("{operation}: {msg}"))
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("config_version {found} is newer than this build supports ({supported})")]
    TooNew { found: u32, supported: u32 },

    #[error("config is not a JSON object")]
    NotAnObject,

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Walk the full error chain and join all causes into one string.
///
/// Remote SDK errors often have terse `Display` impls but useful detail
/// further down the source chain.
pub fn format_err_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
