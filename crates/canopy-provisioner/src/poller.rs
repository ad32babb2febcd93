use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use crate::cancel::Cancellation;
use crate::remote::{Diagnostic, OperationHandle, OperationStatus, RemoteClient, RemoteError};

/// Polling cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Wait between status fetches when the server gives no hint.
    pub interval: Duration,
    /// Bounds applied to server-suggested `retry_after` values.
    pub min_interval: Duration,
    pub max_interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            min_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(60),
        }
    }
}

impl PollConfig {
    fn next_wait(&self, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) => hint.clamp(self.min_interval, self.max_interval),
            None => self.interval,
        }
    }
}

/// An in-flight remote mutation, owned by the poller while it waits.
struct PendingOperation {
    handle: OperationHandle,
    polls: u32,
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("deadline elapsed while the operation was still running")]
    Timeout,

    #[error("operation failed: {0}")]
    Failed(Diagnostic),

    #[error("operation was canceled remotely")]
    RemoteCanceled,

    /// The local cancellation signal fired.
    #[error("polling interrupted")]
    Interrupted,

    /// The status endpoint no longer knows the object.
    #[error("not found")]
    NotFound,

    #[error("status fetch rejected: {0}")]
    Remote(RemoteError),
}

/// Waits for pending operations to reach a terminal state.
#[derive(Debug, Clone, Default)]
pub struct OperationPoller {
    config: PollConfig,
}

impl OperationPoller {
    pub fn new(config: PollConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Poll `handle` until it succeeds, fails, or `deadline` passes.
    ///
    /// Transient status-fetch errors resume polling. Cancellation stops
    /// polling immediately and leaves the remote operation running.
    pub async fn await_completion<C: RemoteClient + ?Sized>(
        &self,
        client: &C,
        handle: OperationHandle,
        deadline: Instant,
        cancel: &Cancellation,
    ) -> Result<Option<C::Response>, PollError> {
        let mut op = PendingOperation { handle, polls: 0 };
        let mut wait = op
            .handle
            .retry_after
            .map_or(Duration::ZERO, |hint| self.config.next_wait(Some(hint)));

        loop {
            if !wait.is_zero() {
                let wake = (Instant::now() + wait).min(deadline);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::debug!(operation = %op.handle.id, "polling interrupted");
                        return Err(PollError::Interrupted);
                    }
                    _ = tokio::time::sleep_until(wake) => {}
                }
            }

            if Instant::now() >= deadline {
                tracing::warn!(
                    operation = %op.handle.id,
                    polls = op.polls,
                    "operation still running at deadline"
                );
                return Err(PollError::Timeout);
            }

            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(operation = %op.handle.id, "polling interrupted");
                    return Err(PollError::Interrupted);
                }
                res = tokio::time::timeout_at(deadline, client.poll_status(&op.handle)) => res,
            };
            op.polls += 1;

            match status {
                Err(_elapsed) => return Err(PollError::Timeout),
                Ok(Ok(OperationStatus::Running { retry_after })) => {
                    wait = self.config.next_wait(retry_after);
                    tracing::debug!(
                        operation = %op.handle.id,
                        polls = op.polls,
                        wait = ?wait,
                        "operation still running"
                    );
                }
                Ok(Ok(OperationStatus::Succeeded(response))) => {
                    tracing::debug!(operation = %op.handle.id, polls = op.polls, "operation succeeded");
                    return Ok(response);
                }
                Ok(Ok(OperationStatus::Failed(payload))) => {
                    return Err(PollError::Failed(payload));
                }
                Ok(Ok(OperationStatus::Canceled)) => {
                    return Err(PollError::RemoteCanceled);
                }
                Ok(Err(RemoteError::Transient(msg))) => {
                    wait = self.config.interval;
                    tracing::warn!(
                        operation = %op.handle.id,
                        error = %msg,
                        "transient error fetching operation status, will retry"
                    );
                }
                Ok(Err(RemoteError::NotFound)) => return Err(PollError::NotFound),
                Ok(Err(other)) => return Err(PollError::Remote(other)),
            }
        }
    }
}
