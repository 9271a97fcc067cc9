//! Per-request deadline and cancellation
//!
//! Every call to the ledger node is issued through [`RequestContext::run`], so a
//! cancelled or expired request aborts whatever network call is in flight.

use crate::error::{SubmitterError, SubmitterResult};

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    deadline: Instant,
    cancel: CancellationToken,
}

impl RequestContext {
    /// Create a context that expires `timeout` from now
    pub fn new(timeout: Duration) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            deadline: Instant::now() + timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Child whose deadline is at least `extra` from now. Parent cancellation still applies.
    pub fn extended(&self, extra: Duration) -> Self {
        Self {
            request_id: self.request_id,
            deadline: self.deadline.max(Instant::now() + extra),
            cancel: self.cancel.child_token(),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Fail fast if the request is already over
    pub fn check(&self, operation: &'static str) -> SubmitterResult<()> {
        if self.is_cancelled() {
            return Err(SubmitterError::Cancelled {
                operation,
                reason: "request cancelled",
            });
        }
        if self.remaining().is_zero() {
            return Err(SubmitterError::Cancelled {
                operation,
                reason: "deadline exceeded",
            });
        }
        Ok(())
    }

    /// Drive `fut` until it completes, the token fires, or the deadline passes
    pub async fn run<F, T>(&self, operation: &'static str, fut: F) -> SubmitterResult<T>
    where
        F: Future<Output = SubmitterResult<T>>,
    {
        self.check(operation)?;

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SubmitterError::Cancelled {
                operation,
                reason: "request cancelled",
            }),
            result = tokio::time::timeout_at(self.deadline, fut) => match result {
                Ok(inner) => inner,
                Err(_) => {
                    tracing::warn!(request_id = %self.request_id, operation, "deadline exceeded");
                    Err(SubmitterError::Cancelled {
                        operation,
                        reason: "deadline exceeded",
                    })
                }
            },
        }
    }

    /// Sleep for `duration`, waking early with `Cancelled` if the request ends
    pub async fn sleep(&self, operation: &'static str, duration: Duration) -> SubmitterResult<()> {
        self.run(operation, async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}
