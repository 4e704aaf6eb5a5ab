//! # Worker abstraction and function-backed worker implementation.
//!
//! This module defines the [`Worker`] trait (the kill/wait contract every
//! supervised activity honors) and a convenient task-backed implementation
//! [`FnWorker`]. The common handle type is [`WorkerRef`], an
//! `Arc<dyn Worker>` suitable for sharing between a driver and the loop.
//!
//! The engine treats workers as black boxes: it kills them when their
//! dependencies change or the engine shuts down, and it trusts their `wait`
//! to report the terminal outcome exactly once per activity.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;

/// # Shared handle to a worker.
///
/// The driver keeps one clone to await termination; the loop keeps another
/// to kill the worker on dependency churn or shutdown.
pub type WorkerRef = Arc<dyn Worker>;

/// # A long-lived, cancelable activity.
///
/// Workers may exit cleanly on their own (this is not an error) and may be
/// killed multiple times; only the first kill has effect.
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    /// Requests termination. Idempotent and non-blocking.
    fn kill(&self);

    /// Blocks until the activity has finished.
    ///
    /// Returns `Ok(())` on clean exit or the terminal error on failure.
    /// Must be callable from multiple tasks; every caller observes the same
    /// outcome.
    async fn wait(&self) -> Result<(), WorkerError>;

    /// Concrete-type access for output projections.
    ///
    /// A manifold's output function downcasts through this to reach the
    /// worker state it projects into dependents' slots.
    fn as_any(&self) -> &dyn Any;
}

/// # Task-backed worker implementation.
///
/// [`FnWorker::spawn`] runs a closure as a tokio task and wires it into the
/// worker contract: `kill` cancels the token handed to the closure, `wait`
/// observes the task's result through a watch channel.
///
/// ```
/// use tokio_util::sync::CancellationToken;
/// use manifold::{FnWorker, WorkerRef};
///
/// # async fn demo() {
/// let w: WorkerRef = FnWorker::spawn(|token: CancellationToken| async move {
///     token.cancelled().await;
///     Ok(())
/// });
/// w.kill();
/// assert!(w.wait().await.is_ok());
/// # }
/// ```
pub struct FnWorker {
    token: CancellationToken,
    done: watch::Receiver<Option<Result<(), WorkerError>>>,
}

impl FnWorker {
    /// Spawns the closure and returns the worker as a shared handle.
    ///
    /// The closure receives a [`CancellationToken`] and should exit promptly
    /// once it fires.
    pub fn spawn<F, Fut>(func: F) -> WorkerRef
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), WorkerError>> + Send + 'static,
    {
        let token = CancellationToken::new();
        let (tx, rx) = watch::channel(None);
        let activity = token.clone();
        tokio::spawn(async move {
            let outcome = func(activity).await;
            let _ = tx.send(Some(outcome));
        });
        Arc::new(Self { token, done: rx })
    }
}

#[async_trait]
impl Worker for FnWorker {
    fn kill(&self) {
        self.token.cancel();
    }

    async fn wait(&self) -> Result<(), WorkerError> {
        let mut rx = self.done.clone();
        loop {
            {
                if let Some(outcome) = rx.borrow_and_update().as_ref() {
                    return outcome.clone();
                }
            }
            if rx.changed().await.is_err() {
                // The task was torn down without reporting: it panicked or
                // the runtime is shutting down.
                return Err(WorkerError::failed("worker task aborted"));
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clean_exit_reports_ok() {
        let w = FnWorker::spawn(|_token| async { Ok(()) });
        assert!(w.wait().await.is_ok());
    }

    #[tokio::test]
    async fn kill_cancels_the_activity() {
        let w = FnWorker::spawn(|token: CancellationToken| async move {
            token.cancelled().await;
            Ok(())
        });
        w.kill();
        w.kill(); // idempotent
        assert!(w.wait().await.is_ok());
    }

    #[tokio::test]
    async fn failure_is_observed_by_every_waiter() {
        let w = FnWorker::spawn(|_token| async { Err(WorkerError::failed("boom")) });
        let first = w.wait().await;
        let second = w.wait().await;
        assert_eq!(first, Err(WorkerError::failed("boom")));
        assert_eq!(first, second);
    }
}
