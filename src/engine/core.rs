//! # Engine: the public surface over the loop task.
//!
//! [`Engine`] owns the shutdown token and the install channel; everything
//! else lives inside the loop task spawned at construction. The three
//! operations mirror the worker contract the engine itself demands of its
//! charges:
//!
//! - [`Engine::install`] — submit a manifold, blocking on the loop's
//!   validation verdict;
//! - [`Engine::kill`] — idempotent shutdown request;
//! - [`Engine::wait`] — await the loop's terminal reason.
//!
//! ```no_run
//! use manifold::{Engine, EngineConfig, FnWorker, Manifold, WorkerError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::new(EngineConfig::default(), |err: &WorkerError| {
//!         matches!(err, WorkerError::Failed { reason } if reason == "disk gone")
//!     });
//!
//!     engine
//!         .install(
//!             "heartbeat",
//!             Manifold::new(Vec::<String>::new(), |_resources| async {
//!                 Ok(FnWorker::spawn(|token| async move {
//!                     token.cancelled().await;
//!                     Ok(())
//!                 }))
//!             }),
//!         )
//!         .await?;
//!
//!     engine.kill();
//!     let reason = engine.wait().await;
//!     println!("engine stopped: {reason}");
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::engine::event_loop::{EngineLoop, InstallTicket};
use crate::error::{EngineError, InstallError, WorkerError};
use crate::events::{Bus, Event};
use crate::manifold::Manifold;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Classifies a worker's terminal error as fatal-to-the-engine.
///
/// Invoked exactly once per terminal error; must be pure.
pub type FatalPredicate = Arc<dyn Fn(&WorkerError) -> bool + Send + Sync>;

/// # Builder for constructing an [`Engine`] with optional subscribers.
pub struct EngineBuilder {
    cfg: EngineConfig,
    is_fatal: FatalPredicate,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl EngineBuilder {
    /// Creates a new builder with the given configuration.
    ///
    /// With no [`fatal_if`](Self::fatal_if) call, no worker error is fatal
    /// and the engine only stops when killed.
    pub fn new(cfg: EngineConfig) -> Self {
        Self {
            cfg,
            is_fatal: Arc::new(|_| false),
            subscribers: Vec::new(),
        }
    }

    /// Sets the fatal predicate deciding which worker errors stop the
    /// engine.
    pub fn fatal_if<F>(mut self, is_fatal: F) -> Self
    where
        F: Fn(&WorkerError) -> bool + Send + Sync + 'static,
    {
        self.is_fatal = Arc::new(is_fatal);
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive engine events through dedicated workers with
    /// bounded queues; a slow subscriber only affects itself.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the engine and spawns its loop task.
    pub fn build(self) -> Engine {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let shutdown = CancellationToken::new();

        if !self.subscribers.is_empty() {
            SubscriberSet::new(self.subscribers).spawn_listener(bus.subscribe());
        }

        // Rendezvous-capacity tickets: every send parks until the loop is
        // ready for it, so no report can outlive the loop unobserved.
        let (install_tx, install_rx) = mpsc::channel(1);
        let (started_tx, started_rx) = mpsc::channel(1);
        let (stopped_tx, stopped_rx) = mpsc::channel(1);
        let (done_tx, done_rx) = watch::channel(None);

        let engine_loop = EngineLoop::new(
            self.cfg,
            self.is_fatal,
            bus.clone(),
            shutdown.clone(),
            install_rx,
            started_tx,
            started_rx,
            stopped_tx,
            stopped_rx,
        );
        tokio::spawn(async move {
            let terminal = engine_loop.run().await;
            let _ = done_tx.send(Some(terminal));
        });

        Engine {
            install_tx,
            shutdown,
            done: done_rx,
            bus,
        }
    }
}

/// # Maintains workers for its installed manifolds, restarting them
/// whenever their dependencies change.
///
/// All engine state lives in a private loop task; this handle only carries
/// the channels to reach it. It may be shared across tasks behind an `Arc`.
pub struct Engine {
    install_tx: mpsc::Sender<InstallTicket>,
    shutdown: CancellationToken,
    done: watch::Receiver<Option<EngineError>>,
    bus: Bus,
}

impl Engine {
    /// Creates an engine with the given configuration and fatal predicate
    /// and no subscribers.
    pub fn new<F>(cfg: EngineConfig, is_fatal: F) -> Self
    where
        F: Fn(&WorkerError) -> bool + Send + Sync + 'static,
    {
        EngineBuilder::new(cfg).fatal_if(is_fatal).build()
    }

    /// Installs a manifold and starts maintaining its worker.
    ///
    /// May be called from any task. Blocks until the loop has validated the
    /// request; returns [`InstallError::ShuttingDown`] if the engine is
    /// already dying.
    pub async fn install(
        &self,
        name: impl Into<String>,
        manifold: Manifold,
    ) -> Result<(), InstallError> {
        let (reply, verdict) = oneshot::channel();
        let ticket = InstallTicket {
            name: name.into(),
            manifold,
            reply,
        };
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(InstallError::ShuttingDown),
            sent = self.install_tx.send(ticket) => {
                if sent.is_err() {
                    return Err(InstallError::ShuttingDown);
                }
                verdict.await.unwrap_or(Err(InstallError::ShuttingDown))
            }
        }
    }

    /// Requests engine shutdown. Idempotent.
    pub fn kill(&self) {
        self.shutdown.cancel();
    }

    /// Blocks until the loop has exited and every worker has reported back;
    /// yields the terminal reason.
    ///
    /// Returns [`EngineError::Dying`] after a normal [`kill`](Self::kill),
    /// or the captured fatal/protocol error otherwise.
    pub async fn wait(&self) -> EngineError {
        let mut done = self.done.clone();
        loop {
            {
                if let Some(terminal) = done.borrow_and_update().as_ref() {
                    return terminal.clone();
                }
            }
            if done.changed().await.is_err() {
                // The loop task was torn down without reporting; only the
                // runtime shutting down underneath us can cause this.
                return EngineError::Dying;
            }
        }
    }

    /// Subscribes to the engine's event stream.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }
}

impl Drop for Engine {
    /// Dropping the handle shuts the engine down; without it nobody could
    /// install into or wait on the loop anyway.
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
