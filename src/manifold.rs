//! # Manifold: the declaration of one supervised worker.
//!
//! A [`Manifold`] bundles three things:
//! - the names of the manifolds this worker depends on,
//! - a start function that builds the worker from a [`Resources`] snapshot,
//! - an optional output function projecting the running worker into a typed
//!   slot on behalf of dependents.
//!
//! Manifolds are immutable once installed. The engine restarts their workers
//! whenever a declared input gains or loses its worker.
//!
//! ```
//! use manifold::{FnWorker, Manifold};
//!
//! let db = Manifold::new(Vec::<String>::new(), |_resources| async {
//!     Ok(FnWorker::spawn(|token| async move {
//!         token.cancelled().await;
//!         Ok(())
//!     }))
//! });
//! assert!(db.inputs().is_empty());
//!
//! let api = Manifold::new(["db"], |resources| async move {
//!     if !resources.get("db", None) {
//!         // Dependency not up yet: do what little we can and exit cleanly;
//!         // the engine will bounce us once db is running.
//!         return Ok(FnWorker::spawn(|_| async { Ok(()) }));
//!     }
//!     Ok(FnWorker::spawn(|token| async move {
//!         token.cancelled().await;
//!         Ok(())
//!     }))
//! });
//! assert_eq!(api.inputs(), ["db"]);
//! ```

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::WorkerError;
use crate::resources::Resources;
use crate::worker::WorkerRef;

/// Start function: builds a worker from a dependency snapshot.
///
/// Must return exactly one of a live worker or an error. Once it returns a
/// worker, that worker's termination is the sole signal that its activity
/// has ended.
pub type StartFn =
    Arc<dyn Fn(Resources) -> BoxFuture<'static, Result<WorkerRef, WorkerError>> + Send + Sync>;

/// Output function: projects a running worker into a dependent's typed slot.
///
/// Must not block and must not mutate the worker. Returns `false` on a
/// type-mismatch or unsupported projection.
pub type OutputFn = Arc<dyn Fn(&WorkerRef, &mut dyn Any) -> bool + Send + Sync>;

/// # Declaration describing how to build and expose one worker.
#[derive(Clone)]
pub struct Manifold {
    inputs: Vec<String>,
    start: StartFn,
    output: Option<OutputFn>,
}

impl Manifold {
    /// Creates a manifold from its declared inputs and start function.
    ///
    /// Input names are opaque strings, unique within an engine; the engine
    /// rejects duplicates at install time.
    pub fn new<I, S, F, Fut>(inputs: I, start: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Resources) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<WorkerRef, WorkerError>> + Send + 'static,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            start: Arc::new(move |resources| start(resources).boxed()),
            output: None,
        }
    }

    /// Attaches an output projection invoked by the accessors of dependents.
    pub fn with_output<F>(mut self, output: F) -> Self
    where
        F: Fn(&WorkerRef, &mut dyn Any) -> bool + Send + Sync + 'static,
    {
        self.output = Some(Arc::new(output));
        self
    }

    /// Returns the declared input names, in declaration order.
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub(crate) fn start_fn(&self) -> StartFn {
        Arc::clone(&self.start)
    }

    pub(crate) fn output_fn(&self) -> Option<OutputFn> {
        self.output.clone()
    }
}
