//! # manifold
//!
//! **Manifold** is a dependency-driven worker supervision library.
//!
//! You declare each long-lived worker as a [`Manifold`]: the names of the
//! workers it depends on, a start function that builds it from a snapshot of
//! those dependencies, and an optional output function exposing it to
//! dependents. The [`Engine`] keeps every installed worker alive, restarts
//! it when its inputs change, and tears the whole graph down cleanly on
//! shutdown.
//!
//! ## Features
//!
//! | Area             | Description                                                       | Key types / traits                 |
//! |------------------|-------------------------------------------------------------------|------------------------------------|
//! | **Declarations** | Describe workers, their inputs, and their outputs.                | [`Manifold`], [`Resources`]        |
//! | **Workers**      | The kill/wait contract and a task-backed implementation.          | [`Worker`], [`WorkerRef`], [`FnWorker`] |
//! | **Supervision**  | Install manifolds, restart on churn, shut down on demand.         | [`Engine`], [`EngineBuilder`]      |
//! | **Errors**       | Typed errors for installation, workers, and engine termination.   | [`InstallError`], [`WorkerError`], [`EngineError`] |
//! | **Events**       | Hook into engine lifecycle events (logging, metrics, tests).      | [`Subscribe`], [`Event`], [`EventKind`] |
//! | **Configuration**| Centralize restart delays and bus sizing.                         | [`EngineConfig`]                   |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] subscriber
//!   _(demo/reference only)_.
//!
//! ```no_run
//! use manifold::{Engine, EngineConfig, FnWorker, Manifold, WorkerError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::new(EngineConfig::default(), |_err: &WorkerError| false);
//!
//!     // A leaf worker: no inputs.
//!     engine
//!         .install(
//!             "clock",
//!             Manifold::new(Vec::<String>::new(), |_resources| async {
//!                 Ok(FnWorker::spawn(|token| async move {
//!                     token.cancelled().await;
//!                     Ok(())
//!                 }))
//!             }),
//!         )
//!         .await?;
//!
//!     // A dependent: bounced whenever "clock" comes or goes.
//!     engine
//!         .install(
//!             "display",
//!             Manifold::new(["clock"], |resources| async move {
//!                 if !resources.get("clock", None) {
//!                     // Not up yet; exit cleanly and wait to be bounced.
//!                     return Ok(FnWorker::spawn(|_| async { Ok(()) }));
//!                 }
//!                 Ok(FnWorker::spawn(|token| async move {
//!                     token.cancelled().await;
//!                     Ok(())
//!                 }))
//!             }),
//!         )
//!         .await?;
//!
//!     engine.kill();
//!     engine.wait().await;
//!     Ok(())
//! }
//! ```
//!
//! ---

mod config;
mod engine;
mod error;
mod manifold;
mod resources;
mod worker;

pub mod events;
pub mod subscribers;

// ---- Public re-exports ----

pub use config::EngineConfig;
pub use engine::{Engine, EngineBuilder, FatalPredicate};
pub use error::{EngineError, InstallError, WorkerError};
pub use events::{Event, EventKind};
pub use manifold::{Manifold, OutputFn, StartFn};
pub use resources::Resources;
pub use subscribers::Subscribe;
pub use worker::{FnWorker, Worker, WorkerRef};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
