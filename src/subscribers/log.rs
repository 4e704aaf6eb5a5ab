//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//!
//! ## Output format
//! ```text
//! [installed] manifold=db
//! [start-scheduled] manifold=db delay=0ns
//! [starting] manifold=db
//! [started] manifold=db
//! [failed] manifold=db err="connection refused"
//! [shutdown-requested]
//! [engine-stopped] err="engine is shutting down"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::Subscribe;

/// Simple stdout logging subscriber.
///
/// Enabled via the `logging` feature. Not intended for production use;
/// implement a custom [`Subscribe`] for structured logging or metrics.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let manifold = e.manifold.as_deref().unwrap_or("?");
        match e.kind {
            EventKind::ManifoldInstalled => {
                println!("[installed] manifold={manifold}");
            }
            EventKind::StartScheduled => {
                println!(
                    "[start-scheduled] manifold={manifold} delay={:?}",
                    e.delay.unwrap_or_default()
                );
            }
            EventKind::WorkerStarting => {
                println!("[starting] manifold={manifold}");
            }
            EventKind::StartFailed => {
                println!("[start-failed] manifold={manifold} err={:?}", e.error);
            }
            EventKind::WorkerStarted => {
                println!("[started] manifold={manifold}");
            }
            EventKind::WorkerDiscarded => {
                println!("[discarded] manifold={manifold}");
            }
            EventKind::WorkerStopped => {
                println!("[stopped] manifold={manifold}");
            }
            EventKind::WorkerFailed => {
                println!("[failed] manifold={manifold} err={:?}", e.error);
            }
            EventKind::ShutdownRequested => {
                println!("[shutdown-requested]");
            }
            EventKind::EngineStopped => {
                println!("[engine-stopped] err={:?}", e.error);
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
