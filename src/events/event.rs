//! # Runtime events emitted by the engine loop and worker drivers.
//!
//! [`EventKind`] classifies what happened; [`Event`] carries the metadata
//! (manifold name, error text, scheduling delay, timestamps).
//!
//! ## Lifecycle flow
//! ```text
//! install(name, manifold)
//!   → ManifoldInstalled
//!   → StartScheduled (delay=0)
//!   → WorkerStarting
//!   → WorkerStarted            (or StartFailed)
//!
//! input changed:
//!   → WorkerStopped            (bounced worker reports back)
//!   → StartScheduled (delay=bounce_delay)
//!   → WorkerStarting → WorkerStarted
//!
//! kill():
//!   → ShutdownRequested
//!   → WorkerStopped / WorkerDiscarded per worker
//!   → EngineStopped
//! ```
//!
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically, so consumers can order events delivered through async
//! channels.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of engine events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Installation ===
    /// A manifold passed validation and was added to the engine.
    ManifoldInstalled,

    // === Driver lifecycle ===
    /// A driver was launched and will attempt a start after `delay`.
    StartScheduled,
    /// A driver finished its delay and is invoking the start function.
    WorkerStarting,
    /// The start function failed; no worker was produced.
    StartFailed,
    /// A worker was handed over to the loop and adopted.
    WorkerStarted,
    /// A freshly started worker was killed instead of adopted, because the
    /// engine is dying or the manifold was asked to stop meanwhile.
    WorkerDiscarded,

    // === Worker termination ===
    /// A worker's activity ended cleanly.
    WorkerStopped,
    /// A worker's activity ended with an error.
    WorkerFailed,

    // === Engine lifecycle ===
    /// The shutdown token fired; the engine is winding down.
    ShutdownRequested,
    /// The loop exited; `error` carries the terminal reason.
    EngineStopped,
}

/// Engine event with optional metadata.
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp (may go backwards, use for logging only).
    pub at: SystemTime,
    /// The kind of event.
    pub kind: EventKind,
    /// Name of the manifold this event concerns, if any.
    pub manifold: Option<String>,
    /// Error message, if the event represents a failure or carries a
    /// termination reason.
    pub error: Option<String>,
    /// Scheduling delay (for [`EventKind::StartScheduled`]).
    pub delay: Option<Duration>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            manifold: None,
            error: None,
            delay: None,
        }
    }

    /// Attaches a manifold name.
    pub fn with_manifold(mut self, name: impl Into<String>) -> Self {
        self.manifold = Some(name.into());
        self
    }

    /// Attaches an error message.
    pub fn with_error(mut self, msg: impl Into<String>) -> Self {
        self.error = Some(msg.into());
        self
    }

    /// Attaches a scheduling delay.
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay = Some(d);
        self
    }
}
