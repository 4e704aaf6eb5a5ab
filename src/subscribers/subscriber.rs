//! # Event subscriber trait.
//!
//! Each subscriber gets a dedicated worker task and a bounded queue. Slow
//! processing only backs up that subscriber's own queue; once full, further
//! events are dropped for it (with a warning on stderr) while the engine
//! and the other subscribers continue unaffected. Panics inside a handler
//! are caught and isolated.

use async_trait::async_trait;

use crate::events::Event;

/// Event subscriber for engine observability.
///
/// ### Rules
/// - `on_event` runs in a dedicated worker task, never in the engine loop.
/// - Events arrive in publication order (per subscriber, FIFO).
/// - Handle errors internally; a panic is caught but the event is lost.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    async fn on_event(&self, event: &Event);

    /// Returns the subscriber name used in warnings.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity for this subscriber.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
