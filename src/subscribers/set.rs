//! # SubscriberSet: non-blocking fan-out over multiple subscribers.
//!
//! ```text
//!    Bus ─► spawn_listener ─┬─► [queue S1] ─► worker S1 ─► on_event()
//!                           ├─► [queue S2] ─► worker S2 ─► on_event()
//!                           └─► [queue SN] ─► worker SN ─► on_event()
//! ```
//!
//! Guarantees per-subscriber FIFO and panic isolation; does not guarantee
//! global ordering across subscribers or delivery under queue overflow.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{broadcast, mpsc};

use crate::events::Event;

use super::Subscribe;

/// Per-subscriber bounded queue with metadata.
struct Lane {
    name: &'static str,
    queue: mpsc::Sender<Arc<Event>>,
}

/// Composite fan-out with one worker task per subscriber.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
}

impl SubscriberSet {
    /// Creates the set and spawns one worker per subscriber.
    #[must_use]
    pub fn new(subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let mut lanes = Vec::with_capacity(subscribers.len());

        for subscriber in subscribers {
            let name = subscriber.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(subscriber.queue_capacity().max(1));

            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    let handled = subscriber.on_event(event.as_ref());
                    if std::panic::AssertUnwindSafe(handled)
                        .catch_unwind()
                        .await
                        .is_err()
                    {
                        eprintln!("[manifold] subscriber '{}' panicked", subscriber.name());
                    }
                }
            });

            lanes.push(Lane { name, queue: tx });
        }

        Self { lanes }
    }

    /// Spawns the bridge task draining the bus into the per-subscriber
    /// queues. Exits when the bus closes.
    pub(crate) fn spawn_listener(self, mut rx: broadcast::Receiver<Event>) {
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => self.emit(Arc::new(event)),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
        });
    }

    /// Fans one event out to all lanes without blocking.
    fn emit(&self, event: Arc<Event>) {
        for lane in &self.lanes {
            match lane.queue.try_send(Arc::clone(&event)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    eprintln!(
                        "[manifold] subscriber '{}' dropped event: queue full",
                        lane.name
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    eprintln!(
                        "[manifold] subscriber '{}' dropped event: worker closed",
                        lane.name
                    );
                }
            }
        }
    }
}
