//! # Worker driver: one start-to-termination cycle of one worker.
//!
//! A driver is a one-shot task launched by the loop. It owns no engine
//! state; the start function, the frozen [`Resources`] snapshot, and the
//! scheduling delay are all captured at launch.
//!
//! ## Flow
//! ```text
//! sleep(delay)  ──shutdown──► report stopped(Dying)
//!     │
//!     ▼
//! start(resources)  ──Err──► report stopped(err)
//!     │
//!     ▼
//! offer worker to loop  ──shutdown──► kill worker (keep waiting)
//!     │
//!     ▼
//! worker.wait()
//!     │
//!     ▼
//! report stopped(outcome)
//! ```
//!
//! The stopped report is unconditional and final; the loop relies on exactly
//! one stopped ticket per start call.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::engine::event_loop::{StartedTicket, StoppedTicket};
use crate::error::WorkerError;
use crate::events::{Bus, Event, EventKind};
use crate::manifold::StartFn;
use crate::resources::Resources;

pub(crate) struct Driver {
    pub(crate) name: String,
    pub(crate) start: StartFn,
    pub(crate) resources: Resources,
    pub(crate) delay: Duration,
    pub(crate) shutdown: CancellationToken,
    pub(crate) started_tx: mpsc::Sender<StartedTicket>,
    pub(crate) stopped_tx: mpsc::Sender<StoppedTicket>,
    pub(crate) bus: Bus,
}

impl Driver {
    /// Runs one cycle and delivers the mandatory stopped ticket.
    pub(crate) async fn run(self) {
        let name = self.name.clone();
        let stopped_tx = self.stopped_tx.clone();
        let error = self.cycle().await;
        // It is vital that this ticket be sent.
        let _ = stopped_tx.send(StoppedTicket { name, error }).await;
    }

    async fn cycle(self) -> Option<WorkerError> {
        self.bus.publish(
            Event::now(EventKind::StartScheduled)
                .with_manifold(&self.name)
                .with_delay(self.delay),
        );

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                return Some(WorkerError::Dying);
            }
            _ = time::sleep(self.delay) => {}
        }

        self.bus
            .publish(Event::now(EventKind::WorkerStarting).with_manifold(&self.name));

        let worker = match (self.start)(self.resources).await {
            Ok(worker) => worker,
            Err(error) => {
                self.bus.publish(
                    Event::now(EventKind::StartFailed)
                        .with_manifold(&self.name)
                        .with_error(error.to_string()),
                );
                return Some(error);
            }
        };

        // Offer the worker to the loop; if shutdown wins the race, the loop
        // will never adopt it, so it must die here.
        let ticket = StartedTicket {
            name: self.name.clone(),
            worker: worker.clone(),
        };
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                worker.kill();
            }
            sent = self.started_tx.send(ticket) => {
                if sent.is_err() {
                    worker.kill();
                }
            }
        }

        worker.wait().await.err()
    }
}
