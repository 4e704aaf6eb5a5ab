//! # Engine lifecycle events.
//!
//! The engine publishes a typed [`Event`] for every observable state change
//! on a broadcast [`Bus`]: manifold installation, driver scheduling, worker
//! starts and stops, shutdown. Subscribers consume these for logging,
//! metrics, or test synchronization.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
