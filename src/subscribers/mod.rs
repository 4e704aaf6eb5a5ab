//! # Event subscribers.
//!
//! [`Subscribe`] is the extension point for plugging logging, metrics, or
//! test hooks into the engine's event stream; [`SubscriberSet`] fans events
//! out to any number of them without letting a slow one block the engine.

mod set;
mod subscriber;

#[cfg(feature = "logging")]
mod log;

pub use set::SubscriberSet;
pub use subscriber::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
