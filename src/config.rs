//! # Engine configuration.
//!
//! [`EngineConfig`] centralizes the restart delays and event-bus sizing used
//! by the engine loop and its worker drivers.
//!
//! ## Field semantics
//! - `error_delay`: wait before restarting a worker that stopped with an
//!   unclassified error.
//! - `bounce_delay`: wait before restarting a worker that was deliberately
//!   stopped because one of its inputs changed.
//! - `bus_capacity`: event bus ring buffer size (min 1; clamped by the Bus).

use std::time::Duration;

/// Configuration for an [`Engine`](crate::Engine).
///
/// All fields are public; prefer the helper accessors over sprinkling
/// sentinel checks across call sites.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Delay before restarting a worker that stopped with an error the
    /// fatal predicate did not claim.
    pub error_delay: Duration,

    /// Delay before restarting a worker that was deliberately bounced
    /// because its dependencies changed.
    ///
    /// Kept short: a bounce is routine, not a failure.
    pub bounce_delay: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Subscribers that lag behind more than `bus_capacity` events receive
    /// `Lagged` and skip older items.
    pub bus_capacity: usize,
}

impl EngineConfig {
    /// Returns a bus capacity clamped to a minimum of 1.
    ///
    /// The `Bus` should use this value to avoid constructing an invalid
    /// channel.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for EngineConfig {
    /// Default configuration:
    ///
    /// - `error_delay = 3s` (errors back off before retrying)
    /// - `bounce_delay = 10ms` (bounces restart promptly)
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            error_delay: Duration::from_secs(3),
            bounce_delay: Duration::from_millis(10),
            bus_capacity: 1024,
        }
    }
}
