//! Block height tickers.
//!
//! A [`BlockHeightTicker`] turns periodic head reads into a sequence of strictly increasing
//! block heights, delivered one at a time to a single consumer that asks for them with
//! [`BlockHeightTicker::wait`].

use std::time::Duration;

mod builder;
mod periodic;

pub use builder::{PeriodicTickerBuilder, TickerFactory};
pub use periodic::{BlockHeightTicker, HEIGHT_SAFETY_MARGIN, Tick};

/// Default time between two head reads.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Shortest accepted polling interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);
