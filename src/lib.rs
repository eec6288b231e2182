//! chain-poller follows an EVM chain over plain HTTP JSON-RPC.
//!
//! The crate has two building blocks:
//!
//! * [`BlockHeightTicker`], built via [`PeriodicTickerBuilder`], polls the chain head on a fixed
//!   interval and hands strictly increasing block heights to one consumer, one per
//!   [`BlockHeightTicker::wait`] call.
//! * A log subscription, built via [`LogSubscriberBuilder`], drives a ticker and queries
//!   `eth_getLogs` for every new block range, emulating `eth_subscribe("logs")` on transports
//!   without push support.
//!
//! Both run one background task bound to a
//! [`CancellationToken`](tokio_util::sync::CancellationToken) and report at most one terminal
//! [`PollerError`].
//!
//! # Ordering
//!
//! Ticks are strictly increasing. Subscriptions query contiguous, non-overlapping block ranges
//! and forward logs in the order the node returns them, so every log is delivered exactly once
//! provided the node answers a given range consistently. Reorgs are not detected.
//!
//! # Backpressure
//!
//! A ticker never buffers heights: a value nobody asks for before the next interval is dropped
//! and the head is read again. A subscription stops querying while its log buffer is full.
//!
//! # Retries
//!
//! Tickers and subscriptions treat every reader error as terminal. Wrap the node in a
//! [`robust_provider::RobustProvider`] to retry transient failures and fail over between
//! endpoints, or restart on [`PollerError::is_transient`] errors.
//!
//! # Example
//!
//! ```rust,no_run
//! use alloy::{network::Ethereum, providers::RootProvider, rpc::types::Filter};
//! use chain_poller::{LogSubscriberBuilder, PeriodicTickerBuilder};
//! use std::time::Duration;
//! use tokio_stream::StreamExt;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = RootProvider::<Ethereum>::new_http("http://localhost:8545".parse()?);
//! let lifetime = CancellationToken::new();
//!
//! let (mut logs, mut subscription) = LogSubscriberBuilder::new(provider)
//!     .filter(Filter::new().event("Transfer(address,address,uint256)"))
//!     .ticker(PeriodicTickerBuilder::new(Duration::from_secs(2)).window_size(500))
//!     .subscribe(&lifetime)
//!     .await?;
//!
//! while let Some(log) = logs.next().await {
//!     println!("{log:?}");
//! }
//!
//! if let Some(err) = subscription.err().await {
//!     eprintln!("subscription ended: {err}");
//! }
//! # Ok(()) }
//! ```

#[macro_use]
mod logging;

pub mod chains;
pub mod config;
pub mod handlers;
pub mod numeric;
pub mod reader;
pub mod receipt;
pub mod registry;
pub mod robust_provider;
pub mod subscription;
pub mod ticker;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

mod error;

pub use error::PollerError;

pub use reader::{BlockNumberReader, LogReader, ReceiptReader};

pub use ticker::{
    BlockHeightTicker, DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL, PeriodicTickerBuilder, Tick,
    TickerFactory,
};

pub use subscription::{DEFAULT_LOG_BUFFER_CAPACITY, LogStream, LogSubscriberBuilder, LogSubscription};

pub use receipt::{ReceiptWaiter, ReceiptWaiterBuilder};
