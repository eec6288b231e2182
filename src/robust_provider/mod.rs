//! Retrying, failover-capable wrapper around alloy HTTP providers.
//!
//! [`RobustProvider`] is the retry collaborator for tickers and log subscriptions: the core
//! forwards every reader failure as terminal, so transient transport problems should be absorbed
//! here, below the [`BlockNumberReader`](crate::reader::BlockNumberReader) and
//! [`LogReader`](crate::reader::LogReader) seams.
//!
//! # How it works
//!
//! Each call is wrapped in a total timeout and retried with exponential backoff up to
//! `max_retries`, as long as [`PollerError::is_transient`](crate::PollerError::is_transient)
//! holds for the failure. If the primary provider keeps failing, the call is repeated against the
//! configured fallback providers in the order they were added.
//!
//! # Examples
//!
//! ```rust,no_run
//! use alloy::rpc::types::Filter;
//! use chain_poller::{
//!     LogSubscriberBuilder,
//!     robust_provider::{RobustProvider, RobustProviderBuilder},
//! };
//! use std::{sync::Arc, time::Duration};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let robust: RobustProvider = RobustProviderBuilder::new("http://localhost:8545")
//!     .fallback("http://localhost:8546")
//!     .call_timeout(Duration::from_secs(30))
//!     .build()
//!     .await?;
//!
//! let lifetime = CancellationToken::new();
//! let (logs, subscription) =
//!     LogSubscriberBuilder::new(Arc::new(robust)).filter(Filter::new()).subscribe(&lifetime).await?;
//! # drop((logs, subscription));
//! # Ok(()) }
//! ```

pub mod builder;
pub mod provider;
pub mod provider_conversion;

pub use builder::*;
pub use provider::RobustProvider;
pub use provider_conversion::{IntoRobustProvider, IntoRootProvider};
