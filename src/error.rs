use std::{sync::Arc, time::Duration};

use alloy::{
    eips::BlockNumberOrTag,
    primitives::{BlockNumber, ChainId, TxHash},
    transports::{RpcError, TransportErrorKind},
};
use thiserror::Error;
use tokio::time::error::Elapsed;

/// Errors produced by tickers, log subscriptions and the helpers around them.
///
/// Tickers and subscriptions deliver at most one of these through their error slot, after which
/// their background task has ended. Nothing in this crate retries on its own; use
/// [`PollerError::is_transient`] (or [`RobustProvider`](crate::robust_provider::RobustProvider))
/// to decide whether to start over.
#[derive(Error, Debug, Clone)]
pub enum PollerError {
    /// The underlying RPC transport returned an error.
    #[error("RPC error: {0}")]
    RpcError(Arc<RpcError<TransportErrorKind>>),

    /// A call did not complete within its deadline.
    #[error("Operation timed out")]
    Timeout,

    /// The lifetime driving the operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// A ticker reported a height below the subscription cursor.
    #[error("Block height regressed: cursor is at {cursor} but ticker reported {height}")]
    HeightRegression { cursor: BlockNumber, height: BlockNumber },

    /// A head reading is too close to `u64::MAX` to be handled safely.
    #[error("Block height {0} is too close to the integer limit")]
    HeightOverflow(BlockNumber),

    /// The ticker went away without reporting an error.
    #[error("Block height ticker closed")]
    TickerClosed,

    /// The configured polling interval is below [`MIN_POLL_INTERVAL`](crate::MIN_POLL_INTERVAL).
    #[error("Polling interval {0:?} is too short")]
    InvalidInterval(Duration),

    /// The configured output buffer capacity is invalid (must be greater than zero).
    #[error("Buffer capacity must be greater than 0")]
    InvalidBufferCapacity,

    /// The requested start block cannot be resolved to a concrete height.
    #[error("Unsupported start block: {0}")]
    UnsupportedBlockTag(BlockNumberOrTag),

    /// The filter pins a block hash, which cannot be followed by range queries.
    #[error("Filters pinned to a block hash cannot be subscribed to")]
    BlockHashFilter,

    /// A contract handle was registered for a different chain than the registry.
    #[error("Chain id mismatch: expected {expected}, got {actual}")]
    ChainIdMismatch { expected: ChainId, actual: ChainId },

    /// The transaction receipt is not (yet) available.
    #[error("Receipt not found for transaction {0}")]
    ReceiptNotFound(TxHash),

    /// A call handler rejected or replaced the result of a client call.
    #[error("{method} rejected by handler: {reason}")]
    Rejected { method: &'static str, reason: String },
}

impl PollerError {
    /// Returns `true` for failures that are worth retrying: dropped connections, timeouts,
    /// rate limiting and server-side HTTP errors.
    ///
    /// Cancellation and every protocol or configuration error are terminal.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            PollerError::Timeout => true,
            PollerError::RpcError(err) => is_transient_rpc_error(err),
            _ => false,
        }
    }

    /// Returns `true` if the error is the result of the caller cancelling the operation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PollerError::Cancelled)
    }
}

pub(crate) fn is_transient_rpc_error(err: &RpcError<TransportErrorKind>) -> bool {
    match err {
        RpcError::Transport(kind) => match kind {
            TransportErrorKind::BackendGone => true,
            TransportErrorKind::HttpError(http) => {
                http.status == 429 || (500..600).contains(&http.status)
            }
            TransportErrorKind::Custom(source) => is_transient_message(&source.to_string()),
            _ => false,
        },
        RpcError::ErrorResp(payload) => is_transient_message(&payload.message),
        _ => false,
    }
}

fn is_transient_message(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    [
        "connection reset",
        "connection closed",
        "broken pipe",
        "timed out",
        "i/o timeout",
        "request failed or timed out",
    ]
    .iter()
    .any(|needle| message.contains(needle))
}

impl From<RpcError<TransportErrorKind>> for PollerError {
    fn from(error: RpcError<TransportErrorKind>) -> Self {
        PollerError::RpcError(Arc::new(error))
    }
}

impl From<Elapsed> for PollerError {
    fn from(_: Elapsed) -> Self {
        PollerError::Timeout
    }
}
