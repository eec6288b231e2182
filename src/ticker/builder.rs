use std::time::Duration;

use alloy::primitives::BlockNumber;
use tokio_util::sync::CancellationToken;

use crate::{
    PollerError,
    reader::BlockNumberReader,
    ticker::{BlockHeightTicker, DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL},
};

/// Builder/configuration for a periodic [`BlockHeightTicker`].
#[derive(Clone, Copy, Debug)]
pub struct PeriodicTickerBuilder {
    /// Time between two head reads.
    pub interval: Duration,
    /// First height the ticker may deliver. Read from the chain when unset.
    pub start_height: Option<BlockNumber>,
    /// Maximum number of blocks a single tick may cover. `0` disables truncation.
    pub window_size: u64,
}

impl Default for PeriodicTickerBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl PeriodicTickerBuilder {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self { interval, start_height: None, window_size: 0 }
    }

    /// Sets the first height the ticker may deliver.
    ///
    /// Heads below this value are read but never delivered.
    #[must_use]
    pub fn start_height(mut self, start_height: BlockNumber) -> Self {
        self.start_height = Some(start_height);
        self
    }

    /// Sets the maximum number of blocks covered by one tick.
    ///
    /// A consumer lagging further behind the head than this receives truncated ticks, each
    /// advancing by exactly `window_size` blocks.
    #[must_use]
    pub fn window_size(mut self, window_size: u64) -> Self {
        self.window_size = window_size;
        self
    }

    /// Starts the ticker as a child of `parent`.
    ///
    /// Cancelling `parent` stops the ticker. Without an explicit start height the current head
    /// is read once before the ticker starts.
    ///
    /// # Errors
    ///
    /// * [`PollerError::InvalidInterval`] - the interval is below [`MIN_POLL_INTERVAL`].
    /// * [`PollerError::Cancelled`] - `parent` was cancelled while reading the start height.
    /// * Any error of the initial head read.
    pub async fn spawn<R: BlockNumberReader + 'static>(
        self,
        parent: &CancellationToken,
        reader: R,
    ) -> Result<BlockHeightTicker, PollerError> {
        if self.interval < MIN_POLL_INTERVAL {
            return Err(PollerError::InvalidInterval(self.interval));
        }

        let next_height = match self.start_height {
            Some(height) => height,
            None => tokio::select! {
                biased;
                () = parent.cancelled() => return Err(PollerError::Cancelled),
                head = reader.block_number() => head?,
            },
        };

        Ok(BlockHeightTicker::spawn(
            parent.child_token(),
            reader,
            self.interval,
            self.window_size,
            next_height,
        ))
    }
}

/// Creates the ticker driving a log subscription.
///
/// Implemented by [`PeriodicTickerBuilder`]; custom implementations can wrap a
/// [`BlockHeightTicker`] around a different reader, for example one that applies a
/// confirmation depth.
pub trait TickerFactory<R>: Send + Sync {
    /// Starts a ticker bound to `lifetime` whose first tick is at least `start_height`.
    fn create_ticker(
        &self,
        lifetime: &CancellationToken,
        reader: R,
        start_height: BlockNumber,
    ) -> impl Future<Output = Result<BlockHeightTicker, PollerError>> + Send;
}

impl<R: BlockNumberReader + 'static> TickerFactory<R> for PeriodicTickerBuilder {
    async fn create_ticker(
        &self,
        lifetime: &CancellationToken,
        reader: R,
        start_height: BlockNumber,
    ) -> Result<BlockHeightTicker, PollerError> {
        self.start_height(start_height).spawn(lifetime, reader).await
    }
}
