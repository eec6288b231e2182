use alloy::{
    eips::BlockNumberOrTag,
    primitives::BlockNumber,
    rpc::types::{Filter, FilterBlockOption},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::{
    PollerError,
    reader::{BlockNumberReader, LogReader},
    subscription::{
        DEFAULT_LOG_BUFFER_CAPACITY, LogStream, LogSubscription, worker::SubscriptionWorker,
    },
    ticker::{PeriodicTickerBuilder, TickerFactory},
};

/// Builder/configuration for a polling log subscription.
///
/// The reader is used both for range queries and, through a clone handed to the ticker factory,
/// as the head source of the ticker. Share one connection by passing an `Arc` or a cloneable
/// provider.
#[derive(Clone, Debug)]
pub struct LogSubscriberBuilder<R, F = PeriodicTickerBuilder> {
    reader: R,
    filter: Filter,
    from_block: Option<BlockNumberOrTag>,
    buffer_capacity: usize,
    ticker: F,
}

impl<R> LogSubscriberBuilder<R> {
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            filter: Filter::new(),
            from_block: None,
            buffer_capacity: DEFAULT_LOG_BUFFER_CAPACITY,
            ticker: PeriodicTickerBuilder::default(),
        }
    }
}

impl<R, F> LogSubscriberBuilder<R, F> {
    /// Sets the filter logs must match.
    ///
    /// The block range of the filter is only used to resolve the start block when
    /// [`from_block`](Self::from_block) is not set.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the first block to query.
    ///
    /// Accepts a block number or one of the tags `earliest` and `latest`.
    #[must_use]
    pub fn from_block(mut self, block: impl Into<BlockNumberOrTag>) -> Self {
        self.from_block = Some(block.into());
        self
    }

    /// Sets the log stream buffer capacity.
    ///
    /// Once the buffer is full the subscription stops querying until the consumer catches up.
    ///
    /// # Arguments
    ///
    /// * `buffer_capacity` - Maximum number of logs to buffer (must be greater than 0)
    #[must_use]
    pub fn buffer_capacity(mut self, buffer_capacity: usize) -> Self {
        self.buffer_capacity = buffer_capacity;
        self
    }

    /// Replaces the ticker factory.
    #[must_use]
    pub fn ticker<G>(self, ticker: G) -> LogSubscriberBuilder<R, G> {
        LogSubscriberBuilder {
            reader: self.reader,
            filter: self.filter,
            from_block: self.from_block,
            buffer_capacity: self.buffer_capacity,
            ticker,
        }
    }

    /// Resolves the start block to a height, `None` meaning "the current head".
    fn start_height(&self) -> Result<Option<BlockNumber>, PollerError> {
        let filter_from = match &self.filter.block_option {
            FilterBlockOption::AtBlockHash(_) => return Err(PollerError::BlockHashFilter),
            FilterBlockOption::Range { from_block, .. } => *from_block,
        };

        let Some(tag) = self.from_block.or(filter_from) else {
            return Ok(None);
        };

        match tag {
            BlockNumberOrTag::Number(number) => Ok(Some(number)),
            BlockNumberOrTag::Earliest => Ok(Some(0)),
            BlockNumberOrTag::Latest => Ok(None),
            BlockNumberOrTag::Safe | BlockNumberOrTag::Finalized | BlockNumberOrTag::Pending => {
                Err(PollerError::UnsupportedBlockTag(tag))
            }
        }
    }
}

impl<R, F> LogSubscriberBuilder<R, F>
where
    R: BlockNumberReader + LogReader + Clone + 'static,
    F: TickerFactory<R>,
{
    /// Starts the subscription as a child of `parent`.
    ///
    /// The start height is resolved before this returns, reading the head once if no start
    /// block was given. Logs are streamed in block order; the returned [`LogSubscription`]
    /// reports the terminal error and stops the background task.
    ///
    /// # Errors
    ///
    /// * [`PollerError::InvalidBufferCapacity`] - the buffer capacity is zero.
    /// * [`PollerError::BlockHashFilter`] - the filter is pinned to a block hash.
    /// * [`PollerError::UnsupportedBlockTag`] - the start block is `safe`, `finalized` or
    ///   `pending`.
    /// * [`PollerError::Cancelled`] - `parent` was cancelled during start-up.
    /// * Any error of the initial head read or of the ticker factory.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all))]
    pub async fn subscribe(
        self,
        parent: &CancellationToken,
    ) -> Result<(LogStream, LogSubscription), PollerError> {
        if self.buffer_capacity == 0 {
            return Err(PollerError::InvalidBufferCapacity);
        }

        let cursor = match self.start_height()? {
            Some(height) => height,
            None => tokio::select! {
                biased;
                () = parent.cancelled() => return Err(PollerError::Cancelled),
                head = self.reader.block_number() => head?,
            },
        };

        let lifetime = parent.child_token();
        let ticker = self.ticker.create_ticker(&lifetime, self.reader.clone(), cursor).await?;

        let (logs_tx, logs_rx) = mpsc::channel(self.buffer_capacity);
        let (errors_tx, errors_rx) = mpsc::channel(1);

        info!(from_block = cursor, "Starting log subscription");

        let worker = SubscriptionWorker {
            reader: self.reader,
            filter: self.filter,
            ticker,
            cursor,
            logs: logs_tx,
            errors: errors_tx,
            lifetime: lifetime.clone(),
        };
        let task = tokio::spawn(worker.run());

        Ok((ReceiverStream::new(logs_rx), LogSubscription::new(lifetime, task, errors_rx)))
    }
}
