use alloy::{
    primitives::BlockNumber,
    rpc::types::{Filter, Log},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    PollerError,
    reader::LogReader,
    ticker::{BlockHeightTicker, Tick},
};

/// Background task of a log subscription.
///
/// Owns the cursor: the lowest block not queried yet.
pub(crate) struct SubscriptionWorker<R> {
    pub(crate) reader: R,
    pub(crate) filter: Filter,
    pub(crate) ticker: BlockHeightTicker,
    pub(crate) cursor: BlockNumber,
    pub(crate) logs: mpsc::Sender<Log>,
    pub(crate) errors: mpsc::Sender<PollerError>,
    pub(crate) lifetime: CancellationToken,
}

impl<R: LogReader> SubscriptionWorker<R> {
    pub(crate) async fn run(mut self) {
        let result = self.follow().await;

        self.ticker.stop().await;

        match result {
            Ok(()) => {
                info!(cursor = self.cursor, "Log stream receiver dropped, stopping subscription");
            }
            Err(err) => {
                if err.is_cancelled() {
                    debug!(cursor = self.cursor, "Log subscription cancelled");
                } else {
                    error!(error = %err, cursor = self.cursor, "Log subscription failed");
                }
                _ = self.errors.try_send(err);
            }
        }
    }

    /// Queries consecutive ranges until an error occurs. Returns `Ok` once nobody listens.
    async fn follow(&mut self) -> Result<(), PollerError> {
        loop {
            let tick = self.next_tick().await?;

            if tick.height < self.cursor {
                return Err(PollerError::HeightRegression {
                    cursor: self.cursor,
                    height: tick.height,
                });
            }

            let range = self.cursor..=tick.height;
            let logs = tokio::select! {
                biased;
                () = self.lifetime.cancelled() => return Err(PollerError::Cancelled),
                logs = self.reader.logs_in_range(range.clone(), &self.filter) => logs?,
            };

            debug!(
                from_block = *range.start(),
                to_block = *range.end(),
                truncated = tick.truncated,
                log_count = logs.len(),
                "Fetched logs"
            );

            for log in logs {
                tokio::select! {
                    biased;
                    () = self.lifetime.cancelled() => return Err(PollerError::Cancelled),
                    sent = self.logs.send(log) => {
                        if sent.is_err() {
                            return Ok(());
                        }
                    }
                }
            }

            self.cursor = tick
                .height
                .checked_add(1)
                .ok_or(PollerError::HeightOverflow(tick.height))?;
        }
    }

    async fn next_tick(&mut self) -> Result<Tick, PollerError> {
        let receiver = self.ticker.wait();

        tokio::select! {
            biased;
            () = self.lifetime.cancelled() => Err(PollerError::Cancelled),
            tick = receiver => match tick {
                Ok(tick) => Ok(tick),
                Err(_) => Err(self.ticker.err().await.unwrap_or(PollerError::TickerClosed)),
            },
            err = self.ticker.err() => Err(err.unwrap_or(PollerError::TickerClosed)),
        }
    }
}
