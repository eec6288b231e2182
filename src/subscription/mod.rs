//! Log subscriptions over plain request/response transports.
//!
//! A subscription drives a [`BlockHeightTicker`](crate::BlockHeightTicker) and, for every tick,
//! queries the logs of the blocks between its cursor and the tick height. Consecutive queries
//! cover contiguous, non-overlapping ranges, so no log is skipped or delivered twice as long as
//! the node answers a given range consistently.

use alloy::rpc::types::Log;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::PollerError;

mod builder;
mod worker;

pub use builder::LogSubscriberBuilder;

/// Default number of logs buffered between the subscription task and the consumer.
pub const DEFAULT_LOG_BUFFER_CAPACITY: usize = 128;

/// Stream of logs produced by a subscription, in block order.
pub type LogStream = ReceiverStream<Log>;

/// Handle to a running log subscription.
///
/// Dropping the handle cancels the subscription without waiting for it.
#[derive(Debug)]
pub struct LogSubscription {
    lifetime: CancellationToken,
    task: Option<JoinHandle<()>>,
    errors: mpsc::Receiver<PollerError>,
}

impl LogSubscription {
    pub(crate) fn new(
        lifetime: CancellationToken,
        task: JoinHandle<()>,
        errors: mpsc::Receiver<PollerError>,
    ) -> Self {
        Self { lifetime, task: Some(task), errors }
    }

    /// Waits for the terminal error of the subscription.
    ///
    /// Yields at most one error, then `None`. A subscription whose log stream was dropped ends
    /// without an error.
    pub async fn err(&mut self) -> Option<PollerError> {
        self.errors.recv().await
    }

    /// Returns the terminal error if it has already been reported.
    pub fn try_err(&mut self) -> Option<PollerError> {
        self.errors.try_recv().ok()
    }

    /// Cancels the subscription and returns once its background task has exited.
    ///
    /// Nothing is sent to the log stream or the error slot after this returns. Calling
    /// `unsubscribe` more than once is a no-op.
    pub async fn unsubscribe(&mut self) {
        self.lifetime.cancel();

        let Some(task) = self.task.take() else {
            return;
        };

        if let Err(e) = task.await {
            error!(error = %e, "Log subscription task failed");
        }
    }

    /// Returns `true` once the background task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for LogSubscription {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}
