//! Waiting for transaction receipts.

use std::{fmt, sync::Arc, time::Duration};

use alloy::primitives::TxHash;
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{self, MissedTickBehavior, timeout},
};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::{PollerError, reader::ReceiptReader};

/// Default time between two receipt lookups.
pub const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(3);
/// Default deadline of a single receipt lookup.
pub const DEFAULT_RECEIPT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(60);

/// Decides what to do with a failed lookup: `None` keeps waiting, `Some` ends the wait with
/// that error.
pub type ReceiptErrorHandler = Arc<dyn Fn(PollerError) -> Option<PollerError> + Send + Sync>;

/// Default error handler: keeps waiting while the receipt is missing or the failure is
/// transient, gives up on anything else.
#[must_use]
pub fn retry_transient(err: PollerError) -> Option<PollerError> {
    match err {
        PollerError::ReceiptNotFound(hash) => {
            trace!(tx_hash = %hash, "Receipt not available yet");
            None
        }
        err if err.is_transient() => {
            debug!(error = %err, "Transient error while waiting for receipt");
            None
        }
        err => Some(err),
    }
}

/// Builder/configuration for a [`ReceiptWaiter`].
#[derive(Clone)]
pub struct ReceiptWaiterBuilder {
    tx_hash: TxHash,
    poll_interval: Duration,
    attempt_timeout: Duration,
    error_handler: ReceiptErrorHandler,
}

impl fmt::Debug for ReceiptWaiterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiptWaiterBuilder")
            .field("tx_hash", &self.tx_hash)
            .field("poll_interval", &self.poll_interval)
            .field("attempt_timeout", &self.attempt_timeout)
            .finish_non_exhaustive()
    }
}

impl ReceiptWaiterBuilder {
    #[must_use]
    pub fn new(tx_hash: TxHash) -> Self {
        Self {
            tx_hash,
            poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
            attempt_timeout: DEFAULT_RECEIPT_ATTEMPT_TIMEOUT,
            error_handler: Arc::new(retry_transient),
        }
    }

    /// Sets the time between two lookups.
    #[must_use]
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets the deadline of a single lookup. An expired lookup is reported to the error handler
    /// as [`PollerError::Timeout`].
    #[must_use]
    pub fn attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    /// Replaces the error handler.
    ///
    /// A missing receipt is reported as [`PollerError::ReceiptNotFound`], so a handler can give
    /// up on transactions that never get mined.
    #[must_use]
    pub fn error_handler(
        mut self,
        handler: impl Fn(PollerError) -> Option<PollerError> + Send + Sync + 'static,
    ) -> Self {
        self.error_handler = Arc::new(handler);
        self
    }

    /// Starts waiting as a child of `parent`.
    ///
    /// The first lookup happens immediately.
    ///
    /// # Errors
    ///
    /// Returns [`PollerError::InvalidInterval`] if the poll interval is zero.
    pub fn spawn<R: ReceiptReader + 'static>(
        self,
        parent: &CancellationToken,
        reader: R,
    ) -> Result<ReceiptWaiter<R::Receipt>, PollerError> {
        if self.poll_interval.is_zero() {
            return Err(PollerError::InvalidInterval(self.poll_interval));
        }

        let lifetime = parent.child_token();
        let (result_tx, result_rx) = oneshot::channel();

        let task = tokio::spawn(self.run(reader, lifetime.clone(), result_tx));

        Ok(ReceiptWaiter {
            guard: lifetime.clone().drop_guard(),
            lifetime,
            result: result_rx,
            task,
        })
    }

    async fn run<R: ReceiptReader>(
        self,
        reader: R,
        lifetime: CancellationToken,
        result: oneshot::Sender<Result<R::Receipt, PollerError>>,
    ) {
        let outcome = self.poll(&reader, &lifetime).await;

        match &outcome {
            Ok(_) => debug!(tx_hash = %self.tx_hash, "Receipt found"),
            Err(err) if err.is_cancelled() => {
                debug!(tx_hash = %self.tx_hash, "Stopped waiting for receipt");
            }
            Err(err) => error!(tx_hash = %self.tx_hash, error = %err, "Waiting for receipt failed"),
        }

        _ = result.send(outcome);
    }

    async fn poll<R: ReceiptReader>(
        &self,
        reader: &R,
        lifetime: &CancellationToken,
    ) -> Result<R::Receipt, PollerError> {
        let mut interval = time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = lifetime.cancelled() => return Err(PollerError::Cancelled),
                _ = interval.tick() => {}
            }

            let attempt = tokio::select! {
                biased;
                () = lifetime.cancelled() => return Err(PollerError::Cancelled),
                attempt = timeout(self.attempt_timeout, reader.transaction_receipt(self.tx_hash)) => attempt,
            };

            let err = match attempt {
                Ok(Ok(Some(receipt))) => return Ok(receipt),
                Ok(Ok(None)) => PollerError::ReceiptNotFound(self.tx_hash),
                Ok(Err(err)) => err,
                Err(elapsed) => elapsed.into(),
            };

            if let Some(err) = (self.error_handler)(err) {
                return Err(err);
            }
        }
    }
}

/// A running receipt lookup.
///
/// Dropping the waiter cancels the lookup.
#[derive(Debug)]
pub struct ReceiptWaiter<T> {
    lifetime: CancellationToken,
    result: oneshot::Receiver<Result<T, PollerError>>,
    task: JoinHandle<()>,
    guard: DropGuard,
}

impl<T> ReceiptWaiter<T> {
    /// Waits for the receipt or the error that ended the lookup.
    ///
    /// # Errors
    ///
    /// * [`PollerError::Cancelled`] - the waiter or its parent lifetime was cancelled.
    /// * Any error the error handler decided not to retry.
    pub async fn result(self) -> Result<T, PollerError> {
        let Self { result, task, guard, .. } = self;

        let outcome = result.await.unwrap_or(Err(PollerError::Cancelled));

        if let Err(e) = task.await {
            error!(error = %e, "Receipt waiter task failed");
        }
        drop(guard);

        outcome
    }

    /// Stops the lookup; [`result`](Self::result) then resolves with
    /// [`PollerError::Cancelled`] unless the receipt was already found.
    pub fn cancel(&self) {
        self.lifetime.cancel();
    }

    /// Returns `true` once the lookup has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
