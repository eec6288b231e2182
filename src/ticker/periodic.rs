use std::{
    convert::Infallible,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use alloy::primitives::BlockNumber;
use tokio::{
    sync::{Notify, mpsc, oneshot},
    task::JoinHandle,
    time::{self, Instant, Interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{PollerError, reader::BlockNumberReader};

/// Head readings closer than this to `u64::MAX` are rejected.
pub const HEIGHT_SAFETY_MARGIN: u64 = 1024;

/// A block height notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tick {
    /// The highest block covered by this tick.
    pub height: BlockNumber,
    /// When the tick was handed to the consumer.
    pub observed_at: Instant,
    /// `true` when the tick is a catch-up boundary rather than the chain head.
    pub truncated: bool,
}

/// A consumer asking for the next tick, answered through its own channel.
#[derive(Debug)]
struct WaitRequest {
    respond_to: oneshot::Sender<Tick>,
}

/// Holds the newest unanswered [`WaitRequest`].
///
/// Storing a request drops the one it replaces, which resolves the older receiver with an
/// error. Once closed, incoming requests are dropped on arrival.
#[derive(Debug, Default)]
struct RequestSlot {
    state: Mutex<SlotState>,
    arrived: Notify,
}

#[derive(Debug, Default)]
struct SlotState {
    request: Option<WaitRequest>,
    closed: bool,
}

impl RequestSlot {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn put(&self, request: WaitRequest) {
        {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.request = Some(request);
        }
        self.arrived.notify_one();
    }

    fn take(&self) -> Option<WaitRequest> {
        self.lock().request.take()
    }

    fn is_occupied(&self) -> bool {
        self.lock().request.is_some()
    }

    fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.request = None;
    }
}

/// Polls a [`BlockNumberReader`] on a fixed interval and hands new heights to a single consumer.
///
/// Every call to [`wait`](Self::wait) returns a fresh receiver that resolves with the next
/// height not delivered before. Calling `wait` again before the previous receiver produced a
/// value invalidates that receiver: it resolves with a receive error instead of a tick. Only
/// the newest request is kept, however often `wait` is called while the head read is slow.
///
/// A height is only offered while a consumer is waiting for it. If nobody takes it before the
/// interval fires again the value is dropped and the head is read anew, so a slow consumer
/// always receives the most recent head rather than a stale one.
///
/// With a non-zero window size a consumer that is far behind the head receives truncated
/// ticks, each advancing by exactly the window size, until the remaining backlog fits into one
/// window.
///
/// Create tickers through [`PeriodicTickerBuilder`](crate::PeriodicTickerBuilder).
#[derive(Debug)]
pub struct BlockHeightTicker {
    requests: Arc<RequestSlot>,
    errors: mpsc::Receiver<PollerError>,
    lifetime: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl BlockHeightTicker {
    pub(crate) fn spawn<R: BlockNumberReader + 'static>(
        lifetime: CancellationToken,
        reader: R,
        interval: Duration,
        window_size: u64,
        next_height: BlockNumber,
    ) -> Self {
        let requests = Arc::new(RequestSlot::default());
        let (errors_tx, errors_rx) = mpsc::channel(1);

        let worker = TickerWorker {
            reader,
            requests: Arc::clone(&requests),
            errors: errors_tx,
            lifetime: lifetime.clone(),
            interval,
            window_size,
            next_height,
        };

        debug!(
            next_height = next_height,
            interval_ms = interval.as_millis(),
            window_size = window_size,
            "Starting block height ticker"
        );

        let task = tokio::spawn(worker.run());

        Self { requests, errors: errors_rx, lifetime, task: Some(task) }
    }

    /// Requests the next tick.
    ///
    /// The receiver resolves with an error if a newer `wait` call replaced it or if the ticker
    /// has stopped.
    #[must_use]
    pub fn wait(&self) -> oneshot::Receiver<Tick> {
        let (respond_to, receiver) = oneshot::channel();
        self.requests.put(WaitRequest { respond_to });
        receiver
    }

    /// Waits for the terminal error of the ticker.
    ///
    /// Yields at most one error; `None` once the ticker has stopped and the error was taken.
    pub async fn err(&mut self) -> Option<PollerError> {
        self.errors.recv().await
    }

    /// Returns the terminal error if it has already been reported.
    pub fn try_err(&mut self) -> Option<PollerError> {
        self.errors.try_recv().ok()
    }

    /// Cancels the ticker and waits for its background task to exit.
    ///
    /// Calling `stop` more than once is a no-op.
    pub async fn stop(&mut self) {
        self.lifetime.cancel();

        let Some(task) = self.task.take() else {
            return;
        };

        if let Err(e) = task.await {
            error!(error = %e, "Block height ticker task failed");
        }
    }

    /// Returns `true` once the background task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for BlockHeightTicker {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}

enum Delivery {
    Delivered,
    Stale,
}

struct TickerWorker<R> {
    reader: R,
    requests: Arc<RequestSlot>,
    errors: mpsc::Sender<PollerError>,
    lifetime: CancellationToken,
    interval: Duration,
    window_size: u64,
    next_height: BlockNumber,
}

impl<R: BlockNumberReader> TickerWorker<R> {
    async fn run(mut self) {
        let Err(err) = self.poll_loop().await;

        // unanswered and later requests resolve with an error from now on
        self.requests.close();

        if err.is_cancelled() {
            debug!(next_height = self.next_height, "Block height ticker cancelled");
        } else {
            error!(error = %err, next_height = self.next_height, "Block height ticker failed");
        }

        // the slot holds exactly one error, nobody else ever sends on it
        _ = self.errors.try_send(err);
    }

    async fn poll_loop(&mut self) -> Result<Infallible, PollerError> {
        // nothing is read from the chain until a consumer asks for a tick
        self.first_request().await?;

        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            let head = self.read_head().await?;

            if head < self.next_height {
                trace!(head = head, next_height = self.next_height, "No new blocks");
                self.idle(&mut interval).await?;
                continue;
            }

            self.deliver_backlog(head).await?;

            match self.hand_off(head, false, Some(&mut interval)).await? {
                Delivery::Delivered => {
                    trace!(height = head, "Delivered tick");
                    self.next_height = head + 1;
                    self.idle(&mut interval).await?;
                }
                Delivery::Stale => {
                    debug!(height = head, "No consumer before the next interval, discarding");
                }
            }
        }
    }

    async fn read_head(&mut self) -> Result<BlockNumber, PollerError> {
        let head = tokio::select! {
            biased;
            () = self.lifetime.cancelled() => return Err(PollerError::Cancelled),
            head = self.reader.block_number() => head?,
        };

        if head.checked_add(HEIGHT_SAFETY_MARGIN).is_none() ||
            head.checked_add(self.window_size).is_none()
        {
            return Err(PollerError::HeightOverflow(head));
        }

        Ok(head)
    }

    /// Pages towards `head` in window sized steps.
    async fn deliver_backlog(&mut self, head: BlockNumber) -> Result<(), PollerError> {
        if self.window_size == 0 {
            return Ok(());
        }

        loop {
            let boundary = self.next_height.saturating_add(self.window_size - 1);
            if head <= boundary {
                return Ok(());
            }

            self.hand_off(boundary, true, None).await?;
            trace!(height = boundary, head = head, "Delivered truncated tick");
            self.next_height = boundary + 1;
        }
    }

    /// Holds `height` until a consumer takes it, stamping the tick at hand-off.
    ///
    /// With an interval the hand-off is abandoned once the interval fires.
    async fn hand_off(
        &mut self,
        height: BlockNumber,
        truncated: bool,
        mut interval: Option<&mut Interval>,
    ) -> Result<Delivery, PollerError> {
        loop {
            if let Some(request) = self.requests.take() {
                let tick = Tick { height, observed_at: Instant::now(), truncated };
                if request.respond_to.send(tick).is_ok() {
                    return Ok(Delivery::Delivered);
                }
                trace!(height = height, "Consumer dropped its receiver");
            }

            tokio::select! {
                biased;
                () = self.lifetime.cancelled() => return Err(PollerError::Cancelled),
                () = self.requests.arrived.notified() => {}
                () = next_interval(&mut interval) => return Ok(Delivery::Stale),
            }
        }
    }

    async fn idle(&mut self, interval: &mut Interval) -> Result<(), PollerError> {
        tokio::select! {
            biased;
            () = self.lifetime.cancelled() => Err(PollerError::Cancelled),
            _ = interval.tick() => Ok(()),
        }
    }

    async fn first_request(&mut self) -> Result<(), PollerError> {
        while !self.requests.is_occupied() {
            tokio::select! {
                biased;
                () = self.lifetime.cancelled() => return Err(PollerError::Cancelled),
                () = self.requests.arrived.notified() => {}
            }
        }
        Ok(())
    }
}

async fn next_interval(interval: &mut Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
