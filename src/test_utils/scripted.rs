use std::{
    collections::VecDeque,
    ops::RangeInclusive,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use alloy::{
    primitives::{Address, BlockNumber, Bytes},
    rpc::types::{Filter, Log},
};

use crate::{
    PollerError,
    reader::{BlockNumberReader, LogReader},
};

/// An in-memory chain driven by the test.
///
/// Head reads consume scripted values in order; once the script runs dry the last value is
/// repeated. Without any value a head read never completes. Log queries return the stored
/// logs whose block number falls into the queried range and whose address matches the filter.
#[derive(Debug, Default)]
pub struct ScriptedChain {
    heads: Mutex<HeadScript>,
    head_latency: Duration,
    head_reads: AtomicUsize,
    logs: Mutex<Vec<Log>>,
    log_failures: Mutex<VecDeque<PollerError>>,
    log_queries: Mutex<Vec<RangeInclusive<BlockNumber>>>,
}

#[derive(Debug, Default)]
struct HeadScript {
    queued: VecDeque<Result<BlockNumber, PollerError>>,
    current: Option<BlockNumber>,
}

impl ScriptedChain {
    /// A chain whose head reads return `heads` in order.
    #[must_use]
    pub fn with_heads(heads: impl IntoIterator<Item = BlockNumber>) -> Self {
        let chain = Self::default();
        chain.lock_heads().queued.extend(heads.into_iter().map(Ok));
        chain
    }

    /// A chain whose head reads never complete until a head is pushed.
    #[must_use]
    pub fn pending_heads() -> Self {
        Self::default()
    }

    /// Delays every head read by `latency`.
    #[must_use]
    pub fn head_latency(mut self, latency: Duration) -> Self {
        self.head_latency = latency;
        self
    }

    /// Replaces the remaining script with a fixed head.
    pub fn set_head(&self, head: BlockNumber) {
        let mut heads = self.lock_heads();
        heads.queued.clear();
        heads.current = Some(head);
    }

    /// Appends a head to the script.
    pub fn push_head(&self, head: BlockNumber) {
        self.lock_heads().queued.push_back(Ok(head));
    }

    /// Appends a failing head read to the script.
    pub fn push_head_error(&self, error: PollerError) {
        self.lock_heads().queued.push_back(Err(error));
    }

    /// Stores a log returned by matching range queries.
    pub fn push_log(&self, log: Log) {
        self.logs.lock().expect("logs lock poisoned").push(log);
    }

    /// Makes the next log query fail with `error`.
    pub fn fail_next_log_query(&self, error: PollerError) {
        self.log_failures.lock().expect("failures lock poisoned").push_back(error);
    }

    /// Number of head reads started so far.
    #[must_use]
    pub fn head_reads(&self) -> usize {
        self.head_reads.load(Ordering::SeqCst)
    }

    /// Ranges of every log query in call order, failed ones included.
    #[must_use]
    pub fn log_queries(&self) -> Vec<RangeInclusive<BlockNumber>> {
        self.log_queries.lock().expect("queries lock poisoned").clone()
    }

    fn lock_heads(&self) -> std::sync::MutexGuard<'_, HeadScript> {
        self.heads.lock().expect("heads lock poisoned")
    }

    fn next_head(&self) -> Option<Result<BlockNumber, PollerError>> {
        let mut heads = self.lock_heads();
        match heads.queued.pop_front() {
            Some(Ok(head)) => {
                heads.current = Some(head);
                Some(Ok(head))
            }
            Some(Err(e)) => Some(Err(e)),
            None => heads.current.map(Ok),
        }
    }
}

impl BlockNumberReader for ScriptedChain {
    async fn block_number(&self) -> Result<BlockNumber, PollerError> {
        self.head_reads.fetch_add(1, Ordering::SeqCst);

        if !self.head_latency.is_zero() {
            tokio::time::sleep(self.head_latency).await;
        }

        loop {
            if let Some(head) = self.next_head() {
                return head;
            }
            // nothing scripted yet, poll the script again later
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

impl LogReader for ScriptedChain {
    async fn logs_in_range(
        &self,
        range: RangeInclusive<BlockNumber>,
        filter: &Filter,
    ) -> Result<Vec<Log>, PollerError> {
        self.log_queries.lock().expect("queries lock poisoned").push(range.clone());

        if let Some(error) = self.log_failures.lock().expect("failures lock poisoned").pop_front() {
            return Err(error);
        }

        let logs = self.logs.lock().expect("logs lock poisoned");
        Ok(logs
            .iter()
            .filter(|log| log.block_number.is_some_and(|number| range.contains(&number)))
            .filter(|log| filter.address.matches(&log.inner.address))
            .cloned()
            .collect())
    }
}

/// Builds a log emitted by `address` at `block` whose data is `tag`.
#[must_use]
pub fn log_at(block: BlockNumber, address: Address, tag: &str) -> Log {
    Log {
        inner: alloy::primitives::Log::new_unchecked(
            address,
            Vec::new(),
            Bytes::copy_from_slice(tag.as_bytes()),
        ),
        block_number: Some(block),
        ..Default::default()
    }
}
