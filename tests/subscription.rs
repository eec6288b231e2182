use std::{ops::RangeInclusive, sync::Arc, time::Duration};

use alloy::{
    primitives::{Address, BlockNumber},
    rpc::types::Filter,
};
use chain_poller::{
    BlockHeightTicker, BlockNumberReader, LogSubscriberBuilder, PeriodicTickerBuilder, PollerError,
    TickerFactory, assert_closed, assert_next_log, assert_no_log,
    test_utils::{ScriptedChain, log_at},
};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

const INTERVAL: Duration = Duration::from_millis(10);
const EMITTER: Address = Address::repeat_byte(0xee);

fn fast_ticker() -> PeriodicTickerBuilder {
    PeriodicTickerBuilder::new(INTERVAL)
}

fn assert_contiguous(ranges: &[RangeInclusive<BlockNumber>], start: BlockNumber) {
    let mut cursor = start;
    for range in ranges {
        assert_eq!(*range.start(), cursor, "gap or overlap in {ranges:?}");
        assert!(range.start() <= range.end(), "empty range in {ranges:?}");
        cursor = range.end() + 1;
    }
}

/// Starts the ticker at a fixed height, whatever the subscription asks for.
struct FixedStartTicker(BlockNumber);

impl<R: BlockNumberReader + 'static> TickerFactory<R> for FixedStartTicker {
    async fn create_ticker(
        &self,
        lifetime: &CancellationToken,
        reader: R,
        _start_height: BlockNumber,
    ) -> Result<BlockHeightTicker, PollerError> {
        fast_ticker().start_height(self.0).spawn(lifetime, reader).await
    }
}

#[tokio::test(start_paused = true)]
async fn forwards_logs_of_each_tick_range() -> anyhow::Result<()> {
    let chain = Arc::new(ScriptedChain::with_heads([5, 9]));
    let log = log_at(3, EMITTER, "a");
    chain.push_log(log.clone());

    let (mut logs, mut subscription) = LogSubscriberBuilder::new(chain.clone())
        .from_block(0u64)
        .ticker(fast_ticker())
        .subscribe(&CancellationToken::new())
        .await?;

    assert_next_log!(logs, log);

    assert_no_log!(logs, within = INTERVAL * 10);
    assert_eq!(chain.log_queries(), vec![0..=5, 6..=9]);

    chain.set_head(12);
    assert_no_log!(logs, within = INTERVAL * 10);
    assert_eq!(chain.log_queries(), vec![0..=5, 6..=9, 10..=12]);

    subscription.unsubscribe().await;
    assert_closed!(logs);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn ranges_are_contiguous_and_non_overlapping() -> anyhow::Result<()> {
    let scripts: [(&[u64], u64); 4] = [
        (&[3, 7, 8, 20, 21], 0),
        (&[1, 1, 2, 2, 3, 50], 1),
        (&[40, 40, 41, 100], 10),
        (&[12, 11, 12, 13, 30], 12),
    ];

    for (heads, start) in scripts {
        for window_size in [0, 4] {
            let chain = Arc::new(ScriptedChain::with_heads(heads.iter().copied()));
            let last = *heads.last().unwrap_or(&0);

            let (_logs, mut subscription) = LogSubscriberBuilder::new(chain.clone())
                .from_block(start)
                .ticker(fast_ticker().window_size(window_size))
                .subscribe(&CancellationToken::new())
                .await?;

            sleep(INTERVAL * 100).await;
            subscription.unsubscribe().await;

            let ranges = chain.log_queries();
            assert_contiguous(&ranges, start);
            assert_eq!(ranges.last().map(|r| *r.end()), Some(last), "script {heads:?}");
            if window_size > 0 {
                assert!(ranges.iter().all(|r| r.end() - r.start() < window_size));
            }
        }
    }

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn starts_from_the_head_when_no_block_is_given() -> anyhow::Result<()> {
    let chain = Arc::new(ScriptedChain::with_heads([7, 7, 9]));
    chain.push_log(log_at(6, EMITTER, "before"));
    let after = log_at(8, EMITTER, "after");
    chain.push_log(after.clone());

    let (mut logs, mut subscription) = LogSubscriberBuilder::new(chain.clone())
        .ticker(fast_ticker())
        .subscribe(&CancellationToken::new())
        .await?;

    assert_next_log!(logs, after);
    assert_eq!(chain.log_queries(), vec![7..=7, 8..=9]);

    subscription.unsubscribe().await;
    assert_closed!(logs);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn filter_start_block_and_address_are_honoured() -> anyhow::Result<()> {
    let chain = Arc::new(ScriptedChain::with_heads([10]));
    let wanted = log_at(4, EMITTER, "wanted");
    chain.push_log(log_at(1, EMITTER, "too early"));
    chain.push_log(log_at(5, Address::repeat_byte(1), "other contract"));
    chain.push_log(wanted.clone());

    let (mut logs, mut subscription) = LogSubscriberBuilder::new(chain.clone())
        .filter(Filter::new().address(EMITTER).from_block(2u64))
        .ticker(fast_ticker())
        .subscribe(&CancellationToken::new())
        .await?;

    assert_next_log!(logs, wanted);

    subscription.unsubscribe().await;
    assert_closed!(logs);
    assert_eq!(chain.log_queries(), vec![2..=10]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unsubscribe_drains_cleanly() -> anyhow::Result<()> {
    let chain = Arc::new(ScriptedChain::with_heads([1]));
    let (mut logs, mut subscription) = LogSubscriberBuilder::new(chain.clone())
        .from_block(0u64)
        .ticker(fast_ticker())
        .subscribe(&CancellationToken::new())
        .await?;

    sleep(INTERVAL * 5).await;
    subscription.unsubscribe().await;
    assert!(subscription.is_finished());

    let queries = chain.log_queries().len();
    chain.push_log(log_at(2, EMITTER, "late"));
    chain.set_head(2);
    sleep(INTERVAL * 10).await;

    assert_eq!(chain.log_queries().len(), queries);
    assert_closed!(logs);
    assert!(matches!(subscription.err().await, Some(PollerError::Cancelled)));
    assert!(subscription.err().await.is_none());

    subscription.unsubscribe().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cancellation_aborts_a_blocked_forward() -> anyhow::Result<()> {
    let chain = Arc::new(ScriptedChain::with_heads([3]));
    let first = log_at(1, EMITTER, "1");
    for (block, tag) in [(1, "1"), (2, "2"), (3, "3")] {
        chain.push_log(log_at(block, EMITTER, tag));
    }

    let lifetime = CancellationToken::new();
    let (mut logs, mut subscription) = LogSubscriberBuilder::new(chain.clone())
        .from_block(0u64)
        .buffer_capacity(1)
        .ticker(fast_ticker())
        .subscribe(&lifetime)
        .await?;

    sleep(INTERVAL * 5).await;
    lifetime.cancel();

    assert!(matches!(subscription.err().await, Some(PollerError::Cancelled)));
    assert_next_log!(logs, first);
    assert_closed!(logs);

    subscription.unsubscribe().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn regressing_ticks_are_terminal() -> anyhow::Result<()> {
    let chain = Arc::new(ScriptedChain::with_heads([5]));

    let (mut logs, mut subscription) = LogSubscriberBuilder::new(chain.clone())
        .from_block(10u64)
        .ticker(FixedStartTicker(0))
        .subscribe(&CancellationToken::new())
        .await?;

    assert!(matches!(
        subscription.err().await,
        Some(PollerError::HeightRegression { cursor: 10, height: 5 })
    ));
    assert_closed!(logs);
    assert!(chain.log_queries().is_empty());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn range_reader_errors_are_terminal() -> anyhow::Result<()> {
    let chain = Arc::new(ScriptedChain::with_heads([4]));
    chain.fail_next_log_query(PollerError::Timeout);

    let (mut logs, mut subscription) = LogSubscriberBuilder::new(chain.clone())
        .from_block(0u64)
        .ticker(fast_ticker())
        .subscribe(&CancellationToken::new())
        .await?;

    assert!(matches!(subscription.err().await, Some(PollerError::Timeout)));
    assert!(subscription.err().await.is_none());
    assert_closed!(logs);
    assert_eq!(chain.log_queries(), vec![0..=4]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn ticker_errors_are_terminal() -> anyhow::Result<()> {
    let chain = Arc::new(ScriptedChain::with_heads([4]));
    chain.push_head_error(PollerError::HeightOverflow(4));

    let (mut logs, mut subscription) = LogSubscriberBuilder::new(chain.clone())
        .from_block(0u64)
        .ticker(fast_ticker())
        .subscribe(&CancellationToken::new())
        .await?;

    assert!(matches!(subscription.err().await, Some(PollerError::HeightOverflow(4))));
    assert_closed!(logs);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn dropping_the_stream_ends_the_subscription_quietly() -> anyhow::Result<()> {
    let chain = Arc::new(ScriptedChain::with_heads([2]));
    chain.push_log(log_at(1, EMITTER, "unread"));

    let (logs, mut subscription) = LogSubscriberBuilder::new(chain.clone())
        .from_block(0u64)
        .ticker(fast_ticker())
        .subscribe(&CancellationToken::new())
        .await?;
    drop(logs);

    assert!(subscription.err().await.is_none());
    assert_eq!(chain.log_queries(), vec![0..=2]);

    Ok(())
}

#[tokio::test]
async fn moving_start_tags_are_rejected() {
    let chain = Arc::new(ScriptedChain::with_heads([1]));

    let result = LogSubscriberBuilder::new(chain)
        .from_block(alloy::eips::BlockNumberOrTag::Finalized)
        .subscribe(&CancellationToken::new())
        .await;

    assert!(matches!(result, Err(PollerError::UnsupportedBlockTag(_))));
}
