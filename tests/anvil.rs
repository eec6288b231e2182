mod common;

use std::time::Duration;

use alloy::{
    network::{Ethereum, ReceiptResponse},
    primitives::TxHash,
    providers::ext::AnvilApi,
    rpc::types::Filter,
};
use chain_poller::{
    LogSubscriberBuilder, PeriodicTickerBuilder, PollerError, ReceiptWaiterBuilder, assert_closed,
    assert_next_tick, config::ChainConfig, robust_provider::RobustProviderBuilder,
};
use common::{deploy_emitter, emit, spawn_anvil};
use tokio::time::timeout;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

const ANVIL_CHAIN_ID: u64 = 31337;
const INTERVAL: Duration = Duration::from_millis(50);

#[tokio::test]
async fn ticker_follows_mined_blocks() -> anyhow::Result<()> {
    let (_anvil, provider) = spawn_anvil()?;

    let mut ticker = PeriodicTickerBuilder::new(INTERVAL)
        .spawn(&CancellationToken::new(), provider.clone())
        .await?;

    assert_next_tick!(ticker, 0);

    provider.anvil_mine(Some(3), None).await?;
    assert_next_tick!(ticker, 3);

    provider.anvil_mine(Some(1), None).await?;
    assert_next_tick!(ticker, 4);

    ticker.stop().await;
    Ok(())
}

#[tokio::test]
async fn ticker_pages_through_a_backlog() -> anyhow::Result<()> {
    let (_anvil, provider) = spawn_anvil()?;
    provider.anvil_mine(Some(25), None).await?;

    let mut ticker = PeriodicTickerBuilder::new(INTERVAL)
        .start_height(1)
        .window_size(10)
        .spawn(&CancellationToken::new(), provider)
        .await?;

    assert_next_tick!(ticker, 10, truncated = true);
    assert_next_tick!(ticker, 20, truncated = true);
    assert_next_tick!(ticker, 25);

    ticker.stop().await;
    Ok(())
}

#[tokio::test]
async fn subscription_streams_emitted_logs() -> anyhow::Result<()> {
    let (anvil, provider) = spawn_anvil()?;
    let sender = anvil.addresses()[0];
    let emitter = deploy_emitter(&provider, sender).await?;

    let (mut logs, mut subscription) = LogSubscriberBuilder::new(provider.clone())
        .filter(Filter::new().address(emitter))
        .from_block(0u64)
        .ticker(PeriodicTickerBuilder::new(INTERVAL))
        .subscribe(&CancellationToken::new())
        .await?;

    let mut sent: Vec<TxHash> = Vec::new();
    for _ in 0..3 {
        sent.push(emit(&provider, sender, emitter).await?);
    }

    let mut last_block = 0;
    for hash in sent {
        let log = timeout(Duration::from_secs(5), logs.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("log stream closed"))?;

        assert_eq!(log.address(), emitter);
        assert_eq!(log.transaction_hash, Some(hash));

        let block = log.block_number.unwrap_or_default();
        assert!(block > last_block);
        last_block = block;
    }

    subscription.unsubscribe().await;
    assert_closed!(logs);
    assert!(matches!(subscription.err().await, Some(PollerError::Cancelled)));

    Ok(())
}

#[tokio::test]
async fn subscription_over_robust_provider() -> anyhow::Result<()> {
    let (anvil, provider) = spawn_anvil()?;
    let sender = anvil.addresses()[0];
    let emitter = deploy_emitter(&provider, sender).await?;

    let robust = RobustProviderBuilder::new(provider.clone())
        .call_timeout(Duration::from_secs(5))
        .build()
        .await?;

    let (mut logs, mut subscription) = LogSubscriberBuilder::new(robust)
        .filter(Filter::new().address(emitter))
        .ticker(PeriodicTickerBuilder::new(INTERVAL))
        .subscribe(&CancellationToken::new())
        .await?;

    let hash = emit(&provider, sender, emitter).await?;

    let log = timeout(Duration::from_secs(5), logs.next())
        .await?
        .ok_or_else(|| anyhow::anyhow!("log stream closed"))?;
    assert_eq!(log.transaction_hash, Some(hash));

    subscription.unsubscribe().await;
    Ok(())
}

#[tokio::test]
async fn receipt_waiter_returns_mined_receipt() -> anyhow::Result<()> {
    let (anvil, provider) = spawn_anvil()?;
    let sender = anvil.addresses()[0];
    let emitter = deploy_emitter(&provider, sender).await?;

    let hash = emit(&provider, sender, emitter).await?;

    let receipt = ReceiptWaiterBuilder::new(hash)
        .poll_interval(INTERVAL)
        .spawn(&CancellationToken::new(), provider)?
        .result()
        .await?;

    assert_eq!(receipt.transaction_hash, hash);
    assert!(receipt.status());

    Ok(())
}

#[tokio::test]
async fn receipt_waiter_gives_up_on_unknown_transactions() -> anyhow::Result<()> {
    let (_anvil, provider) = spawn_anvil()?;
    let unknown = TxHash::repeat_byte(0xab);

    let result = ReceiptWaiterBuilder::new(unknown)
        .poll_interval(INTERVAL)
        .error_handler(Some)
        .spawn(&CancellationToken::new(), provider)?
        .result()
        .await;

    assert!(matches!(result, Err(PollerError::ReceiptNotFound(hash)) if hash == unknown));

    Ok(())
}

#[tokio::test]
async fn chain_config_checks_the_chain_id() -> anyhow::Result<()> {
    let (anvil, _provider) = spawn_anvil()?;

    let matching = ChainConfig::new(anvil.endpoint_url(), ANVIL_CHAIN_ID);
    let provider = matching.connect::<Ethereum>().await?;
    assert_eq!(provider.get_block_number().await?, 0);

    let other = ChainConfig::new(anvil.endpoint_url(), ANVIL_CHAIN_ID + 1);
    let result = other.connect::<Ethereum>().await;
    assert!(matches!(
        result,
        Err(PollerError::ChainIdMismatch { expected, actual: ANVIL_CHAIN_ID }) if expected == ANVIL_CHAIN_ID + 1
    ));

    Ok(())
}
