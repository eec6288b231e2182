use std::time::Duration;

use alloy::{providers::ProviderBuilder, rpc::types::Filter, sol, sol_types::SolEvent};
use alloy_node_bindings::Anvil;
use chain_poller::{
    LogSubscriberBuilder, PeriodicTickerBuilder, robust_provider::RobustProviderBuilder,
};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

sol! {
    // Built directly with solc 0.8.30+commit.73712a01.Darwin.appleclang
    #[sol(rpc, bytecode="608080604052346015576101b0908161001a8239f35b5f80fdfe6080806040526004361015610012575f80fd5b5f3560e01c90816306661abd1461016157508063a87d942c14610145578063d732d955146100ad5763e8927fbc14610048575f80fd5b346100a9575f3660031901126100a9575f5460018101809111610095576020817f7ca2ca9527391044455246730762df008a6b47bbdb5d37a890ef78394535c040925f55604051908152a1005b634e487b7160e01b5f52601160045260245ffd5b5f80fd5b346100a9575f3660031901126100a9575f548015610100575f198101908111610095576020817f53a71f16f53e57416424d0d18ccbd98504d42a6f98fe47b09772d8f357c620ce925f55604051908152a1005b60405162461bcd60e51b815260206004820152601860248201527f436f756e742063616e6e6f74206265206e6567617469766500000000000000006044820152606490fd5b346100a9575f3660031901126100a95760205f54604051908152f35b346100a9575f3660031901126100a9576020905f548152f3fea2646970667358221220471585b420a1ad0093820ff10129ec863f6df4bec186546249391fbc3cdbaa7c64736f6c634300081e0033")]
    contract Counter {
        uint256 public count;

        event CountIncreased(uint256 newCount);
        event CountDecreased(uint256 newCount);

        function increase() public {
            count += 1;
            emit CountIncreased(count);
        }

        function decrease() public {
            require(count > 0, "Count cannot be negative");
            count -= 1;
            emit CountDecreased(count);
        }

        function getCount() public view returns (uint256) {
            return count;
        }
    }
}

const INCREMENTS: usize = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).try_init();

    let anvil = Anvil::new().block_time_f64(0.5).try_spawn()?;
    let wallet = anvil.wallet().ok_or_else(|| anyhow::anyhow!("anvil has no dev accounts"))?;
    let provider = ProviderBuilder::new().wallet(wallet).connect_http(anvil.endpoint_url());

    let counter = Counter::deploy(provider.clone()).await?;
    let filter =
        Filter::new().address(*counter.address()).event_signature(Counter::CountIncreased::SIGNATURE_HASH);

    let robust_provider = RobustProviderBuilder::new(provider.clone())
        .call_timeout(Duration::from_secs(10))
        .max_retries(5)
        .min_delay(Duration::from_millis(500))
        .build()
        .await?;

    let lifetime = CancellationToken::new();
    let (mut logs, mut subscription) = LogSubscriberBuilder::new(robust_provider)
        .filter(filter)
        .ticker(PeriodicTickerBuilder::new(Duration::from_millis(250)).window_size(100))
        .subscribe(&lifetime)
        .await?;

    let increments = tokio::spawn(async move {
        for _ in 0..INCREMENTS {
            counter.increase().send().await?.get_receipt().await?;
        }
        anyhow::Ok(())
    });

    let mut received = 0;
    while let Some(log) = logs.next().await {
        match log.log_decode::<Counter::CountIncreased>() {
            Ok(event) => info!(
                block = log.block_number,
                new_count = %event.inner.data.newCount,
                "Count increased"
            ),
            Err(e) => error!(error = %e, "Undecodable log"),
        }

        received += 1;
        if received == INCREMENTS {
            break;
        }
    }

    subscription.unsubscribe().await;
    if let Some(err) = subscription.err().await {
        info!(reason = %err, "Subscription ended");
    }

    increments.await??;
    Ok(())
}
