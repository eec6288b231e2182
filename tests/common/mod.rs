#![allow(dead_code)]

use alloy::{
    network::TransactionBuilder,
    primitives::{Address, Bytes, TxHash, bytes},
    providers::{Provider, RootProvider},
    rpc::types::TransactionRequest,
};
use alloy_node_bindings::{Anvil, AnvilInstance};

/// Init code of a contract whose runtime code is `PUSH1 0 PUSH1 0 LOG0 STOP`: every call emits
/// one empty, topic-less log.
pub const EMITTER_INIT_CODE: Bytes = bytes!("6006600c60003960066000f360006000a000");

pub fn init_tracing() {
    _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn spawn_anvil() -> anyhow::Result<(AnvilInstance, RootProvider)> {
    init_tracing();
    let anvil = Anvil::new().try_spawn()?;
    let provider = RootProvider::new_http(anvil.endpoint_url());
    Ok((anvil, provider))
}

pub async fn deploy_emitter(provider: &RootProvider, from: Address) -> anyhow::Result<Address> {
    let tx = TransactionRequest::default().with_from(from).with_deploy_code(EMITTER_INIT_CODE);
    let receipt = provider.send_transaction(tx).await?.get_receipt().await?;
    receipt.contract_address.ok_or_else(|| anyhow::anyhow!("emitter was not deployed"))
}

/// Calls the emitter once, mining one block with one log. Returns the transaction hash.
pub async fn emit(provider: &RootProvider, from: Address, emitter: Address) -> anyhow::Result<TxHash> {
    let tx = TransactionRequest::default().with_from(from).with_to(emitter);
    let receipt = provider.send_transaction(tx).await?.get_receipt().await?;
    Ok(receipt.transaction_hash)
}
