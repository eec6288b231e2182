//! Per-chain connection settings.

use alloy::{
    network::Network,
    primitives::ChainId,
    providers::Provider,
    transports::http::reqwest::Url,
};

use crate::{
    PollerError,
    registry::ContractRegistry,
    robust_provider::{RobustProvider, RobustProviderBuilder},
};

/// Endpoint, chain id and contracts of one chain.
#[derive(Clone, Debug)]
pub struct ChainConfig {
    pub endpoint: Url,
    pub chain_id: ChainId,
    pub contracts: ContractRegistry,
}

impl ChainConfig {
    /// Creates a config with an empty contract registry for `chain_id`.
    #[must_use]
    pub fn new(endpoint: Url, chain_id: ChainId) -> Self {
        Self { endpoint, chain_id, contracts: ContractRegistry::new(chain_id) }
    }

    /// Connects to the endpoint with default retry settings and checks that it serves the
    /// configured chain.
    ///
    /// # Errors
    ///
    /// * [`PollerError::ChainIdMismatch`] - the node reports a different chain id.
    /// * Any error of the `eth_chainId` call.
    pub async fn connect<N: Network>(&self) -> Result<RobustProvider<N>, PollerError> {
        let provider = RobustProviderBuilder::new(self.endpoint.clone()).build().await?;

        let actual = provider.primary().get_chain_id().await?;
        if actual != self.chain_id {
            return Err(PollerError::ChainIdMismatch { expected: self.chain_id, actual });
        }

        info!(chain_id = actual, endpoint = %self.endpoint, "Connected to chain");
        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::ARBITRUM_ONE;

    #[test]
    fn new_config_has_matching_registry() -> anyhow::Result<()> {
        let config = ChainConfig::new("http://localhost:8545".parse()?, ARBITRUM_ONE);

        assert_eq!(config.contracts.chain_id(), ARBITRUM_ONE);
        assert!(config.contracts.is_empty());

        Ok(())
    }
}
