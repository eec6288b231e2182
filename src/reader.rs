//! Capabilities consumed by tickers, subscriptions and receipt waiters.
//!
//! The core never talks to a node directly: it reads heights through [`BlockNumberReader`] and
//! logs through [`LogReader`]. Implementations are provided for alloy providers, for
//! [`RobustProvider`](crate::robust_provider::RobustProvider) and for `Arc`-wrapped readers, so
//! a ticker and a log subscription can share one connection.

use std::{ops::RangeInclusive, sync::Arc};

use alloy::{
    network::Network,
    primitives::{BlockNumber, TxHash},
    providers::{DynProvider, Provider, RootProvider},
    rpc::types::{Filter, Log},
};

use crate::PollerError;

/// Reads the current chain head.
pub trait BlockNumberReader: Send + Sync {
    /// Returns the latest block number known to the node.
    ///
    /// Dropping the returned future cancels the request.
    fn block_number(&self) -> impl Future<Output = Result<BlockNumber, PollerError>> + Send;
}

/// Reads the logs matching a filter within an inclusive block range.
pub trait LogReader: Send + Sync {
    /// Returns the logs in `range` matching `filter`, in the order the node reports them.
    ///
    /// The block range of `filter` is replaced by `range`.
    fn logs_in_range(
        &self,
        range: RangeInclusive<BlockNumber>,
        filter: &Filter,
    ) -> impl Future<Output = Result<Vec<Log>, PollerError>> + Send;
}

/// Reads transaction receipts.
pub trait ReceiptReader: Send + Sync {
    /// The receipt representation of the underlying network.
    type Receipt: Send + 'static;

    /// Returns the receipt of `hash`, or `None` if the transaction is not mined yet.
    fn transaction_receipt(
        &self,
        hash: TxHash,
    ) -> impl Future<Output = Result<Option<Self::Receipt>, PollerError>> + Send;
}

pub(crate) fn filter_for_range(filter: &Filter, range: &RangeInclusive<BlockNumber>) -> Filter {
    filter.clone().from_block(*range.start()).to_block(*range.end())
}

impl<N: Network> BlockNumberReader for RootProvider<N> {
    async fn block_number(&self) -> Result<BlockNumber, PollerError> {
        Ok(self.get_block_number().await?)
    }
}

impl<N: Network> LogReader for RootProvider<N> {
    async fn logs_in_range(
        &self,
        range: RangeInclusive<BlockNumber>,
        filter: &Filter,
    ) -> Result<Vec<Log>, PollerError> {
        Ok(self.get_logs(&filter_for_range(filter, &range)).await?)
    }
}

impl<N: Network> ReceiptReader for RootProvider<N> {
    type Receipt = N::ReceiptResponse;

    async fn transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<Option<N::ReceiptResponse>, PollerError> {
        Ok(self.get_transaction_receipt(hash).await?)
    }
}

impl<N: Network> BlockNumberReader for DynProvider<N> {
    async fn block_number(&self) -> Result<BlockNumber, PollerError> {
        Ok(self.get_block_number().await?)
    }
}

impl<N: Network> LogReader for DynProvider<N> {
    async fn logs_in_range(
        &self,
        range: RangeInclusive<BlockNumber>,
        filter: &Filter,
    ) -> Result<Vec<Log>, PollerError> {
        Ok(self.get_logs(&filter_for_range(filter, &range)).await?)
    }
}

impl<N: Network> ReceiptReader for DynProvider<N> {
    type Receipt = N::ReceiptResponse;

    async fn transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<Option<N::ReceiptResponse>, PollerError> {
        Ok(self.get_transaction_receipt(hash).await?)
    }
}

impl<T: BlockNumberReader> BlockNumberReader for Arc<T> {
    fn block_number(&self) -> impl Future<Output = Result<BlockNumber, PollerError>> + Send {
        self.as_ref().block_number()
    }
}

impl<T: LogReader> LogReader for Arc<T> {
    fn logs_in_range(
        &self,
        range: RangeInclusive<BlockNumber>,
        filter: &Filter,
    ) -> impl Future<Output = Result<Vec<Log>, PollerError>> + Send {
        self.as_ref().logs_in_range(range, filter)
    }
}

impl<T: ReceiptReader> ReceiptReader for Arc<T> {
    type Receipt = T::Receipt;

    fn transaction_receipt(
        &self,
        hash: TxHash,
    ) -> impl Future<Output = Result<Option<T::Receipt>, PollerError>> + Send {
        self.as_ref().transaction_receipt(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::{
        eips::BlockNumberOrTag,
        network::Ethereum,
        primitives::U64,
        providers::mock::Asserter,
        rpc::{client::RpcClient, types::FilterBlockOption},
    };

    fn mocked_provider() -> (Asserter, RootProvider<Ethereum>) {
        let asserter = Asserter::new();
        let provider = RootProvider::new(RpcClient::mocked(asserter.clone()));
        (asserter, provider)
    }

    #[tokio::test]
    async fn root_provider_reads_block_number() -> anyhow::Result<()> {
        let (asserter, provider) = mocked_provider();
        asserter.push_success(&U64::from(42));

        assert_eq!(provider.block_number().await?, 42);

        Ok(())
    }

    #[tokio::test]
    async fn root_provider_wraps_transport_failures() {
        let (asserter, provider) = mocked_provider();
        asserter.push_failure_msg("boom");

        let result = BlockNumberReader::block_number(&provider).await;

        assert!(matches!(result, Err(PollerError::RpcError(_))));
    }

    #[tokio::test]
    async fn arc_reader_delegates() -> anyhow::Result<()> {
        let (asserter, provider) = mocked_provider();
        asserter.push_success(&U64::from(7));

        let shared = Arc::new(provider);

        assert_eq!(shared.block_number().await?, 7);

        Ok(())
    }

    #[test]
    fn range_replaces_filter_blocks() {
        let filter = Filter::new().from_block(1u64).to_block(2u64);

        let ranged = filter_for_range(&filter, &(10..=20));

        match ranged.block_option {
            FilterBlockOption::Range { from_block, to_block } => {
                assert_eq!(from_block, Some(BlockNumberOrTag::Number(10)));
                assert_eq!(to_block, Some(BlockNumberOrTag::Number(20)));
            }
            FilterBlockOption::AtBlockHash(_) => panic!("expected a block range"),
        }
    }
}
