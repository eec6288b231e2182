use std::{fmt::Debug, ops::RangeInclusive, time::Duration};

use alloy::{
    network::{Ethereum, Network},
    primitives::{BlockNumber, TxHash},
    providers::{Provider, RootProvider},
    rpc::types::{Filter, Log},
    transports::{RpcError, TransportErrorKind},
};
use backon::{ExponentialBuilder, Retryable};
use tokio::time::timeout;

use crate::{
    PollerError,
    error::is_transient_rpc_error,
    reader::{BlockNumberReader, LogReader, ReceiptReader, filter_for_range},
};

/// Provider wrapper with built-in retry and timeout mechanisms.
///
/// Every call is bounded by the call timeout and retried with exponential backoff while the
/// failure is transient. When the primary provider keeps failing, the call is repeated against
/// each fallback provider in the order they were added.
#[derive(Clone, Debug)]
pub struct RobustProvider<N: Network = Ethereum> {
    pub(crate) primary_provider: RootProvider<N>,
    pub(crate) fallback_providers: Vec<RootProvider<N>>,
    pub(crate) call_timeout: Duration,
    pub(crate) max_retries: usize,
    pub(crate) min_delay: Duration,
}

impl<N: Network> RobustProvider<N> {
    /// Get a reference to the primary provider
    #[must_use]
    pub fn primary(&self) -> &RootProvider<N> {
        &self.primary_provider
    }

    /// Number of configured fallback providers.
    #[must_use]
    pub fn fallback_count(&self) -> usize {
        self.fallback_providers.len()
    }

    /// Fetch the latest block number with retry and timeout.
    ///
    /// # Errors
    ///
    /// See [retry errors](#retry-errors).
    pub async fn get_block_number(&self) -> Result<BlockNumber, PollerError> {
        trace!("eth_blockNumber called");
        let result = self
            .try_operation_with_failover(
                move |provider| async move { provider.get_block_number().await },
            )
            .await;
        if let Err(e) = &result {
            error!(error = %e, "eth_blockNumber failed");
        }
        result
    }

    /// Fetch logs for the given [`Filter`] with retry and timeout.
    ///
    /// # Errors
    ///
    /// See [retry errors](#retry-errors).
    pub async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, PollerError> {
        trace!("eth_getLogs called");
        let result = self
            .try_operation_with_failover(
                move |provider| async move { provider.get_logs(filter).await },
            )
            .await;
        if let Err(e) = &result {
            error!(error = %e, "eth_getLogs failed");
        }
        result
    }

    /// Fetch the receipt of a transaction with retry and timeout.
    ///
    /// Returns `None` while the transaction is not mined.
    ///
    /// # Errors
    ///
    /// See [retry errors](#retry-errors).
    pub async fn get_transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<Option<N::ReceiptResponse>, PollerError> {
        trace!(tx_hash = %hash, "eth_getTransactionReceipt called");
        let result = self
            .try_operation_with_failover(
                move |provider| async move { provider.get_transaction_receipt(hash).await },
            )
            .await;
        if let Err(e) = &result {
            error!(error = %e, tx_hash = %hash, "eth_getTransactionReceipt failed");
        }
        result
    }

    /// Runs `operation` against the primary endpoint, then against each fallback in order,
    /// until one attempt succeeds.
    ///
    /// On each endpoint the operation is retried with exponential backoff while the failure is
    /// transient, all within one `call_timeout`. Any failure on an endpoint, transient or not,
    /// moves on to the next one.
    ///
    /// # Errors
    /// <a name="retry-errors"></a>
    ///
    /// * [`PollerError::Timeout`] - the last endpoint tried exceeded the call timeout.
    /// * [`PollerError::RpcError`] - the last error of the last endpoint tried.
    pub(crate) async fn try_operation_with_failover<T: Debug, F, Fut>(
        &self,
        operation: F,
    ) -> Result<T, PollerError>
    where
        F: Fn(RootProvider<N>) -> Fut,
        Fut: Future<Output = Result<T, RpcError<TransportErrorKind>>>,
    {
        let endpoints = std::iter::once(&self.primary_provider).chain(&self.fallback_providers);

        let mut last_error = None;
        for (index, provider) in endpoints.enumerate() {
            if let Some(err) = &last_error {
                warn!(fallback_index = index, error = %err, "Endpoint failed, switching to fallback");
            }

            match self.call_with_retries(provider, &operation).await {
                Ok(value) => {
                    if index > 0 {
                        info!(fallback_index = index, "Fallback endpoint succeeded");
                    }
                    return Ok(value);
                }
                Err(err) => last_error = Some(err),
            }
        }

        // the primary endpoint always runs, so an error was recorded
        Err(last_error.unwrap_or(PollerError::Timeout))
    }

    /// One endpoint: backoff retries on transient errors, bounded by the call timeout.
    async fn call_with_retries<T, F, Fut>(
        &self,
        provider: &RootProvider<N>,
        operation: F,
    ) -> Result<T, PollerError>
    where
        F: Fn(RootProvider<N>) -> Fut,
        Fut: Future<Output = Result<T, RpcError<TransportErrorKind>>>,
    {
        let backoff = ExponentialBuilder::default()
            .with_max_times(self.max_retries)
            .with_min_delay(self.min_delay);

        let attempts = (|| operation(provider.clone()))
            .retry(backoff)
            .when(is_transient_rpc_error)
            .notify(|err: &RpcError<TransportErrorKind>, delay: Duration| {
                debug!(error = %err, delay_ms = delay.as_millis(), "Transient RPC error, backing off");
            })
            .sleep(tokio::time::sleep);

        Ok(timeout(self.call_timeout, attempts).await??)
    }
}

impl<N: Network> BlockNumberReader for RobustProvider<N> {
    async fn block_number(&self) -> Result<BlockNumber, PollerError> {
        self.get_block_number().await
    }
}

impl<N: Network> LogReader for RobustProvider<N> {
    async fn logs_in_range(
        &self,
        range: RangeInclusive<BlockNumber>,
        filter: &Filter,
    ) -> Result<Vec<Log>, PollerError> {
        self.get_logs(&filter_for_range(filter, &range)).await
    }
}

impl<N: Network> ReceiptReader for RobustProvider<N> {
    type Receipt = N::ReceiptResponse;

    async fn transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<Option<N::ReceiptResponse>, PollerError> {
        self.get_transaction_receipt(hash).await
    }
}
