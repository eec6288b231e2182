use alloy::{
    network::{Ethereum, Network},
    providers::{
        DynProvider, Provider, RootProvider,
        fillers::{FillProvider, TxFiller},
    },
    transports::http::reqwest::Url,
};

use crate::{
    PollerError,
    robust_provider::{RobustProvider, RobustProviderBuilder},
};

/// Anything that can hand out an alloy [`RootProvider`]: connection strings, URLs and the
/// common provider wrappers.
pub trait IntoRootProvider<N: Network = Ethereum> {
    /// Resolves `self` into a [`RootProvider`], connecting if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    fn into_root_provider(
        self,
    ) -> impl Future<Output = Result<RootProvider<N>, PollerError>> + Send;
}

impl<N: Network> IntoRootProvider<N> for RootProvider<N> {
    async fn into_root_provider(self) -> Result<RootProvider<N>, PollerError> {
        Ok(self)
    }
}

impl<N: Network> IntoRootProvider<N> for RobustProvider<N> {
    async fn into_root_provider(self) -> Result<RootProvider<N>, PollerError> {
        Ok(self.primary_provider)
    }
}

impl<N: Network> IntoRootProvider<N> for DynProvider<N> {
    async fn into_root_provider(self) -> Result<RootProvider<N>, PollerError> {
        Ok(self.root().clone())
    }
}

impl<F, P, N> IntoRootProvider<N> for FillProvider<F, P, N>
where
    F: TxFiller<N>,
    P: Provider<N>,
    N: Network,
{
    async fn into_root_provider(self) -> Result<RootProvider<N>, PollerError> {
        Ok(self.root().clone())
    }
}

impl<N: Network> IntoRootProvider<N> for Url {
    async fn into_root_provider(self) -> Result<RootProvider<N>, PollerError> {
        Ok(RootProvider::new_http(self))
    }
}

impl<N: Network> IntoRootProvider<N> for &str {
    async fn into_root_provider(self) -> Result<RootProvider<N>, PollerError> {
        Ok(RootProvider::connect(self).await?)
    }
}

/// Conversion into a [`RobustProvider`] with default retry settings.
pub trait IntoRobustProvider<N: Network = Ethereum> {
    /// Wraps `self` into a [`RobustProvider`] without fallbacks.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to connect.
    fn into_robust_provider(
        self,
    ) -> impl Future<Output = Result<RobustProvider<N>, PollerError>> + Send;
}

impl<N: Network, P: IntoRootProvider<N> + Send + 'static> IntoRobustProvider<N> for P {
    async fn into_robust_provider(self) -> Result<RobustProvider<N>, PollerError> {
        RobustProviderBuilder::new(self).build().await
    }
}
