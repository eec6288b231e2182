use std::{pin::Pin, time::Duration};

use alloy::{network::Network, providers::RootProvider};

use crate::{
    PollerError,
    robust_provider::{IntoRootProvider, RobustProvider},
};

/// A fallback endpoint that is connected when the provider is built.
type PendingConnection<N> =
    Pin<Box<dyn Future<Output = Result<RootProvider<N>, PollerError>> + Send>>;

/// Upper bound for one call, retries included, per endpoint.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);
/// Retries of a transient failure before moving on to the next endpoint.
pub const DEFAULT_MAX_RETRIES: usize = 3;
/// First backoff delay; later delays grow exponentially.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_secs(1);

/// Builder/configuration for a [`RobustProvider`].
///
/// The endpoint passed to [`new`](Self::new) is the primary one. Endpoints added with
/// [`fallback`](Self::fallback) are only used once the primary fails a call for good.
pub struct RobustProviderBuilder<N: Network, P: IntoRootProvider<N>> {
    primary: P,
    fallbacks: Vec<PendingConnection<N>>,
    call_timeout: Duration,
    max_retries: usize,
    min_delay: Duration,
}

impl<N: Network, P: IntoRootProvider<N>> RobustProviderBuilder<N, P> {
    #[must_use]
    pub fn new(primary: P) -> Self {
        Self {
            primary,
            fallbacks: Vec::new(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            min_delay: DEFAULT_MIN_DELAY,
        }
    }

    /// A builder that never retries; each endpoint gets one attempt bounded by the call timeout.
    #[must_use]
    pub fn fragile(primary: P) -> Self {
        Self::new(primary).max_retries(0).min_delay(Duration::ZERO)
    }

    /// Appends a fallback endpoint.
    #[must_use]
    pub fn fallback<F: IntoRootProvider<N> + Send + 'static>(mut self, provider: F) -> Self {
        self.fallbacks.push(Box::pin(provider.into_root_provider()));
        self
    }

    #[must_use]
    pub fn call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    #[must_use]
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    /// Connects every endpoint and returns the provider.
    ///
    /// # Errors
    ///
    /// Returns the first connection error, primary endpoint first.
    pub async fn build(self) -> Result<RobustProvider<N>, PollerError> {
        let primary_provider = self.primary.into_root_provider().await?;

        let mut fallback_providers = Vec::with_capacity(self.fallbacks.len());
        for (index, connection) in self.fallbacks.into_iter().enumerate() {
            trace!(fallback_index = index, "Connecting fallback endpoint");
            fallback_providers.push(connection.await?);
        }

        debug!(
            call_timeout_ms = self.call_timeout.as_millis(),
            max_retries = self.max_retries,
            fallback_count = fallback_providers.len(),
            "Robust provider ready"
        );

        Ok(RobustProvider {
            primary_provider,
            fallback_providers,
            call_timeout: self.call_timeout,
            max_retries: self.max_retries,
            min_delay: self.min_delay,
        })
    }
}
