//! Call interception for readers.
//!
//! [`HandledClient`] wraps any reader and runs a [`CallHandler`] around every delegated call.
//! Handlers observe the method name and a rendering of its arguments; they can veto a call
//! before it is made and replace the error of a failed one, but never touch successful results.

use std::{fmt, ops::RangeInclusive};

use alloy::{
    primitives::{BlockNumber, TxHash},
    rpc::types::{Filter, Log},
};

use crate::{
    PollerError,
    reader::{BlockNumberReader, LogReader, ReceiptReader},
};

/// A call about to be delegated, or just delegated, by a [`HandledClient`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientCall {
    /// JSON-RPC method name.
    pub method: &'static str,
    /// Human readable arguments.
    pub args: String,
}

impl fmt::Display for ClientCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.method, self.args)
    }
}

/// Hooks run around every call of a [`HandledClient`].
pub trait CallHandler: Send + Sync {
    /// Runs before the call. Returning an error skips the call and fails with that error.
    ///
    /// # Errors
    ///
    /// Any error the handler wants the caller to see instead of making the call.
    fn before_call(&self, call: &ClientCall) -> Result<(), PollerError> {
        _ = call;
        Ok(())
    }

    /// Runs after the call with its error, if any.
    ///
    /// For failed calls a returned error replaces the original one. The return value is ignored
    /// for successful calls.
    fn after_call(&self, call: &ClientCall, error: Option<&PollerError>) -> Option<PollerError> {
        _ = (call, error);
        None
    }
}

/// Handler that does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHandler;

impl CallHandler for NoopHandler {}

/// Handler that logs every call and every failure.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingHandler;

impl CallHandler for LoggingHandler {
    fn before_call(&self, call: &ClientCall) -> Result<(), PollerError> {
        debug!(method = call.method, args = %call.args, "Client call");
        Ok(())
    }

    fn after_call(&self, call: &ClientCall, error: Option<&PollerError>) -> Option<PollerError> {
        if let Some(error) = error {
            warn!(method = call.method, args = %call.args, error = %error, "Client call failed");
        }
        None
    }
}

/// A reader whose calls pass through a [`CallHandler`].
#[derive(Clone, Debug)]
pub struct HandledClient<R, H = NoopHandler> {
    inner: R,
    handler: H,
}

impl<R, H: CallHandler> HandledClient<R, H> {
    #[must_use]
    pub fn new(inner: R, handler: H) -> Self {
        Self { inner, handler }
    }

    /// The wrapped reader.
    #[must_use]
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// The handler applied to every call.
    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    async fn intercept<T>(
        &self,
        call: ClientCall,
        delegate: impl Future<Output = Result<T, PollerError>>,
    ) -> Result<T, PollerError> {
        self.handler.before_call(&call)?;

        match delegate.await {
            Ok(value) => {
                self.handler.after_call(&call, None);
                Ok(value)
            }
            Err(error) => Err(self.handler.after_call(&call, Some(&error)).unwrap_or(error)),
        }
    }
}

impl<R: BlockNumberReader, H: CallHandler> BlockNumberReader for HandledClient<R, H> {
    async fn block_number(&self) -> Result<BlockNumber, PollerError> {
        let call = ClientCall { method: "eth_blockNumber", args: String::new() };
        self.intercept(call, self.inner.block_number()).await
    }
}

impl<R: LogReader, H: CallHandler> LogReader for HandledClient<R, H> {
    async fn logs_in_range(
        &self,
        range: RangeInclusive<BlockNumber>,
        filter: &Filter,
    ) -> Result<Vec<Log>, PollerError> {
        let call = ClientCall {
            method: "eth_getLogs",
            args: format!("{}..={}", range.start(), range.end()),
        };
        self.intercept(call, self.inner.logs_in_range(range, filter)).await
    }
}

impl<R: ReceiptReader, H: CallHandler> ReceiptReader for HandledClient<R, H> {
    type Receipt = R::Receipt;

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<R::Receipt>, PollerError> {
        let call = ClientCall { method: "eth_getTransactionReceipt", args: hash.to_string() };
        self.intercept(call, self.inner.transaction_receipt(hash)).await
    }
}
