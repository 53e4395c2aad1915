//! Diagnostic logging of pipeline failures.
//!
//! A logger observes every decode and transport failure before the provider
//! packages it for the caller. It cannot change what the caller receives.

use std::error::Error;
use std::fmt::Write as _;

pub trait ErrorLogger: Send + Sync {
    fn log(&self, error: &(dyn Error + 'static));
}

/// Emits a `tracing` warning with the error and its source chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorLogger;

impl ErrorLogger for TracingErrorLogger {
    fn log(&self, error: &(dyn Error + 'static)) {
        tracing::warn!(error = %error, chain = %source_chain(error), "request failed");
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopErrorLogger;

impl ErrorLogger for NoopErrorLogger {
    fn log(&self, _error: &(dyn Error + 'static)) {}
}

/// Render `error`'s causes as `cause: cause: ...`, empty if there are none.
pub(crate) fn source_chain(error: &(dyn Error + 'static)) -> String {
    let mut chain = String::new();
    let mut source = error.source();
    while let Some(cause) = source {
        if !chain.is_empty() {
            chain.push_str(": ");
        }
        let _ = write!(chain, "{cause}");
        source = cause.source();
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProviderError, TransportError};

    #[test]
    fn chain_lists_nested_causes() {
        let error = ProviderError::NetworkFailure(TransportError::Timeout);
        assert_eq!(source_chain(&error), "request timed out");
        assert_eq!(source_chain(&TransportError::Timeout), "");
    }

    #[test]
    fn loggers_accept_any_error() {
        TracingErrorLogger.log(&TransportError::NotConnected);
        NoopErrorLogger.log(&TransportError::NotConnected);
    }
}
