//! Error types for the data provider pipeline.
//!
//! # Design
//! Three layers, one enum each:
//! - [`TransportError`] is what a transport reports. It is `Clone` so a
//!   resolver can inspect it and the provider can still wrap the original.
//! - [`DecodeError`] is what a response decoder reports.
//! - [`ProviderError`] is the closed set of terminal errors a caller sees.
//!   Every variant that has a cause exposes it through `source()`.

use bytes::Bytes;
use thiserror::Error;

/// Boxed error produced by a resolver that reclassified a transport failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A transport-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The server answered with a non-2xx status.
    #[error("server responded with HTTP {status}")]
    Status { status: u16, body: Option<Bytes> },

    /// The host could not be resolved or reached.
    #[error("not connected: host unreachable")]
    NotConnected,

    #[error("request timed out")]
    Timeout,

    /// The connection broke mid-exchange (reset, aborted, unexpected EOF).
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request cancelled")]
    Cancelled,

    /// The endpoint could not be turned into a valid request.
    #[error("could not build request: {0}")]
    UrlGeneration(String),

    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// The HTTP status code, if the failure carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure to turn a payload into the endpoint's response type.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// The decoder panicked instead of returning an error.
    #[error("decoder panicked: {0}")]
    Panicked(String),
}

/// Terminal error delivered to a request's completion.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The transport succeeded but returned no payload where one was required.
    #[error("no response payload")]
    NoResponse,

    #[error("failed to parse response")]
    Parsing(#[source] DecodeError),

    /// The transport failed and the resolver left the failure as is.
    #[error("network failure: {0}")]
    NetworkFailure(#[source] TransportError),

    /// The transport failed and the resolver reclassified it.
    #[error("network failure: {0}")]
    ResolvedFailure(#[source] BoxError),
}

impl ProviderError {
    /// The original transport failure, when the error is an unresolved one.
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            ProviderError::NetworkFailure(error) => Some(error),
            _ => None,
        }
    }
}
