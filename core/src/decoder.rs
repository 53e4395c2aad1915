//! Response decoders.
//!
//! # Design
//! A decoder is chosen when an [`crate::Endpoint`] is built, and the decoder
//! type fixes the endpoint's response type. [`RawDataResponseDecoder`] only
//! implements `ResponseDecoder<Bytes>`, so pairing it with any other response
//! type is a compile error rather than a runtime type mismatch:
//!
//! ```compile_fail
//! use data_provider::{Endpoint, HttpMethod, RawDataResponseDecoder};
//!
//! #[derive(serde::Deserialize)]
//! struct Point { x: i64, y: i64 }
//!
//! let endpoint: Endpoint<Point> =
//!     Endpoint::new("points/1", HttpMethod::Get, RawDataResponseDecoder);
//! ```

use std::marker::PhantomData;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::DecodeError;

/// Converts a raw payload into `R`.
///
/// Implementations hold no mutable state; one instance is shared by every
/// request made through the endpoints it is bound to.
pub trait ResponseDecoder<R>: Send + Sync {
    fn decode(&self, payload: &[u8]) -> Result<R, DecodeError>;

    /// Whether a missing payload is a [`crate::ProviderError::NoResponse`].
    fn requires_payload(&self) -> bool {
        true
    }
}

/// Deserializes JSON into any `DeserializeOwned` type.
pub struct JsonResponseDecoder<R> {
    _response: PhantomData<fn() -> R>,
}

impl<R> JsonResponseDecoder<R> {
    pub fn new() -> Self {
        Self {
            _response: PhantomData,
        }
    }
}

impl<R> Default for JsonResponseDecoder<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> std::fmt::Debug for JsonResponseDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JsonResponseDecoder")
    }
}

impl<R: DeserializeOwned> ResponseDecoder<R> for JsonResponseDecoder<R> {
    fn decode(&self, payload: &[u8]) -> Result<R, DecodeError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Hands the payload back untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawDataResponseDecoder;

impl ResponseDecoder<Bytes> for RawDataResponseDecoder {
    fn decode(&self, payload: &[u8]) -> Result<Bytes, DecodeError> {
        Ok(Bytes::copy_from_slice(payload))
    }
}

/// Validates the payload as UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextResponseDecoder;

impl ResponseDecoder<String> for TextResponseDecoder {
    fn decode(&self, payload: &[u8]) -> Result<String, DecodeError> {
        Ok(std::str::from_utf8(payload)?.to_owned())
    }
}

/// Decoder for endpoints that return nothing of interest.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyResponseDecoder;

impl ResponseDecoder<()> for EmptyResponseDecoder {
    fn decode(&self, _payload: &[u8]) -> Result<(), DecodeError> {
        Ok(())
    }

    fn requires_payload(&self) -> bool {
        false
    }
}
