//! Endpoint descriptors.
//!
//! # Design
//! An [`Endpoint<R>`] says everything about one call: where it goes, what it
//! sends, and, through its bound decoder, what `R` comes back. Builder
//! methods consume and return the endpoint so a finished value is never
//! mutated. Nothing is encoded at construction time, so building an endpoint
//! cannot fail; encoding happens in [`Requestable::url_request`], whose
//! failures surface as [`TransportError::UrlGeneration`].
//!
//! Transports see endpoints through the object-safe [`Requestable`] view, so
//! they never need to know `R`.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::config::NetworkConfig;
use crate::decoder::{
    EmptyResponseDecoder, JsonResponseDecoder, RawDataResponseDecoder, ResponseDecoder,
    TextResponseDecoder,
};
use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest};

/// How an endpoint's body parameters are written to the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyEncoding {
    #[default]
    Json,
    FormUrlEncoded,
}

impl BodyEncoding {
    pub fn content_type(&self) -> &'static str {
        match self {
            BodyEncoding::Json => "application/json",
            BodyEncoding::FormUrlEncoded => "application/x-www-form-urlencoded",
        }
    }
}

/// Type-erased view of an endpoint, as consumed by a transport.
pub trait Requestable: Send + Sync {
    fn path(&self) -> &str;
    fn is_full_path(&self) -> bool;
    fn method(&self) -> HttpMethod;
    fn headers(&self) -> &[(String, String)];
    fn query(&self) -> &[(String, String)];
    fn body(&self) -> Option<&Value>;
    fn body_encoding(&self) -> BodyEncoding;

    /// Resolve this endpoint against `config` into an executable request.
    fn url_request(&self, config: &NetworkConfig) -> Result<HttpRequest, TransportError> {
        let url = build_url(self, config)?;

        let mut headers: Vec<(String, String)> = config
            .headers
            .iter()
            .filter(|(name, _)| {
                !self
                    .headers()
                    .iter()
                    .any(|(own, _)| own.eq_ignore_ascii_case(name))
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        headers.extend(self.headers().iter().cloned());

        let body = match self.body() {
            Some(value) => {
                let encoding = self.body_encoding();
                if !headers.iter().any(|(name, _)| name.eq_ignore_ascii_case("content-type")) {
                    headers.push(("content-type".to_string(), encoding.content_type().to_string()));
                }
                Some(encode_body(value, encoding)?)
            }
            None => None,
        };

        Ok(HttpRequest {
            method: self.method(),
            url,
            headers,
            body,
        })
    }
}

fn build_url<E: Requestable + ?Sized>(
    endpoint: &E,
    config: &NetworkConfig,
) -> Result<Url, TransportError> {
    let raw = if endpoint.is_full_path() {
        endpoint.path().to_string()
    } else {
        let base = config.base_url.trim_end_matches('/');
        format!("{base}/{}", endpoint.path().trim_start_matches('/'))
    };
    let mut url =
        Url::parse(&raw).map_err(|e| TransportError::UrlGeneration(format!("{raw}: {e}")))?;

    if !config.query_parameters.is_empty() || !endpoint.query().is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &config.query_parameters {
            pairs.append_pair(key, value);
        }
        for (key, value) in endpoint.query() {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

fn encode_body(value: &Value, encoding: BodyEncoding) -> Result<Bytes, TransportError> {
    match encoding {
        BodyEncoding::Json => serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| TransportError::UrlGeneration(format!("body serialization failed: {e}"))),
        BodyEncoding::FormUrlEncoded => {
            let Value::Object(fields) = value else {
                return Err(TransportError::UrlGeneration(
                    "form-encoded body must be a JSON object".to_string(),
                ));
            };
            let mut form = url::form_urlencoded::Serializer::new(String::new());
            for (key, field) in fields {
                match field {
                    Value::String(text) => form.append_pair(key, text),
                    other => form.append_pair(key, &other.to_string()),
                };
            }
            Ok(Bytes::from(form.finish()))
        }
    }
}

/// Immutable description of one request whose response decodes to `R`.
pub struct Endpoint<R> {
    path: String,
    is_full_path: bool,
    method: HttpMethod,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: Option<Value>,
    body_encoding: BodyEncoding,
    decoder: Arc<dyn ResponseDecoder<R>>,
}

impl<R> Endpoint<R> {
    pub fn new(
        path: impl Into<String>,
        method: HttpMethod,
        decoder: impl ResponseDecoder<R> + 'static,
    ) -> Self {
        Self::with_shared_decoder(path, method, Arc::new(decoder))
    }

    /// Like [`Endpoint::new`], reusing a decoder already shared elsewhere.
    pub fn with_shared_decoder(
        path: impl Into<String>,
        method: HttpMethod,
        decoder: Arc<dyn ResponseDecoder<R>>,
    ) -> Self {
        Self {
            path: path.into(),
            is_full_path: false,
            method,
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
            body_encoding: BodyEncoding::default(),
            decoder,
        }
    }

    /// Treat `path` as an absolute URL instead of joining it to the base URL.
    pub fn with_full_path(mut self, is_full_path: bool) -> Self {
        self.is_full_path = is_full_path;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_body_encoding(mut self, encoding: BodyEncoding) -> Self {
        self.body_encoding = encoding;
        self
    }

    pub fn decoder(&self) -> &dyn ResponseDecoder<R> {
        self.decoder.as_ref()
    }
}

impl<R: DeserializeOwned + 'static> Endpoint<R> {
    /// Endpoint whose JSON response decodes into `R`.
    pub fn json(path: impl Into<String>, method: HttpMethod) -> Self {
        Self::new(path, method, JsonResponseDecoder::<R>::new())
    }
}

impl Endpoint<Bytes> {
    /// Endpoint whose response is the raw payload.
    pub fn raw(path: impl Into<String>, method: HttpMethod) -> Self {
        Self::new(path, method, RawDataResponseDecoder)
    }
}

impl Endpoint<String> {
    pub fn text(path: impl Into<String>, method: HttpMethod) -> Self {
        Self::new(path, method, TextResponseDecoder)
    }
}

impl Endpoint<()> {
    /// Endpoint whose success carries no value.
    pub fn void(path: impl Into<String>, method: HttpMethod) -> Self {
        Self::new(path, method, EmptyResponseDecoder)
    }
}

impl<R> Requestable for Endpoint<R> {
    fn path(&self) -> &str {
        &self.path
    }

    fn is_full_path(&self) -> bool {
        self.is_full_path
    }

    fn method(&self) -> HttpMethod {
        self.method
    }

    fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    fn query(&self) -> &[(String, String)] {
        &self.query
    }

    fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    fn body_encoding(&self) -> BodyEncoding {
        self.body_encoding
    }
}

impl<R> Clone for Endpoint<R> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            is_full_path: self.is_full_path,
            method: self.method,
            headers: self.headers.clone(),
            query: self.query.clone(),
            body: self.body.clone(),
            body_encoding: self.body_encoding,
            decoder: Arc::clone(&self.decoder),
        }
    }
}

impl<R> fmt::Debug for Endpoint<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("path", &self.path)
            .field("is_full_path", &self.is_full_path)
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("body", &self.body)
            .field("body_encoding", &self.body_encoding)
            .finish_non_exhaustive()
    }
}
