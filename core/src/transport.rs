//! Transport boundary and the default `ureq` transport.
//!
//! # Design
//! The provider depends only on [`TransportClient`]: given an endpoint, do
//! the exchange and hand back the payload or a [`TransportError`]. Status
//! interpretation belongs to the transport, so a non-2xx answer is already a
//! `TransportError::Status` by the time the provider sees it.
//!
//! [`UreqTransport`] runs ureq's blocking client on tokio's blocking pool.
//! Cancelling the request drops the awaiting future; a blocking call already
//! in progress runs to completion and its result is discarded.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::NetworkConfig;
use crate::endpoint::Requestable;
use crate::error::TransportError;
use crate::http::HttpRequest;

/// Performs the network exchange for an endpoint.
///
/// `Ok(None)` means the exchange succeeded without a body.
#[async_trait]
pub trait TransportClient: Send + Sync {
    async fn perform(&self, endpoint: &dyn Requestable) -> Result<Option<Bytes>, TransportError>;
}

/// Blocking `ureq` agent bound to one [`NetworkConfig`].
#[derive(Clone)]
pub struct UreqTransport {
    config: Arc<NetworkConfig>,
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(config: NetworkConfig) -> Self {
        // Non-2xx responses come back as data so the status and body can be
        // attached to the error.
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout())
            .build()
            .new_agent();
        Self {
            config: Arc::new(config),
            agent,
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TransportClient for UreqTransport {
    async fn perform(&self, endpoint: &dyn Requestable) -> Result<Option<Bytes>, TransportError> {
        let request = endpoint.url_request(&self.config)?;
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || execute(&agent, request))
            .await
            .map_err(|e| {
                if e.is_cancelled() {
                    TransportError::Cancelled
                } else {
                    TransportError::Other(format!("transport task failed: {e}"))
                }
            })?
    }
}

/// Execute `request` and classify the outcome.
fn execute(agent: &ureq::Agent, request: HttpRequest) -> Result<Option<Bytes>, TransportError> {
    let mut builder = ureq::http::Request::builder()
        .method(request.method.as_str())
        .uri(request.url.as_str());
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let invalid = |e: ureq::http::Error| TransportError::UrlGeneration(e.to_string());
    let result = match request.body {
        Some(body) => agent.run(builder.body(body.to_vec()).map_err(invalid)?),
        None => agent.run(builder.body(()).map_err(invalid)?),
    };
    let mut response = result.map_err(classify)?;

    let status = response.status().as_u16();
    let body = response.body_mut().read_to_vec().map_err(classify)?;
    tracing::debug!(status, bytes = body.len(), url = %request.url, "transport exchange finished");

    let body = (!body.is_empty()).then(|| Bytes::from(body));
    if (200..300).contains(&status) {
        Ok(body)
    } else {
        Err(TransportError::Status { status, body })
    }
}

fn classify(error: ureq::Error) -> TransportError {
    match error {
        ureq::Error::StatusCode(status) => TransportError::Status { status, body: None },
        ureq::Error::Timeout(_) => TransportError::Timeout,
        ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => TransportError::NotConnected,
        ureq::Error::BadUri(uri) => TransportError::UrlGeneration(uri),
        ureq::Error::Io(e) => classify_io(&e),
        other => TransportError::Other(other.to_string()),
    }
}

fn classify_io(error: &io::Error) -> TransportError {
    match error.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportError::Timeout,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::AddrNotAvailable => {
            TransportError::NotConnected
        }
        _ => TransportError::Connection(error.to_string()),
    }
}
