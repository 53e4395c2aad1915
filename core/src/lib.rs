//! Typed data provider over an opaque HTTP transport.
//!
//! # Overview
//! Callers describe a request as an [`Endpoint<R>`], naming the response type
//! `R` it decodes to, and submit it through [`DataProvider::request`]. The
//! provider drives a [`TransportClient`], decodes the payload, classifies
//! failures into [`ProviderError`], and delivers exactly one outcome per
//! request on the caller's [`DeliveryLoop`].
//!
//! # Design
//! - The decoder is bound when the endpoint is built, so decoder and response
//!   type cannot disagree at request time.
//! - Failures are logged by an [`ErrorLogger`] before an [`ErrorResolver`]
//!   gets to reclassify them; the resolver tags its answer explicitly.
//! - Nothing is global: configuration, transport and policies are passed in.
//! - [`UreqTransport`] is the default transport; any [`TransportClient`]
//!   can replace it.
//!
//! ```no_run
//! use data_provider::{
//!     delivery_queue, DataProvider, Endpoint, HttpMethod, NetworkConfig, UreqTransport,
//! };
//!
//! #[derive(Debug, serde::Deserialize)]
//! struct Point {
//!     x: i64,
//!     y: i64,
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = UreqTransport::new(NetworkConfig::new("http://localhost:3000"));
//! let (dispatcher, delivery) = delivery_queue();
//! let provider = DataProvider::new(transport, dispatcher)?;
//!
//! provider.request(Endpoint::<Point>::json("points/1", HttpMethod::Get), |result| {
//!     match result {
//!         Ok(point) => println!("({}, {})", point.x, point.y),
//!         Err(error) => eprintln!("request failed: {error}"),
//!     }
//! });
//! drop(provider);
//! delivery.run().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod decoder;
pub mod delivery;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod logger;
pub mod provider;
pub mod resolver;
pub mod transport;

pub use config::{ConfigError, NetworkConfig};
pub use decoder::{
    EmptyResponseDecoder, JsonResponseDecoder, RawDataResponseDecoder, ResponseDecoder,
    TextResponseDecoder,
};
pub use delivery::{delivery_queue, DeliveryLoop, Dispatcher};
pub use endpoint::{BodyEncoding, Endpoint, Requestable};
pub use error::{BoxError, DecodeError, ProviderError, TransportError};
pub use http::{HttpMethod, HttpRequest};
pub use logger::{ErrorLogger, NoopErrorLogger, TracingErrorLogger};
pub use provider::{BuildError, CancelHandle, DataProvider, DataProviderBuilder};
pub use resolver::{ErrorResolver, IdentityErrorResolver, Resolution};
pub use transport::{TransportClient, UreqTransport};
