//! The request facade.
//!
//! # Design
//! [`DataProvider::request`] returns a [`CancelHandle`] at once and runs the
//! exchange as a tokio task:
//!
//! 1. the transport performs the endpoint;
//! 2. a payload goes through the endpoint's decoder, a failure goes to the
//!    error logger and then the error resolver;
//! 3. the single terminal outcome is dispatched to the [`DeliveryLoop`],
//!    never called inline.
//!
//! Each request owns its state. The transport, resolver and logger are shared
//! read-only behind `Arc`s, so any number of requests may be in flight.
//!
//! A request's fate is a small state machine (`PENDING` to `CANCELLED` or
//! `DELIVERED`), settled by one compare-and-swap. Whichever of cancel and
//! delivery wins, the other becomes a no-op, so a completion runs at most
//! once and never after a successful cancel.
//!
//! [`DeliveryLoop`]: crate::delivery::DeliveryLoop

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::FutureExt;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::delivery::Dispatcher;
use crate::endpoint::{Endpoint, Requestable};
use crate::error::{DecodeError, ProviderError, TransportError};
use crate::logger::{ErrorLogger, TracingErrorLogger};
use crate::resolver::{ErrorResolver, IdentityErrorResolver, Resolution};
use crate::transport::TransportClient;

/// Error constructing a [`DataProvider`].
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no tokio runtime to run requests on: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

const PENDING: u8 = 0;
const CANCELLED: u8 = 1;
const DELIVERED: u8 = 2;

#[derive(Debug)]
struct RequestState(AtomicU8);

impl RequestState {
    fn new() -> Self {
        Self(AtomicU8::new(PENDING))
    }

    fn transition(&self, to: u8) -> bool {
        self.0
            .compare_exchange(PENDING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn is(&self, state: u8) -> bool {
        self.0.load(Ordering::Acquire) == state
    }
}

/// Caller-held token for one in-flight request.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    state: Arc<RequestState>,
    task: AbortHandle,
}

impl CancelHandle {
    /// Suppress the completion if it has not run yet. Idempotent.
    pub fn cancel(&self) {
        if self.state.transition(CANCELLED) {
            self.task.abort();
            tracing::debug!("request cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is(CANCELLED)
    }

    /// Whether the completion has run.
    pub fn is_delivered(&self) -> bool {
        self.state.is(DELIVERED)
    }

    /// Whether the request task has stopped, whether or not its completion ran yet.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

struct Shared {
    transport: Arc<dyn TransportClient>,
    resolver: Arc<dyn ErrorResolver>,
    logger: Arc<dyn ErrorLogger>,
    dispatcher: Dispatcher,
}

impl Shared {
    /// Run the transport, logging and resolving a failure.
    ///
    /// A panicking transport counts as a transport failure.
    async fn perform(&self, endpoint: &dyn Requestable) -> Result<Option<Bytes>, ProviderError> {
        let result = AssertUnwindSafe(self.transport.perform(endpoint))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(TransportError::Other(format!(
                    "transport panicked: {}",
                    panic_message(&*panic)
                )))
            });
        match result {
            Ok(payload) => Ok(payload.filter(|bytes| !bytes.is_empty())),
            Err(error) => {
                self.log(&error);
                Err(self.resolve(error))
            }
        }
    }

    fn decode<R>(
        &self,
        endpoint: &Endpoint<R>,
        payload: Option<Bytes>,
    ) -> Result<R, ProviderError> {
        let decoder = endpoint.decoder();
        let payload = match payload {
            Some(payload) => payload,
            None if decoder.requires_payload() => return Err(ProviderError::NoResponse),
            None => Bytes::new(),
        };
        catch_unwind(AssertUnwindSafe(|| decoder.decode(&payload)))
            .unwrap_or_else(|panic| Err(DecodeError::Panicked(panic_message(&*panic))))
            .map_err(|error| {
                self.log(&error);
                ProviderError::Parsing(error)
            })
    }

    /// A panicking resolver leaves the failure unresolved.
    fn resolve(&self, error: TransportError) -> ProviderError {
        match catch_unwind(AssertUnwindSafe(|| self.resolver.resolve(&error))) {
            Ok(Resolution::Unresolved) => ProviderError::NetworkFailure(error),
            Ok(Resolution::Reclassified(resolved)) => ProviderError::ResolvedFailure(resolved),
            Err(panic) => {
                tracing::error!(%error, panic = %panic_message(&*panic), "error resolver panicked");
                ProviderError::NetworkFailure(error)
            }
        }
    }

    fn log(&self, error: &(dyn std::error::Error + 'static)) {
        if catch_unwind(AssertUnwindSafe(|| self.logger.log(error))).is_err() {
            tracing::error!(%error, "error logger panicked");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Typed request facade over a [`TransportClient`].
#[derive(Clone)]
pub struct DataProvider {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl DataProvider {
    /// Provider with the identity resolver, the tracing logger, and the
    /// current tokio runtime.
    pub fn new(
        transport: impl TransportClient + 'static,
        dispatcher: Dispatcher,
    ) -> Result<Self, BuildError> {
        Self::builder(transport).build(dispatcher)
    }

    pub fn builder(transport: impl TransportClient + 'static) -> DataProviderBuilder {
        DataProviderBuilder {
            transport: Arc::new(transport),
            resolver: Arc::new(IdentityErrorResolver),
            logger: Arc::new(TracingErrorLogger),
            runtime: None,
        }
    }

    /// Perform `endpoint` and deliver its decoded response to `on_complete`.
    ///
    /// `on_complete` runs exactly once, on the delivery loop, unless the
    /// returned handle is cancelled first.
    pub fn request<R, F>(&self, endpoint: Endpoint<R>, on_complete: F) -> CancelHandle
    where
        R: Send + 'static,
        F: FnOnce(Result<R, ProviderError>) + Send + 'static,
    {
        self.spawn(endpoint, on_complete, |shared, endpoint, payload| {
            shared.decode(endpoint, payload)
        })
    }

    /// Perform `endpoint` and report success without looking at the payload.
    pub fn request_void<F>(&self, endpoint: Endpoint<()>, on_complete: F) -> CancelHandle
    where
        F: FnOnce(Result<(), ProviderError>) + Send + 'static,
    {
        self.spawn(endpoint, on_complete, |_, _, _| Ok(()))
    }

    fn spawn<R, F, C>(&self, endpoint: Endpoint<R>, on_complete: F, complete: C) -> CancelHandle
    where
        R: Send + 'static,
        F: FnOnce(Result<R, ProviderError>) + Send + 'static,
        C: FnOnce(&Shared, &Endpoint<R>, Option<Bytes>) -> Result<R, ProviderError>
            + Send
            + 'static,
    {
        let state = Arc::new(RequestState::new());
        let shared = Arc::clone(&self.shared);
        let delivery_state = Arc::clone(&state);

        let span = tracing::debug_span!(
            "request",
            request_id = %Uuid::new_v4(),
            method = %endpoint.method(),
            path = endpoint.path(),
        );
        let task = self.runtime.spawn(
            async move {
                let outcome = match shared.perform(&endpoint).await {
                    Ok(payload) => complete(&*shared, &endpoint, payload),
                    Err(error) => Err(error),
                };
                tracing::debug!(ok = outcome.is_ok(), "request finished");

                let span = tracing::Span::current();
                shared.dispatcher.dispatch(move || {
                    let _entered = span.enter();
                    if delivery_state.transition(DELIVERED) {
                        on_complete(outcome);
                    } else {
                        tracing::debug!("completion suppressed by cancel");
                    }
                });
            }
            .instrument(span),
        );

        CancelHandle {
            state,
            task: task.abort_handle(),
        }
    }
}

impl std::fmt::Debug for DataProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataProvider").finish_non_exhaustive()
    }
}

/// Builder for a [`DataProvider`] with substituted policies.
pub struct DataProviderBuilder {
    transport: Arc<dyn TransportClient>,
    resolver: Arc<dyn ErrorResolver>,
    logger: Arc<dyn ErrorLogger>,
    runtime: Option<Handle>,
}

impl DataProviderBuilder {
    pub fn error_resolver(mut self, resolver: impl ErrorResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn error_logger(mut self, logger: impl ErrorLogger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    /// Run requests on `runtime` instead of the runtime `build` is called from.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self, dispatcher: Dispatcher) -> Result<DataProvider, BuildError> {
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current()?,
        };
        Ok(DataProvider {
            shared: Arc::new(Shared {
                transport: self.transport,
                resolver: self.resolver,
                logger: self.logger,
                dispatcher,
            }),
            runtime,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde::Deserialize;

    use super::*;
    use crate::decoder::ResponseDecoder;
    use crate::delivery::{delivery_queue, DeliveryLoop};
    use crate::http::HttpMethod;
    use crate::logger::NoopErrorLogger;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Point {
        x: i64,
        y: i64,
    }

    /// Replays one scripted transport result, or never answers.
    struct ScriptedTransport {
        result: Mutex<Option<Result<Option<Bytes>, TransportError>>>,
    }

    impl ScriptedTransport {
        fn answering(result: Result<Option<Bytes>, TransportError>) -> Self {
            Self {
                result: Mutex::new(Some(result)),
            }
        }

        fn payload(bytes: &'static [u8]) -> Self {
            Self::answering(Ok(Some(Bytes::from_static(bytes))))
        }

        fn hanging() -> Self {
            Self {
                result: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl TransportClient for ScriptedTransport {
        async fn perform(
            &self,
            _endpoint: &dyn Requestable,
        ) -> Result<Option<Bytes>, TransportError> {
            let scripted = self.result.lock().unwrap().take();
            match scripted {
                Some(result) => result,
                None => std::future::pending().await,
            }
        }
    }

    #[derive(Default, Clone)]
    struct RecordingLogger {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl ErrorLogger for RecordingLogger {
        fn log(&self, error: &(dyn std::error::Error + 'static)) {
            self.seen.lock().unwrap().push(error.to_string());
        }
    }

    struct PanickingLogger;

    impl ErrorLogger for PanickingLogger {
        fn log(&self, _error: &(dyn std::error::Error + 'static)) {
            panic!("logger failure");
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("unauthenticated")]
    struct Unauthenticated;

    type Outcomes<R> = Arc<Mutex<Vec<Result<R, ProviderError>>>>;

    fn recorder<R: Send + 'static>() -> (
        Outcomes<R>,
        impl FnOnce(Result<R, ProviderError>) + Send + 'static,
    ) {
        let outcomes: Outcomes<R> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&outcomes);
        (outcomes, move |result| sink.lock().unwrap().push(result))
    }

    fn provider(
        transport: ScriptedTransport,
        logger: RecordingLogger,
    ) -> (DataProvider, DeliveryLoop) {
        let (dispatcher, delivery) = delivery_queue();
        let provider = DataProvider::builder(transport)
            .error_logger(logger)
            .build(dispatcher)
            .unwrap();
        (provider, delivery)
    }

    /// Drop the provider and drain the loop, so every outcome has been delivered.
    async fn settle(provider: DataProvider, delivery: DeliveryLoop) {
        drop(provider);
        delivery.run().await;
    }

    #[tokio::test]
    async fn raw_endpoint_delivers_payload() {
        let logger = RecordingLogger::default();
        let (provider, delivery) = provider(ScriptedTransport::payload(b"\x89PNG"), logger.clone());
        let (outcomes, on_complete) = recorder::<Bytes>();
        provider.request(Endpoint::raw("image.png", HttpMethod::Get), on_complete);
        settle(provider, delivery).await;

        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].as_ref().unwrap(), &Bytes::from_static(b"\x89PNG"));
        assert!(logger.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn json_endpoint_delivers_decoded_value() {
        let (provider, delivery) = provider(
            ScriptedTransport::payload(br#"{"x":1,"y":2}"#),
            RecordingLogger::default(),
        );
        let (outcomes, on_complete) = recorder::<Point>();
        provider.request(Endpoint::<Point>::json("points/1", HttpMethod::Get), on_complete);
        settle(provider, delivery).await;

        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].as_ref().unwrap(), &Point { x: 1, y: 2 });
    }

    #[tokio::test]
    async fn malformed_payload_is_parsing_error_logged_once() {
        let logger = RecordingLogger::default();
        let (provider, delivery) = provider(ScriptedTransport::payload(b"{"), logger.clone());
        let (outcomes, on_complete) = recorder::<Point>();
        provider.request(Endpoint::json("points/1", HttpMethod::Get), on_complete);
        settle(provider, delivery).await;

        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        let Err(ProviderError::Parsing(cause)) = &outcomes[0] else {
            panic!("expected parsing error, got {:?}", outcomes[0]);
        };
        assert!(matches!(cause, DecodeError::Json(_)));
        assert_eq!(*logger.seen.lock().unwrap(), vec![cause.to_string()]);
    }

    #[tokio::test]
    async fn missing_payload_is_no_response() {
        let logger = RecordingLogger::default();
        let (provider, delivery) = provider(ScriptedTransport::answering(Ok(None)), logger.clone());
        let (outcomes, on_complete) = recorder::<Point>();
        provider.request(Endpoint::json("points/1", HttpMethod::Get), on_complete);
        settle(provider, delivery).await;

        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], Err(ProviderError::NoResponse)));
        assert!(logger.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_payload_counts_as_missing() {
        let (provider, delivery) =
            provider(ScriptedTransport::payload(b""), RecordingLogger::default());
        let (outcomes, on_complete) = recorder::<Bytes>();
        provider.request(Endpoint::raw("image.png", HttpMethod::Get), on_complete);
        settle(provider, delivery).await;

        assert!(matches!(outcomes.lock().unwrap()[0], Err(ProviderError::NoResponse)));
    }

    #[tokio::test]
    async fn connection_reset_is_network_failure_with_identity_resolver() {
        let logger = RecordingLogger::default();
        let reset = TransportError::Connection("connection reset".to_string());
        let (provider, delivery) =
            provider(ScriptedTransport::answering(Err(reset.clone())), logger.clone());
        let (outcomes, on_complete) = recorder::<Point>();
        provider.request(Endpoint::json("points/1", HttpMethod::Get), on_complete);
        settle(provider, delivery).await;

        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            Err(ProviderError::NetworkFailure(error)) => assert_eq!(error, &reset),
            other => panic!("expected network failure, got {other:?}"),
        }
        assert_eq!(*logger.seen.lock().unwrap(), vec![reset.to_string()]);
    }

    #[tokio::test]
    async fn reclassified_failure_is_resolved_failure_but_logs_original() {
        let logger = RecordingLogger::default();
        let (dispatcher, delivery) = delivery_queue();
        let unauthorized = TransportError::Status {
            status: 401,
            body: None,
        };
        let transport = ScriptedTransport::answering(Err(unauthorized.clone()));
        let provider = DataProvider::builder(transport)
            .error_logger(logger.clone())
            .error_resolver(|error: &TransportError| match error.status() {
                Some(401) => Resolution::reclassify(Unauthenticated),
                _ => Resolution::Unresolved,
            })
            .build(dispatcher)
            .unwrap();
        let (outcomes, on_complete) = recorder::<Point>();
        provider.request(Endpoint::json("me", HttpMethod::Get), on_complete);
        settle(provider, delivery).await;

        let outcomes = outcomes.lock().unwrap();
        match &outcomes[0] {
            Err(ProviderError::ResolvedFailure(error)) => assert!(error.is::<Unauthenticated>()),
            other => panic!("expected resolved failure, got {other:?}"),
        }
        assert_eq!(*logger.seen.lock().unwrap(), vec![unauthorized.to_string()]);
    }

    #[tokio::test]
    async fn void_request_ignores_payload() {
        let (provider, delivery) =
            provider(ScriptedTransport::payload(b"not json"), RecordingLogger::default());
        let (outcomes, on_complete) = recorder::<()>();
        provider.request_void(Endpoint::void("points/1", HttpMethod::Delete), on_complete);
        settle(provider, delivery).await;

        assert!(matches!(outcomes.lock().unwrap()[..], [Ok(())]));
    }

    #[tokio::test]
    async fn void_endpoint_through_request_tolerates_missing_payload() {
        let (provider, delivery) =
            provider(ScriptedTransport::answering(Ok(None)), RecordingLogger::default());
        let (outcomes, on_complete) = recorder::<()>();
        provider.request(Endpoint::void("points/1", HttpMethod::Delete), on_complete);
        settle(provider, delivery).await;

        assert!(matches!(outcomes.lock().unwrap()[..], [Ok(())]));
    }

    #[tokio::test]
    async fn void_request_still_reports_transport_failure() {
        let (provider, delivery) = provider(
            ScriptedTransport::answering(Err(TransportError::Timeout)),
            RecordingLogger::default(),
        );
        let (outcomes, on_complete) = recorder::<()>();
        provider.request_void(Endpoint::void("points/1", HttpMethod::Delete), on_complete);
        settle(provider, delivery).await;

        assert!(matches!(
            outcomes.lock().unwrap()[..],
            [Err(ProviderError::NetworkFailure(TransportError::Timeout))]
        ));
    }

    #[tokio::test]
    async fn completion_is_dispatched_not_called_inline() {
        let (provider, mut delivery) =
            provider(ScriptedTransport::payload(b"ok"), RecordingLogger::default());
        let (outcomes, on_complete) = recorder::<String>();
        let handle = provider.request(Endpoint::text("health", HttpMethod::Get), on_complete);

        while !handle.is_finished() {
            tokio::task::yield_now().await;
        }
        assert!(outcomes.lock().unwrap().is_empty());
        assert!(!handle.is_delivered());

        assert_eq!(delivery.run_pending(), 1);
        assert!(handle.is_delivered());
        assert_eq!(outcomes.lock().unwrap()[0].as_deref().unwrap(), "ok");
    }

    #[tokio::test]
    async fn cancel_before_completion_suppresses_delivery() {
        let (provider, delivery) =
            provider(ScriptedTransport::hanging(), RecordingLogger::default());
        let (outcomes, on_complete) = recorder::<Point>();
        let handle = provider.request(Endpoint::json("points/1", HttpMethod::Get), on_complete);
        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());

        settle(provider, delivery).await;
        assert!(outcomes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_after_dispatch_but_before_delivery_suppresses_it() {
        let (provider, delivery) =
            provider(ScriptedTransport::payload(b"ok"), RecordingLogger::default());
        let (outcomes, on_complete) = recorder::<String>();
        let handle = provider.request(Endpoint::text("health", HttpMethod::Get), on_complete);
        while !handle.is_finished() {
            tokio::task::yield_now().await;
        }
        handle.cancel();

        settle(provider, delivery).await;
        assert!(outcomes.lock().unwrap().is_empty());
        assert!(!handle.is_delivered());
    }

    #[tokio::test]
    async fn cancel_after_delivery_is_noop() {
        let (provider, delivery) =
            provider(ScriptedTransport::payload(b"ok"), RecordingLogger::default());
        let (outcomes, on_complete) = recorder::<String>();
        let handle = provider.request(Endpoint::text("health", HttpMethod::Get), on_complete);
        settle(provider, delivery).await;

        handle.cancel();
        handle.cancel();
        assert!(!handle.is_cancelled());
        assert!(handle.is_delivered());
        assert_eq!(outcomes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn panicking_logger_does_not_prevent_delivery() {
        let (dispatcher, delivery) = delivery_queue();
        let provider = DataProvider::builder(ScriptedTransport::payload(b"{"))
            .error_logger(PanickingLogger)
            .build(dispatcher)
            .unwrap();
        let (outcomes, on_complete) = recorder::<Point>();
        provider.request(Endpoint::json("points/1", HttpMethod::Get), on_complete);
        settle(provider, delivery).await;

        assert!(matches!(outcomes.lock().unwrap()[..], [Err(ProviderError::Parsing(_))]));
    }

    struct PanickingDecoder;

    impl ResponseDecoder<Point> for PanickingDecoder {
        fn decode(&self, _payload: &[u8]) -> Result<Point, DecodeError> {
            panic!("decoder failure");
        }
    }

    struct PanickingTransport;

    #[async_trait]
    impl TransportClient for PanickingTransport {
        async fn perform(
            &self,
            _endpoint: &dyn Requestable,
        ) -> Result<Option<Bytes>, TransportError> {
            panic!("transport failure");
        }
    }

    #[tokio::test]
    async fn panicking_decoder_delivers_parsing_error_once() {
        let logger = RecordingLogger::default();
        let (provider, delivery) = provider(ScriptedTransport::payload(b"x"), logger.clone());
        let (outcomes, on_complete) = recorder::<Point>();
        let endpoint = Endpoint::new("points/1", HttpMethod::Get, PanickingDecoder);
        let handle = provider.request(endpoint, on_complete);
        settle(provider, delivery).await;

        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        let Err(ProviderError::Parsing(DecodeError::Panicked(message))) = &outcomes[0] else {
            panic!("expected decoder panic, got {:?}", outcomes[0]);
        };
        assert_eq!(message, "decoder failure");
        assert!(handle.is_delivered());
        assert_eq!(logger.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn panicking_transport_delivers_network_failure_once() {
        let logger = RecordingLogger::default();
        let (dispatcher, delivery) = delivery_queue();
        let provider = DataProvider::builder(PanickingTransport)
            .error_logger(logger.clone())
            .build(dispatcher)
            .unwrap();
        let (outcomes, on_complete) = recorder::<Point>();
        let handle = provider.request(Endpoint::json("points/1", HttpMethod::Get), on_complete);
        settle(provider, delivery).await;

        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            Err(ProviderError::NetworkFailure(TransportError::Other(message))) => {
                assert_eq!(message, "transport panicked: transport failure")
            }
            other => panic!("expected transport panic, got {other:?}"),
        }
        assert!(handle.is_delivered());
        assert_eq!(logger.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn panicking_resolver_leaves_failure_unresolved() {
        let (dispatcher, delivery) = delivery_queue();
        let provider =
            DataProvider::builder(ScriptedTransport::answering(Err(TransportError::Timeout)))
                .error_logger(NoopErrorLogger)
                .error_resolver(|_: &TransportError| -> Resolution { panic!("resolver failure") })
                .build(dispatcher)
                .unwrap();
        let (outcomes, on_complete) = recorder::<Point>();
        let handle = provider.request(Endpoint::json("points/1", HttpMethod::Get), on_complete);
        settle(provider, delivery).await;

        assert!(matches!(
            outcomes.lock().unwrap()[..],
            [Err(ProviderError::NetworkFailure(TransportError::Timeout))]
        ));
        assert!(handle.is_delivered());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_requests_each_deliver_once() {
        let (dispatcher, delivery) = delivery_queue();
        let provider = DataProvider::builder(EchoTransport).build(dispatcher).unwrap();
        let outcomes: Outcomes<String> = Arc::new(Mutex::new(Vec::new()));
        for i in 0..32 {
            let sink = Arc::clone(&outcomes);
            provider.request(Endpoint::text(format!("item/{i}"), HttpMethod::Get), move |result| {
                sink.lock().unwrap().push(result)
            });
        }
        settle(provider, delivery).await;

        let mut paths: Vec<String> = outcomes
            .lock()
            .unwrap()
            .drain(..)
            .map(|result| result.unwrap())
            .collect();
        paths.sort();
        let mut expected: Vec<String> = (0..32).map(|i| format!("item/{i}")).collect();
        expected.sort();
        assert_eq!(paths, expected);
    }

    /// Answers with the endpoint's own path.
    struct EchoTransport;

    #[async_trait]
    impl TransportClient for EchoTransport {
        async fn perform(
            &self,
            endpoint: &dyn Requestable,
        ) -> Result<Option<Bytes>, TransportError> {
            Ok(Some(Bytes::copy_from_slice(endpoint.path().as_bytes())))
        }
    }

    #[test]
    fn build_without_runtime_fails() {
        let (dispatcher, _delivery) = delivery_queue();
        let err = DataProvider::new(EchoTransport, dispatcher).unwrap_err();
        assert!(matches!(err, BuildError::NoRuntime(_)));
    }

    #[test]
    fn build_with_explicit_runtime_outside_it() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let (dispatcher, delivery) = delivery_queue();
        let provider = DataProvider::builder(EchoTransport)
            .runtime(runtime.handle().clone())
            .build(dispatcher)
            .unwrap();
        let (outcomes, on_complete) = recorder::<String>();
        provider.request(Endpoint::text("ping", HttpMethod::Get), on_complete);
        runtime.block_on(settle(provider, delivery));
        assert_eq!(outcomes.lock().unwrap()[0].as_deref().unwrap(), "ping");
    }
}
