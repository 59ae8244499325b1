//! Root span middleware.
//!
//! Opens one server span per request, named after the raw request target,
//! and makes it available to handlers through [`RequestContext`].
//!
//! # Lifecycle
//! ```text
//! NO_SPAN ──request enters──▶ SPAN_OPEN ──response / panic / cancel──▶ SPAN_CLOSED
//! ```
//!
//! # Design Decisions
//! - Span name is the path plus query, so every distinct query string gets
//!   its own span name
//! - The span is ended by a drop guard: a panicking or cancelled inner
//!   service still closes it
//! - 5xx responses mark the span as failed
//! - An inbound W3C `traceparent` header becomes the span's parent

use axum::body::Body;
use axum::extract::State;
use axum::http::{uri::Scheme, HeaderName, Request, StatusCode, Uri, Version};
use axum::middleware::Next;
use axum::response::Response;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_http::HeaderExtractor;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracer;
use opentelemetry_semantic_conventions::trace::{
    HTTP_REQUEST_METHOD, HTTP_RESPONSE_STATUS_CODE, NETWORK_PROTOCOL_VERSION, URL_PATH,
    URL_QUERY, URL_SCHEME,
};

use crate::observability::context::{with_root_span, RequestContext};

/// Header carrying the request identifier.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Root span attribute holding the request identifier.
pub const REQUEST_ID_ATTRIBUTE: &str = "request.id";

/// Security of the connection a request arrived on.
///
/// The server inserts it into request extensions; without it a request is
/// treated as plain HTTP unless its URI is absolute with an `https` scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportSecurity {
    #[default]
    Plain,
    Tls,
}

impl TransportSecurity {
    pub fn scheme(self) -> &'static str {
        match self {
            TransportSecurity::Plain => "http",
            TransportSecurity::Tls => "https",
        }
    }
}

/// State shared by every invocation of [`root_span_middleware`].
#[derive(Clone, Debug)]
pub struct RootSpanState {
    tracer: SdkTracer,
    propagator: TraceContextPropagator,
}

impl RootSpanState {
    pub fn new(tracer: SdkTracer) -> Self {
        Self {
            tracer,
            propagator: TraceContextPropagator::new(),
        }
    }
}

/// Ends the root span when dropped.
struct RootSpanGuard {
    cx: Context,
}

impl RootSpanGuard {
    fn record_response(&self, status: StatusCode) {
        let span = self.cx.span();
        span.set_attribute(KeyValue::new(
            HTTP_RESPONSE_STATUS_CODE,
            i64::from(status.as_u16()),
        ));
        if status.is_server_error() {
            span.set_status(Status::error(
                status.canonical_reason().unwrap_or("server error"),
            ));
        }
    }
}

impl Drop for RootSpanGuard {
    fn drop(&mut self) {
        self.cx.span().end();
    }
}

/// Span name for a request: the raw target, path plus query.
pub fn span_name(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path())
        .to_string()
}

/// `https` when the request arrived over TLS, else `http`.
pub fn request_scheme<B>(req: &Request<B>) -> &'static str {
    if let Some(security) = req.extensions().get::<TransportSecurity>() {
        return security.scheme();
    }
    if req.uri().scheme() == Some(&Scheme::HTTPS) {
        "https"
    } else {
        "http"
    }
}

fn protocol_version(version: Version) -> &'static str {
    if version == Version::HTTP_09 {
        "0.9"
    } else if version == Version::HTTP_10 {
        "1.0"
    } else if version == Version::HTTP_11 {
        "1.1"
    } else if version == Version::HTTP_2 {
        "2"
    } else if version == Version::HTTP_3 {
        "3"
    } else {
        "unknown"
    }
}

fn request_attributes<B>(req: &Request<B>) -> Vec<KeyValue> {
    let uri = req.uri();
    let mut attributes = vec![
        KeyValue::new(URL_PATH, uri.path().to_string()),
        KeyValue::new(URL_SCHEME, request_scheme(req)),
        KeyValue::new(HTTP_REQUEST_METHOD, req.method().as_str().to_string()),
        KeyValue::new(NETWORK_PROTOCOL_VERSION, protocol_version(req.version())),
    ];
    if let Some(query) = uri.query() {
        attributes.push(KeyValue::new(URL_QUERY, query.to_string()));
    }
    if let Some(id) = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
    {
        attributes.push(KeyValue::new(REQUEST_ID_ATTRIBUTE, id.to_string()));
    }
    attributes
}

/// Wraps a request in a root span.
///
/// Mount with `axum::middleware::from_fn_with_state(RootSpanState::new(tracer), root_span_middleware)`.
pub async fn root_span_middleware(
    State(state): State<RootSpanState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    // Layered twice: the outer instance owns the root span.
    if req
        .extensions()
        .get::<RequestContext>()
        .is_some_and(|cx| cx.root_span().is_some())
    {
        return next.run(req).await;
    }

    let parent = state
        .propagator
        .extract(&HeaderExtractor(req.headers()));

    let span = state
        .tracer
        .span_builder(span_name(req.uri()))
        .with_kind(SpanKind::Server)
        .with_attributes(request_attributes(&req))
        .start_with_context(&state.tracer, &parent);

    let cx = with_root_span(&parent, span);
    let guard = RootSpanGuard { cx: cx.clone() };
    req.extensions_mut().insert(RequestContext::new(cx));

    let response = next.run(req).await;
    guard.record_response(response.status());
    response
}
