//! Request-scoped span propagation.
//!
//! The root span of a request travels inside an [`opentelemetry::Context`]
//! stored in the request's extensions. The context is immutable: deriving a
//! child context never alters what the middleware installed, and the root
//! span entry is written once per request.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use opentelemetry::trace::{SpanKind, SpanRef, TraceContextExt, Tracer as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::{SdkTracer, Span};

/// Well-known context entry holding the request's root span.
///
/// It keeps a context in which the root span is the active span, so that
/// [`SpanRef`] lookups reach the root even after child spans have become
/// active in derived contexts.
#[derive(Debug)]
struct RootSpan(Context);

/// Derive a context carrying `span` as both the active span and the root span.
///
/// When `parent` already has a root span it is kept and `span` only becomes
/// the active span.
pub fn with_root_span(parent: &Context, span: Span) -> Context {
    let active = parent.with_span(span);
    if has_root_span(parent) {
        return active;
    }
    let root = RootSpan(active.clone());
    active.with_value(root)
}

/// The request's root span, if the middleware installed one.
pub fn current_root_span(cx: &Context) -> Option<SpanRef<'_>> {
    cx.get::<RootSpan>().map(|root| root.0.span())
}

/// Whether `cx` carries a root span entry.
pub fn has_root_span(cx: &Context) -> bool {
    cx.get::<RootSpan>().is_some()
}

/// Propagation context of the request being handled.
///
/// Used as an axum extractor it never rejects: a request that did not pass
/// through the root span middleware yields an empty context, in which
/// [`RequestContext::root_span`] is `None` and enrichment is a no-op.
#[derive(Debug, Clone, Default)]
pub struct RequestContext(Context);

impl RequestContext {
    pub fn new(cx: Context) -> Self {
        Self(cx)
    }

    pub fn context(&self) -> &Context {
        &self.0
    }

    pub fn root_span(&self) -> Option<SpanRef<'_>> {
        current_root_span(&self.0)
    }

    /// Add attributes to the root span. Does nothing without one.
    pub fn enrich_root(&self, attributes: impl IntoIterator<Item = KeyValue>) {
        if let Some(root) = self.root_span() {
            root.set_attributes(attributes);
        }
    }

    /// Start a span parented to the active span of this request.
    pub fn child_span(&self, tracer: &SdkTracer, name: &'static str) -> Span {
        tracer
            .span_builder(name)
            .with_kind(SpanKind::Internal)
            .start_with_context(tracer, &self.0)
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default())
    }
}
