use std::{
    sync::Arc,
    task::{Context as TaskContext, Poll},
    time::Duration,
};

use axum::{
    extract::MatchedPath,
    http::{HeaderValue, Request, Response, header::HeaderName},
};
use tower::{Layer, Service};
use tower_http::trace::{MakeSpan, OnResponse};
use tracing::{Level, Span, event, field};
use uuid::Uuid;

static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Escalates the log level for 4xx/5xx responses.
pub fn response_logger() -> ResponseLogger {
    ResponseLogger
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ResponseLogger;

impl<B> OnResponse<B> for ResponseLogger {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        let status = response.status();
        let latency_ms = latency.as_millis() as u64;

        span.record("status", field::display(status.as_u16()));

        if status.is_server_error() {
            event!(parent: span, Level::ERROR, status = status.as_u16(), latency_ms, "request completed");
        } else if status.is_client_error() {
            event!(parent: span, Level::WARN, status = status.as_u16(), latency_ms, "request completed");
        } else {
            event!(parent: span, Level::INFO, status = status.as_u16(), latency_ms, "request completed");
        }
    }
}

#[derive(Clone, Debug)]
pub struct RequestContext {
    request_id: Arc<str>,
}

impl RequestContext {
    fn new(request_id: String) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

pub fn request_context_layer() -> RequestContextLayer {
    RequestContextLayer
}

/// Tags every request with an `x-request-id`, reusing the caller's when sent.
#[derive(Clone, Default)]
pub struct RequestContextLayer;

#[derive(Clone)]
pub struct RequestContextMiddleware<S> {
    inner: S,
}

impl<S> Layer<S> for RequestContextLayer {
    type Service = RequestContextMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestContextMiddleware { inner }
    }
}

impl<S, B> Service<Request<B>> for RequestContextMiddleware<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<B>) -> Self::Future {
        let existing = request
            .headers()
            .get(&REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(str::to_owned);

        let request_id = match existing {
            Some(value) => value,
            None => {
                let generated = Uuid::new_v4().to_string();
                if let Ok(header_value) = HeaderValue::from_str(&generated) {
                    request
                        .headers_mut()
                        .insert(REQUEST_ID_HEADER.clone(), header_value);
                }
                generated
            }
        };

        request
            .extensions_mut()
            .insert(RequestContext::new(request_id));

        self.inner.call(request)
    }
}

pub fn http_make_span() -> HttpMakeSpan {
    HttpMakeSpan
}

#[derive(Clone, Default)]
pub struct HttpMakeSpan;

impl<B> MakeSpan<B> for HttpMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let request_id = request
            .extensions()
            .get::<RequestContext>()
            .map(|ctx| ctx.request_id().to_owned())
            .unwrap_or_else(|| "unknown".to_owned());
        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map(|matched| matched.as_str().to_owned())
            .unwrap_or_else(|| request.uri().path().to_owned());

        tracing::info_span!(
            "http_request",
            method = %request.method(),
            route = %route,
            request_id = %request_id,
            status = field::Empty,
            user_id = field::Empty,
        )
    }
}

/// Records the authenticated caller on the current request span.
pub fn record_authenticated_identity(user_id: &str) {
    let span = Span::current();
    if !span.is_disabled() {
        span.record("user_id", field::display(user_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use tower::{ServiceExt, service_fn};

    #[tokio::test]
    async fn missing_request_id_is_generated_and_existing_one_kept() {
        let service = request_context_layer().layer(service_fn(|request: Request<()>| async move {
            let context = request
                .extensions()
                .get::<RequestContext>()
                .cloned()
                .expect("context inserted");
            let header = request
                .headers()
                .get(&REQUEST_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            Ok::<_, Infallible>((context.request_id().to_owned(), header))
        }));

        let (generated, header) = service
            .clone()
            .oneshot(Request::new(()))
            .await
            .unwrap();
        assert!(Uuid::parse_str(&generated).is_ok());
        assert_eq!(header.as_deref(), Some(generated.as_str()));

        let request = Request::builder()
            .header("x-request-id", "req-42")
            .body(())
            .unwrap();
        let (kept, _) = service.oneshot(request).await.unwrap();
        assert_eq!(kept, "req-42");
    }
}
