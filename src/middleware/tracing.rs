//! Correlation ID propagation and request tracing spans.

use axum::{
    extract::{MatchedPath, Request},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use uuid::Uuid;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Middleware that tags every request with a correlation ID (propagated if the
/// caller already sent one), wraps it in a tracing span, and logs a structured
/// summary line keyed on status. Latency histograms are recorded separately by
/// `latency_middleware`.
pub async fn tracing_middleware(
    matched_path: Option<MatchedPath>,
    mut request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let correlation_id = extract_or_generate_correlation_id(request.headers());
    request.extensions_mut().insert(correlation_id.clone());

    let method = request.method().to_string();
    let path = matched_path
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let span = tracing::info_span!(
        "http_request",
        correlation_id = %correlation_id,
        method = %method,
        path = %path,
    );
    let _enter = span.enter();

    let mut response = next.run(request).await;

    let duration = start.elapsed();
    let status_code = response.status().as_u16();

    if status_code >= 500 {
        tracing::error!(correlation_id = %correlation_id, status_code, duration_ms = duration.as_millis() as u64, "request failed");
    } else if status_code >= 400 {
        tracing::warn!(correlation_id = %correlation_id, status_code, duration_ms = duration.as_millis() as u64, "request rejected");
    } else {
        tracing::info!(correlation_id = %correlation_id, status_code, duration_ms = duration.as_millis() as u64, "request handled");
    }

    if let Ok(header_value) = HeaderValue::from_str(&correlation_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(CORRELATION_ID_HEADER), header_value);
    }

    response
}

fn extract_or_generate_correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

pub fn get_correlation_id_from_request(request: &Request) -> Option<String> {
    request.extensions().get::<String>().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request as HttpRequest, middleware, routing::get, Router};
    use tower::ServiceExt;

    async fn handler() -> &'static str {
        "ok"
    }

    #[tokio::test]
    async fn tracing_middleware_propagates_existing_correlation_id() {
        let app = Router::new()
            .route("/test", get(handler))
            .layer(middleware::from_fn(tracing_middleware));

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/test")
                    .header(CORRELATION_ID_HEADER, "fixed-id")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get(CORRELATION_ID_HEADER).unwrap(),
            "fixed-id"
        );
    }
}
