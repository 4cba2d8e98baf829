//! `x-correlation-id` header handling.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use super::{CorrelationContext, CorrelationId};

/// Header carrying the correlation id across process boundaries.
pub const X_CORRELATION_ID: &str = "x-correlation-id";

/// Read the correlation id from `headers`, generating one if it is absent,
/// empty or not valid UTF-8.
pub fn extract_from_headers(headers: &HeaderMap) -> CorrelationId {
    headers
        .get(X_CORRELATION_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(CorrelationId::from)
        .unwrap_or_else(CorrelationId::generate)
}

/// Attach `id` to `headers`, replacing any previous value.
pub fn add_to_headers(headers: &mut HeaderMap, id: &CorrelationId) {
    match HeaderValue::from_str(id.as_str()) {
        Ok(value) => {
            headers.insert(X_CORRELATION_ID, value);
        }
        Err(e) => {
            tracing::warn!(correlation_id = %id, error = %e, "Correlation id is not a valid header value");
        }
    }
}

/// Axum middleware scoping each request to its own correlation context.
///
/// The context is placed in request extensions as `Arc<CorrelationContext>`
/// and the id is echoed on the response.
pub async fn correlation_middleware(mut request: Request<Body>, next: Next) -> Response {
    let id = extract_from_headers(request.headers());
    request
        .extensions_mut()
        .insert(Arc::new(CorrelationContext::with_id(id.clone())));

    let mut response = next.run(request).await;
    add_to_headers(response.headers_mut(), &id);
    response
}
