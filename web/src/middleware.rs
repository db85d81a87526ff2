//! Correlation id middleware.
//!
//! 1. **Extract** the correlation ID from `X-Correlation-ID` (or generate a UUID)
//! 2. **Store** it in request extensions, where [`CorrelationId`] finds it
//! 3. **Run** the request inside a tracing span carrying the id
//! 4. **Echo** the id in the response header
//!
//! # Example
//!
//! ```ignore
//! use axum::{middleware, Router};
//! use eventhub_web::middleware::correlation_id;
//!
//! let app = Router::new()
//!     .route("/events", get(list_events))
//!     .layer(middleware::from_fn(correlation_id));
//! ```

use crate::extractors::CorrelationId;
use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Instrument;
use uuid::Uuid;

/// Header name for correlation ID.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Tags the request with a correlation id; use with `axum::middleware::from_fn`.
pub async fn correlation_id(mut req: Request, next: Next) -> Response {
    let correlation_id = req
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    req.extensions_mut().insert(CorrelationId(correlation_id));

    let span = tracing::info_span!(
        "http_request",
        correlation_id = %correlation_id,
        method = %req.method(),
        uri = %req.uri(),
    );

    let mut response = next.run(req).instrument(span).await;

    if let Ok(header_value) = HeaderValue::from_str(&correlation_id.to_string()) {
        response
            .headers_mut()
            .insert(CORRELATION_ID_HEADER, header_value);
    }

    response
}
