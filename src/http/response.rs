//! Response handling and transformation.
//!
//! # Responsibilities
//! - Turn the upstream response into the client response
//! - Strip hop-by-hop headers, rewrite `Set-Cookie` and `Location`
//! - Route HTML bodies through the streaming rewriter
//!
//! # Design Decisions
//! - Status code from the origin is passed through unchanged
//! - Non-HTML bodies are streamed untouched
//! - `Content-Length` is dropped whenever the body is rewritten

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::CONTENT_LENGTH;
use axum::response::Response;

use crate::rewrite::headers::rewrite_response_headers;
use crate::rewrite::html::{is_html, rewrite_stream};
use crate::rewrite::RewriteContext;
use crate::security::headers::strip_hop_by_hop;

/// Build the client response from the origin's response.
pub fn into_client_response(upstream: reqwest::Response, ctx: Arc<RewriteContext>) -> Response {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_hop_by_hop(&mut headers);
    rewrite_response_headers(&mut headers, &ctx);

    let body = if is_html(&headers) {
        headers.remove(CONTENT_LENGTH);
        Body::from_stream(rewrite_stream(upstream.bytes_stream(), ctx))
    } else {
        Body::from_stream(upstream.bytes_stream())
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
