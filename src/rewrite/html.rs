//! Streaming HTML link rewriting.
//!
//! # Responsibilities
//! - Detect HTML responses by media type
//! - Visit `href` on `<a>`/`<link>`, `action` on `<form>` and `src` on
//!   `<img>`/`<script>`, in document order
//! - Point absolute target URLs and root-relative paths back through the proxy
//!
//! # Design Decisions
//! - `lol_html` tokenizes incrementally; markup outside rewritten attributes
//!   is emitted byte-for-byte
//! - The `Send` rewriter is driven inside the response body stream, on the
//!   task that polls the body
//! - Non-strict parsing: ambiguous markup is guessed at instead of aborting
//! - A rewriter error sends the failing chunk and the rest of the body
//!   through verbatim

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use axum::body::Bytes;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use futures_util::{Stream, StreamExt};
use lol_html::send::{Element, HtmlRewriter, Settings};
use lol_html::{element, HandlerResult, OutputSink};

use crate::observability::metrics;
use crate::rewrite::RewriteContext;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// True when `Content-Type` names the `text/html` media type.
pub fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|media_type| media_type.trim().eq_ignore_ascii_case("text/html"))
}

/// Rewrite one attribute value. `None` leaves it untouched.
///
/// Absolute URLs on the target origin move under the proxy origin and route
/// prefix; root-relative paths gain the route prefix. Relative,
/// protocol-relative, `mailto:`, `javascript:` and fragment values are left
/// alone.
pub fn rewrite_attribute_value(value: &str, ctx: &RewriteContext) -> Option<String> {
    if let Some(rewritten) = ctx.replace_target_origin(value) {
        return Some(rewritten);
    }
    let prefix = ctx.route_prefix()?;
    (value.starts_with('/') && !value.starts_with("//")).then(|| format!("/{prefix}{value}"))
}

fn rewrite_attribute(el: &mut Element<'_, '_>, name: &str, ctx: &RewriteContext) -> HandlerResult {
    if let Some(value) = el.get_attribute(name) {
        if let Some(rewritten) = rewrite_attribute_value(&value, ctx) {
            el.set_attribute(name, &rewritten)?;
        }
    }
    Ok(())
}

/// Rewriter settings for one response.
fn rewrite_settings(ctx: &Arc<RewriteContext>) -> Settings<'static, 'static> {
    let (a, link, form, img, script) = (
        Arc::clone(ctx),
        Arc::clone(ctx),
        Arc::clone(ctx),
        Arc::clone(ctx),
        Arc::clone(ctx),
    );
    Settings {
        element_content_handlers: vec![
            element!("a[href]", move |el| rewrite_attribute(el, "href", &a)),
            element!("link[href]", move |el| rewrite_attribute(el, "href", &link)),
            element!("form[action]", move |el| rewrite_attribute(el, "action", &form)),
            element!("img[src]", move |el| rewrite_attribute(el, "src", &img)),
            element!("script[src]", move |el| rewrite_attribute(el, "src", &script)),
        ],
        strict: false,
        ..Settings::new_send()
    }
}

/// Shared buffer the rewriter writes into and the body stream drains.
#[derive(Clone, Default)]
struct Output(Arc<Mutex<Vec<u8>>>);

impl Output {
    fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl OutputSink for Output {
    fn handle_chunk(&mut self, chunk: &[u8]) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(chunk);
    }
}

/// Transform an HTML body stream without buffering the whole document.
pub fn rewrite_stream<S, E>(
    upstream: S,
    ctx: Arc<RewriteContext>,
) -> impl Stream<Item = Result<Bytes, io::Error>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    metrics::record_html_rewrite();
    rewrite_with(upstream, rewrite_settings(&ctx))
}

fn rewrite_with<S, E>(
    upstream: S,
    settings: Settings<'static, 'static>,
) -> impl Stream<Item = Result<Bytes, io::Error>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    let output = Output::default();
    let driver = Driver {
        upstream: Box::pin(upstream),
        rewriter: Some(HtmlRewriter::new(settings, output.clone())),
        output,
        finished: false,
    };
    futures_util::stream::unfold(driver, |mut driver| async move {
        let item = driver.next_chunk().await?;
        Some((item, driver))
    })
}

/// Feeds upstream chunks through the rewriter, one output chunk per poll.
struct Driver<S> {
    upstream: Pin<Box<S>>,
    /// `None` once rewriting has been abandoned.
    rewriter: Option<HtmlRewriter<'static, Output>>,
    output: Output,
    finished: bool,
}

impl<S, E> Driver<S>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    async fn next_chunk(&mut self) -> Option<Result<Bytes, io::Error>> {
        while !self.finished {
            match self.upstream.next().await {
                Some(Ok(chunk)) => {
                    let out = self.feed(chunk);
                    if !out.is_empty() {
                        return Some(Ok(out));
                    }
                }
                Some(Err(e)) => {
                    self.finished = true;
                    let e: BoxError = e.into();
                    tracing::warn!(error = %e, "Upstream body failed during HTML rewrite");
                    return Some(Err(io::Error::other(e)));
                }
                None => {
                    self.finished = true;
                    let tail = self.end();
                    if !tail.is_empty() {
                        return Some(Ok(tail));
                    }
                }
            }
        }
        None
    }

    /// Rewritten output for `chunk`. On a rewriter error the partial output
    /// is dropped and the chunk itself goes out unchanged.
    fn feed(&mut self, chunk: Bytes) -> Bytes {
        let Some(rewriter) = self.rewriter.as_mut() else {
            return chunk;
        };
        match rewriter.write(&chunk) {
            Ok(()) => Bytes::from(self.output.take()),
            Err(e) => {
                tracing::warn!(error = %e, "HTML rewrite failed, passing remaining body through");
                self.rewriter = None;
                self.output.take();
                chunk
            }
        }
    }

    fn end(&mut self) -> Bytes {
        if let Some(rewriter) = self.rewriter.take() {
            if let Err(e) = rewriter.end() {
                tracing::warn!(error = %e, "HTML rewrite failed at end of document");
            }
        }
        Bytes::from(self.output.take())
    }
}
