// Built-in middleware

use crate::Error;
use crate::context::Context;
use crate::extractors::Inject;
use crate::handler::{BoxedHandler, handler};
use crate::logging::{Logger, error};
use crate::request::{Request, remote_addr};
use crate::response::{ResponseSink, ResponseWriter};
use flate2::Compression;
use flate2::write::GzEncoder;
use http::header::{
    ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, HeaderValue, VARY,
};
use http::{HeaderMap, StatusCode};
use std::io::{self, Write};
use std::time::Instant;

/// Write `status` with its canonical reason as a plain-text body, unless the
/// response is already committed.
pub(crate) fn write_status_page(
    response: &ResponseWriter,
    status: StatusCode,
) -> Result<(), Error> {
    if response.written() {
        return Ok(());
    }
    response.set_header(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response.write_header(status)?;
    response.write(status.canonical_reason().unwrap_or("").as_bytes())?;
    Ok(())
}

/// Turns a panic anywhere downstream into a logged, generic 500.
///
/// Only `HandlerPanic` is recovered; every other error keeps propagating.
/// The response body never carries the panic message.
pub fn recovery() -> BoxedHandler {
    handler(
        |ctx: &mut Context<'_>, logger: Option<Inject<Logger>>| -> Result<(), Error> {
            match ctx.next() {
                Err(Error::HandlerPanic { handler, message }) => {
                    let line = format!("PANIC: {} (in {})", message, handler);
                    match logger {
                        Some(logger) => logger.error(&line),
                        None => error!(handler, "{}", line),
                    }
                    write_status_page(ctx.response(), StatusCode::INTERNAL_SERVER_ERROR)
                }
                other => other,
            }
        },
    )
    .with_name("recovery")
}

/// Logs `Started METHOD URI for CLIENT` on the way in and
/// `Completed URI STATUS REASON in ELAPSED` once the chain has unwound.
pub fn request_logger() -> BoxedHandler {
    handler(
        |ctx: &mut Context<'_>, logger: Inject<Logger>| -> Result<(), Error> {
            let start = Instant::now();
            let method = ctx.request().method().clone();
            let uri = ctx.request().uri().to_string();

            match remote_addr(ctx.request()) {
                Some(client) => logger.info(format!("Started {} {} for {}", method, uri, client)),
                None => logger.info(format!("Started {} {}", method, uri)),
            }

            let result = ctx.next();

            let status = match &result {
                Err(err) if !ctx.written() => err.status_code(),
                _ => ctx.response().status(),
            };
            logger.info(format!(
                "Completed {} {} {} in {:?}",
                uri,
                status.as_u16(),
                status.canonical_reason().unwrap_or(""),
                start.elapsed()
            ));

            result
        },
    )
    .with_name("request_logger")
}

/// Gzip-encodes the response body for clients whose `Accept-Encoding`
/// allows it, or for every client when `force` is set.
///
/// Error statuses and bodiless statuses pass through untouched, as do
/// responses that already carry a `Content-Encoding`.
pub fn gzip(force: bool) -> BoxedHandler {
    handler(move |ctx: &mut Context<'_>| -> Result<(), Error> {
        if force || accepts_gzip(ctx.request()) {
            ctx.response().wrap_sink(GzipSink::boxed);
        }
        ctx.next()
    })
    .with_name("gzip")
}

fn accepts_gzip(request: &Request) -> bool {
    request
        .headers()
        .get_all(ACCEPT_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|entry| {
            let mut parts = entry.split(';').map(str::trim);
            let coding = parts.next().unwrap_or("");
            let refused = parts.any(|param| {
                param
                    .strip_prefix("q=")
                    .and_then(|q| q.parse::<f32>().ok())
                    .is_some_and(|q| q == 0.0)
            });
            !refused && (coding.eq_ignore_ascii_case("gzip") || coding == "*")
        })
}

/// Streams the body through a gzip encoder. Whether to encode is decided
/// when the head goes out; the trailer is written by `finish`.
struct GzipSink {
    inner: Box<dyn ResponseSink>,
    encoder: Option<GzEncoder<Vec<u8>>>,
}

impl GzipSink {
    fn boxed(inner: Box<dyn ResponseSink>) -> Box<dyn ResponseSink> {
        Box::new(Self {
            inner,
            encoder: None,
        })
    }

    fn encodes(status: StatusCode, headers: &HeaderMap) -> bool {
        let bodiless = status.is_informational()
            || status == StatusCode::NO_CONTENT
            || status == StatusCode::NOT_MODIFIED;
        let encoded = headers
            .get(CONTENT_ENCODING)
            .is_some_and(|v| v.as_bytes() != b"identity");
        !bodiless && status.as_u16() < 400 && !encoded
    }

    fn drain(&mut self) -> io::Result<()> {
        if let Some(encoder) = self.encoder.as_mut() {
            let compressed = std::mem::take(encoder.get_mut());
            if !compressed.is_empty() {
                self.inner.write_body(&compressed)?;
            }
        }
        Ok(())
    }
}

impl ResponseSink for GzipSink {
    fn write_head(&mut self, status: StatusCode, headers: &HeaderMap) -> io::Result<()> {
        if !Self::encodes(status, headers) {
            return self.inner.write_head(status, headers);
        }

        let mut headers = headers.clone();
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        headers.remove(CONTENT_LENGTH);
        let varies = headers
            .get_all(VARY)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.to_ascii_lowercase().contains("accept-encoding"));
        if !varies {
            headers.append(VARY, HeaderValue::from_static("Accept-Encoding"));
        }

        self.encoder = Some(GzEncoder::new(Vec::new(), Compression::default()));
        self.inner.write_head(status, &headers)
    }

    fn write_body(&mut self, chunk: &[u8]) -> io::Result<()> {
        match self.encoder.as_mut() {
            Some(encoder) => {
                encoder.write_all(chunk)?;
                self.drain()
            }
            None => self.inner.write_body(chunk),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(encoder) = self.encoder.as_mut() {
            encoder.flush()?;
            self.drain()?;
        }
        self.inner.flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        if let Some(encoder) = self.encoder.take() {
            let tail = encoder.finish()?;
            if !tail.is_empty() {
                self.inner.write_body(&tail)?;
            }
        }
        self.inner.finish()
    }
}
