// Response writing with commit tracking

use crate::logging::{debug, trace};
use bytes::{Bytes, BytesMut};
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;

/// Destination of a response. The transport implements this; the runtime only
/// ever calls `write_head` once per response, before any body bytes.
pub trait ResponseSink: Send {
    fn write_head(&mut self, status: StatusCode, headers: &HeaderMap) -> io::Result<()>;

    fn write_body(&mut self, chunk: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Called once when the request is over. Encoders emit their trailer here.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Stand-in while a sink is being wrapped.
struct Detached;

impl ResponseSink for Detached {
    fn write_head(&mut self, _status: StatusCode, _headers: &HeaderMap) -> io::Result<()> {
        Ok(())
    }

    fn write_body(&mut self, _chunk: &[u8]) -> io::Result<()> {
        Ok(())
    }
}

struct WriterState {
    sink: Box<dyn ResponseSink>,
    headers: HeaderMap,
    status: Option<StatusCode>,
    committed: bool,
    size: usize,
}

impl WriterState {
    fn commit(&mut self, status: StatusCode) -> io::Result<()> {
        self.status = Some(status);
        self.committed = true;
        trace!(status = status.as_u16(), "Committing response head");
        self.sink.write_head(status, &self.headers)
    }
}

/// Handle on the response of one request.
///
/// Clones share state. The first `write_header` (or the implicit `200 OK` of
/// the first `write`) commits the status line and headers; later status
/// changes are dropped.
#[derive(Clone)]
pub struct ResponseWriter {
    state: Arc<Mutex<WriterState>>,
}

impl ResponseWriter {
    pub fn new(sink: impl ResponseSink + 'static) -> Self {
        Self {
            state: Arc::new(Mutex::new(WriterState {
                sink: Box::new(sink),
                headers: HeaderMap::new(),
                status: None,
                committed: false,
                size: 0,
            })),
        }
    }

    /// Commit `status` and the pending headers. No-op once committed.
    pub fn write_header(&self, status: StatusCode) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.committed {
            debug!(
                requested = status.as_u16(),
                committed = state.status.map(|s| s.as_u16()),
                "Response already committed; status change ignored"
            );
            return Ok(());
        }
        state.commit(status)
    }

    /// Write body bytes, committing `200 OK` first if nothing was committed yet.
    pub fn write(&self, chunk: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if !state.committed {
            state.commit(StatusCode::OK)?;
        }
        state.sink.write_body(chunk)?;
        state.size += chunk.len();
        Ok(chunk.len())
    }

    /// Committed status, `200 OK` when nothing has been committed.
    pub fn status(&self) -> StatusCode {
        self.state.lock().status.unwrap_or(StatusCode::OK)
    }

    /// Whether a status line has been committed.
    pub fn written(&self) -> bool {
        self.state.lock().committed
    }

    /// Body bytes written so far.
    pub fn size(&self) -> usize {
        self.state.lock().size
    }

    /// Set a header, replacing earlier values. Returns `false` once committed.
    pub fn set_header(&self, name: HeaderName, value: HeaderValue) -> bool {
        let mut state = self.state.lock();
        if state.committed {
            debug!(header = %name, "Response already committed; header ignored");
            return false;
        }
        state.headers.insert(name, value);
        true
    }

    /// Add a header value. Returns `false` once committed.
    pub fn append_header(&self, name: HeaderName, value: HeaderValue) -> bool {
        let mut state = self.state.lock();
        if state.committed {
            debug!(header = %name, "Response already committed; header ignored");
            return false;
        }
        state.headers.append(name, value);
        true
    }

    pub fn header(&self, name: &HeaderName) -> Option<HeaderValue> {
        self.state.lock().headers.get(name).cloned()
    }

    pub fn flush(&self) -> io::Result<()> {
        self.state.lock().sink.flush()
    }

    /// Put a layer (an encoder, say) between this writer and its sink.
    /// Refused with `false` once the head is committed.
    pub fn wrap_sink<F>(&self, wrap: F) -> bool
    where
        F: FnOnce(Box<dyn ResponseSink>) -> Box<dyn ResponseSink>,
    {
        let mut state = self.state.lock();
        if state.committed {
            debug!("Response already committed; sink left unwrapped");
            return false;
        }
        let sink = std::mem::replace(&mut state.sink, Box::new(Detached));
        state.sink = wrap(sink);
        true
    }

    /// End the response: commit `200 OK` with the pending headers if nothing
    /// was committed, then let the sink finish.
    pub fn finish(&self) -> io::Result<()> {
        let mut state = self.state.lock();
        if !state.committed {
            state.commit(StatusCode::OK)?;
        }
        state.sink.finish()
    }
}

impl io::Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        ResponseWriter::write(self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        ResponseWriter::flush(self)
    }
}

impl std::fmt::Debug for ResponseWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ResponseWriter")
            .field("status", &state.status)
            .field("committed", &state.committed)
            .field("size", &state.size)
            .finish()
    }
}

#[derive(Default)]
struct Recorded {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

/// In-memory sink. Clones share the recording, so one clone can be handed
/// to a [`ResponseWriter`] and the other inspected afterwards.
#[derive(Clone, Default)]
pub struct Recorder {
    inner: Arc<Mutex<Recorded>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded status, `200 OK` if the head was never written.
    pub fn status(&self) -> StatusCode {
        self.inner.lock().status.unwrap_or(StatusCode::OK)
    }

    /// Whether the head was written at all.
    pub fn committed(&self) -> bool {
        self.inner.lock().status.is_some()
    }

    pub fn headers(&self) -> HeaderMap {
        self.inner.lock().headers.clone()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.inner
            .lock()
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    pub fn body(&self) -> Bytes {
        self.inner.lock().body.clone().freeze()
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock().body).into_owned()
    }

    /// Turn the recording into an `http::Response`.
    pub fn into_response(self) -> Result<http::Response<Bytes>, http::Error> {
        let mut recorded = self.inner.lock();
        let status = recorded.status.unwrap_or(StatusCode::OK);
        let mut builder = http::Response::builder().status(status);
        for (name, value) in recorded.headers.iter() {
            builder = builder.header(name, value);
        }
        builder.body(std::mem::take(&mut recorded.body).freeze())
    }
}

impl ResponseSink for Recorder {
    fn write_head(&mut self, status: StatusCode, headers: &HeaderMap) -> io::Result<()> {
        let mut recorded = self.inner.lock();
        recorded.status = Some(status);
        recorded.headers = headers.clone();
        Ok(())
    }

    fn write_body(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.inner.lock().body.extend_from_slice(chunk);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CONTENT_TYPE;
    use std::io::Write;

    #[test]
    fn test_defaults_before_anything_is_written() {
        let recorder = Recorder::new();
        let writer = ResponseWriter::new(recorder.clone());

        assert!(!writer.written());
        assert_eq!(writer.status(), StatusCode::OK);
        assert_eq!(writer.size(), 0);
        assert!(!recorder.committed());
    }

    #[test]
    fn test_first_status_wins() {
        let recorder = Recorder::new();
        let writer = ResponseWriter::new(recorder.clone());

        writer.write_header(StatusCode::BAD_REQUEST).unwrap();
        writer.write_header(StatusCode::INTERNAL_SERVER_ERROR).unwrap();

        assert!(writer.written());
        assert_eq!(writer.status(), StatusCode::BAD_REQUEST);
        assert_eq!(recorder.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_write_commits_ok_implicitly() {
        let recorder = Recorder::new();
        let writer = ResponseWriter::new(recorder.clone());

        writer.write(b"Hello").unwrap();
        writer.write_header(StatusCode::NOT_FOUND).unwrap();

        assert_eq!(writer.status(), StatusCode::OK);
        assert_eq!(writer.size(), 5);
        assert_eq!(recorder.body_string(), "Hello");
    }

    #[test]
    fn test_headers_only_before_commit() {
        let recorder = Recorder::new();
        let writer = ResponseWriter::new(recorder.clone());

        assert!(writer.set_header(CONTENT_TYPE, HeaderValue::from_static("text/plain")));
        writer.write_header(StatusCode::OK).unwrap();
        assert!(!writer.set_header(CONTENT_TYPE, HeaderValue::from_static("text/html")));

        assert_eq!(recorder.header("content-type").as_deref(), Some("text/plain"));
    }

    #[test]
    fn test_clones_share_state() {
        let recorder = Recorder::new();
        let writer = ResponseWriter::new(recorder.clone());
        let mut other = writer.clone();

        write!(other, "{}-{}", "a", 1).unwrap();

        assert!(writer.written());
        assert_eq!(recorder.body_string(), "a-1");
    }

    #[test]
    fn test_recorder_into_response() {
        let recorder = Recorder::new();
        let writer = ResponseWriter::new(recorder.clone());
        writer.append_header(
            HeaderName::from_static("x-trace"),
            HeaderValue::from_static("1"),
        );
        writer.write_header(StatusCode::CREATED).unwrap();
        writer.write(b"made").unwrap();

        let response = recorder.into_response().unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-trace"], "1");
        assert_eq!(response.body().as_ref(), b"made");
    }

    #[test]
    fn test_finish_sends_pending_headers() {
        let recorder = Recorder::new();
        let writer = ResponseWriter::new(recorder.clone());

        writer.set_header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        writer.finish().unwrap();

        assert!(recorder.committed());
        assert_eq!(recorder.status(), StatusCode::OK);
        assert_eq!(recorder.header("content-type").as_deref(), Some("application/json"));
        assert!(recorder.body().is_empty());
    }

    struct Upper(Box<dyn ResponseSink>);

    impl ResponseSink for Upper {
        fn write_head(&mut self, status: StatusCode, headers: &HeaderMap) -> io::Result<()> {
            self.0.write_head(status, headers)
        }

        fn write_body(&mut self, chunk: &[u8]) -> io::Result<()> {
            self.0.write_body(&chunk.to_ascii_uppercase())
        }
    }

    #[test]
    fn test_wrap_sink_only_before_commit() {
        let recorder = Recorder::new();
        let writer = ResponseWriter::new(recorder.clone());

        assert!(writer.wrap_sink(|sink| -> Box<dyn ResponseSink> { Box::new(Upper(sink)) }));
        writer.write(b"quiet").unwrap();
        assert!(!writer.wrap_sink(|sink| sink));

        assert_eq!(recorder.body_string(), "QUIET");
    }
}
