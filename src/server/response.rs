//! Response recording and the sink boundary.
//!
//! Handlers never write to the socket directly. Every byte and status code
//! goes through a [`ResponseRecorder`] owned by the pooled request context,
//! and the dispatcher flushes the recorded response to a [`ResponseSink`]
//! exactly once, after the handler chain has finished.

use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use std::io;
use tracing::warn;

/// Destination for a finished response.
///
/// Implemented by the listener adapter (see [`crate::server::HttpServer`]) and
/// by [`CapturedResponse`], which tests use the same way `httptest`-style
/// recorders are used elsewhere.
pub trait ResponseSink {
    /// Write the status line, headers and body in one go.
    fn send(&mut self, status: StatusCode, headers: &HeaderMap, body: &[u8]) -> io::Result<()>;
}

/// Captures status code, headers and body bytes written by a handler.
///
/// The first status written is authoritative for the wire: later calls to
/// [`write_header`](Self::write_header) are recorded in [`status`](Self::status)
/// for logging, but [`wire_status`](Self::wire_status) keeps the first one.
/// Writing body bytes before any status commits an implicit `200 OK`.
#[derive(Debug, Default)]
pub struct ResponseRecorder {
    status: Option<StatusCode>,
    wire_status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
    size: usize,
}

impl ResponseRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a status code.
    pub fn write_header(&mut self, status: StatusCode) {
        match self.wire_status {
            None => self.wire_status = Some(status),
            Some(sent) => {
                warn!(
                    sent = sent.as_u16(),
                    requested = status.as_u16(),
                    "superfluous write_header call; wire status unchanged"
                );
            }
        }
        self.status = Some(status);
    }

    /// Append body bytes, returning the number of bytes accepted.
    pub fn write(&mut self, buf: &[u8]) -> usize {
        if self.wire_status.is_none() {
            self.write_header(StatusCode::OK);
        }
        self.body.extend_from_slice(buf);
        self.size += buf.len();
        buf.len()
    }

    /// Most recently requested status, `None` until something was written.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Status that will go out on the wire (the first one written).
    #[must_use]
    pub fn wire_status(&self) -> Option<StatusCode> {
        self.wire_status
    }

    /// Cumulative number of body bytes written.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether a status has been committed.
    #[must_use]
    pub fn is_written(&self) -> bool {
        self.wire_status.is_some()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Set a header, replacing any existing value with the same name.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Write the recorded response to `sink`.
    ///
    /// A handler that wrote nothing produces an empty `200 OK`.
    pub fn flush_to(&self, sink: &mut dyn ResponseSink) -> io::Result<()> {
        let status = self.wire_status.unwrap_or(StatusCode::OK);
        sink.send(status, &self.headers, &self.body)
    }

    /// Wipe everything, keeping the body buffer's allocation.
    pub(crate) fn reset(&mut self) {
        self.status = None;
        self.wire_status = None;
        self.headers.clear();
        self.body.clear();
        self.size = 0;
    }
}

/// In-memory [`ResponseSink`].
#[derive(Debug, Clone, Default)]
pub struct CapturedResponse {
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// Number of times `send` was called; a correct dispatcher sends once.
    pub sends: usize,
}

impl CapturedResponse {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Status as a number, `0` when nothing was sent.
    #[must_use]
    pub fn code(&self) -> u16 {
        self.status.map_or(0, |s| s.as_u16())
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or("")
    }

    /// Parse the body as JSON, `Value::Null` when it is not JSON.
    #[must_use]
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

impl ResponseSink for CapturedResponse {
    fn send(&mut self, status: StatusCode, headers: &HeaderMap, body: &[u8]) -> io::Result<()> {
        self.status = Some(status);
        self.headers = headers.clone();
        self.body = body.to_vec();
        self.sends += 1;
        Ok(())
    }
}

/// Canonical reason phrase, falling back to an empty string.
#[must_use]
pub fn status_reason(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("")
}
