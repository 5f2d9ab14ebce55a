//! In-memory response capture.
//!
//! [`ResponseRecorder`] stands in for the live sink while a handler runs and
//! turns into an immutable [`RecordedResponse`] once it returns. A recording
//! can be replayed onto any [`ResponseWriter`] any number of times.

use bytes::{Bytes, BytesMut};

use super::{Headers, ResponseWriter, StatusCode};

/// A complete, immutable snapshot of one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedResponse {
    pub headers: Headers,
    pub status: StatusCode,
    pub body: Bytes,
}

impl RecordedResponse {
    /// Writes this response onto `w`.
    ///
    /// Every recorded header name replaces the same-named headers already on
    /// the sink; the status is set and the body written in one piece. The
    /// result is indistinguishable from the handler having written to `w`
    /// directly.
    pub fn replay(&self, w: &mut dyn ResponseWriter) {
        w.headers_mut().replace_from(&self.headers);
        w.write_status(self.status);
        if !self.body.is_empty() {
            w.write(&self.body);
        }
    }
}

impl Default for RecordedResponse {
    fn default() -> Self {
        Self {
            headers: Headers::new(),
            status: StatusCode::Ok,
            body: Bytes::new(),
        }
    }
}

/// A [`ResponseWriter`] that keeps everything in memory.
///
/// The status defaults to `200 OK`, the same default as a fresh
/// [`Response`](super::Response), so a handler that never sets a status
/// behaves identically against either sink.
///
/// # Examples
///
/// ```
/// use rttp_cache::http::{ResponseRecorder, ResponseWriter, StatusCode};
///
/// let mut recorder = ResponseRecorder::new();
/// recorder.append_header("Set-Cookie", "a=1");
/// recorder.append_header("Set-Cookie", "b=2");
/// recorder.write(b"chunk-1,");
/// recorder.write(b"chunk-2");
///
/// let recorded = recorder.finish();
/// assert_eq!(recorded.status, StatusCode::Ok);
/// assert_eq!(&recorded.body[..], b"chunk-1,chunk-2");
/// assert_eq!(recorded.headers.get_all("set-cookie").count(), 2);
/// ```
#[derive(Debug)]
pub struct ResponseRecorder {
    headers: Headers,
    status: StatusCode,
    body: BytesMut,
}

impl ResponseRecorder {
    pub fn new() -> Self {
        Self {
            headers: Headers::new(),
            status: StatusCode::Ok,
            body: BytesMut::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consumes the recorder, freezing what the handler wrote.
    pub fn finish(self) -> RecordedResponse {
        RecordedResponse {
            headers: self.headers,
            status: self.status,
            body: self.body.freeze(),
        }
    }
}

impl Default for ResponseRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseWriter for ResponseRecorder {
    fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    fn write_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn write(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
    }
}
