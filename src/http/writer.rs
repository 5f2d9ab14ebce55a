//! The response sink surface handlers write into.

use super::{Headers, StatusCode};

/// A mutable response sink.
///
/// Handlers never build a response value themselves; they are handed a
/// `ResponseWriter` and mutate it. The server passes a live [`Response`]
/// while the caching middleware passes a [`ResponseRecorder`], and the
/// handler cannot tell the two apart.
///
/// Header mutations accumulate, the status code is last-write-wins and body
/// writes are appended in call order.
///
/// [`Response`]: super::Response
/// [`ResponseRecorder`]: super::ResponseRecorder
///
/// # Examples
///
/// ```
/// use rttp_cache::http::{Response, ResponseWriter, StatusCode};
///
/// fn greet(w: &mut dyn ResponseWriter) {
///     w.set_header("Content-Type", "text/plain");
///     w.write_status(StatusCode::Created);
///     w.write(b"hello ");
///     w.write(b"world");
/// }
///
/// let mut response = Response::default();
/// greet(&mut response);
/// assert_eq!(response.status(), StatusCode::Created);
/// assert_eq!(response.content(), b"hello world");
/// ```
pub trait ResponseWriter: Send {
    /// Direct access to the pending header map.
    fn headers_mut(&mut self) -> &mut Headers;

    /// Sets the status code. Later calls override earlier ones.
    fn write_status(&mut self, status: StatusCode);

    /// Appends `data` to the body.
    fn write(&mut self, data: &[u8]);

    /// Replaces all values of `name` with `value`.
    fn set_header(&mut self, name: &str, value: &str) {
        self.headers_mut().set(name, value);
    }

    /// Adds another value for `name`, keeping existing ones.
    fn append_header(&mut self, name: &str, value: &str) {
        self.headers_mut().insert(name, value);
    }
}
