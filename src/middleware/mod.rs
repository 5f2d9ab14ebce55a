//! Request handlers and the middleware that wraps them.
//!
//! A handler receives the parsed [`Request`] and a [`ResponseWriter`] sink.
//! Middleware is simply a [`Handler`] that owns another handler and decides
//! when, and against which sink, to run it. Because the signature is the
//! same on both sides, wrapped handlers compose freely and can be handed to
//! [`Server::run`](crate::server::Server::run) directly.
//!
//! ## Core types
//!
//! - [`Handler`]: trait implemented by all handlers and middleware.
//! - [`handler_fn`]: adapts an async closure into a [`Handler`].
//! - [`HandlerError`]: why a request could not be served.
//! - [`cache::CachedHandler`]: response-caching middleware, built with
//!   [`cache::cached`].
//! - [`codec`]: the byte format recorded responses are stored in.

use std::{future::Future, pin::Pin, sync::Arc};

use thiserror::Error;

use crate::cache::CacheError;
use crate::http::{Request, ResponseWriter};

pub mod cache;
pub mod codec;

pub use cache::{CachedHandler, FailurePolicy, cache_key, cached};
pub use codec::CodecError;

/// Reasons a handler failed to produce a response.
///
/// A failed request gets no response at all: the server drops the
/// connection rather than sending anything partially written.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The cache backend failed during a read or write.
    #[error("cache provider failed: {0}")]
    Cache(#[from] CacheError),

    /// A response could not be encoded for storage, or a stored one could
    /// not be decoded.
    #[error("cached response codec failed: {0}")]
    Codec(#[from] CodecError),

    /// Any other failure raised by application code.
    #[error("handler failed: {0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Boxed future returned by [`Handler::serve`].
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>>;

/// The core trait for request handlers.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync` because one handler instance
///   serves every connection concurrently.
/// - The handler writes its response into `w`. Whatever it wrote is
///   discarded if it returns an error.
pub trait Handler: Send + Sync + 'static {
    /// Serve one request.
    fn serve<'a>(&'a self, req: &'a Request, w: &'a mut dyn ResponseWriter) -> HandlerFuture<'a>;
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn serve<'a>(&'a self, req: &'a Request, w: &'a mut dyn ResponseWriter) -> HandlerFuture<'a> {
        (**self).serve(req, w)
    }
}

/// A [`Handler`] backed by a closure. Created by [`handler_fn`].
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

/// Wraps a closure returning a boxed future as a [`Handler`].
///
/// # Examples
///
/// ```rust
/// use rttp_cache::http::{ResponseWriter, StatusCode};
/// use rttp_cache::middleware::handler_fn;
///
/// let hello = handler_fn(|req, w| {
///     Box::pin(async move {
///         w.set_header("Content-Type", "text/plain");
///         w.write_status(StatusCode::Ok);
///         w.write(format!("hello from {}", req.path()).as_bytes());
///         Ok(())
///     })
/// });
/// # let _ = hello;
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: for<'a> Fn(&'a Request, &'a mut dyn ResponseWriter) -> HandlerFuture<'a>
        + Send
        + Sync
        + 'static,
{
    HandlerFn { f }
}

impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(&'a Request, &'a mut dyn ResponseWriter) -> HandlerFuture<'a>
        + Send
        + Sync
        + 'static,
{
    fn serve<'a>(&'a self, req: &'a Request, w: &'a mut dyn ResponseWriter) -> HandlerFuture<'a> {
        (self.f)(req, w)
    }
}
