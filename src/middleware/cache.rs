//! Response-caching middleware.
//!
//! [`CachedHandler`] memoizes complete responses (headers, status, body) per
//! request signature. The first request for a key runs the wrapped handler
//! against a [`ResponseRecorder`], stores the encoded recording, and replays
//! it to the client. Later requests with the same key are answered from the
//! cache without running the handler until the entry is evicted.
//!
//! The key is the method followed by the raw request target, for example
//! `GET/search?q=rust`. No normalization is applied.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{Handler, HandlerError, HandlerFuture, codec};
use crate::cache::{CacheError, CacheProvider};
use crate::http::{Request, ResponseRecorder, ResponseWriter};

/// What to do when the cache backend itself fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Fail the request with [`HandlerError::Cache`]; the client gets no
    /// response.
    #[default]
    Abort,

    /// Log the failure and serve the request live, uncached.
    Bypass,
}

/// Derives the cache key for `req`: method immediately followed by the raw
/// request URI.
///
/// # Examples
///
/// ```
/// use rttp_cache::http::Request;
/// use rttp_cache::middleware::cache_key;
///
/// let raw = b"GET /test?page=2 HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let (req, _) = Request::parse(raw).unwrap();
/// assert_eq!(cache_key(&req), "GET/test?page=2");
/// ```
pub fn cache_key(req: &Request) -> String {
    let method = req.method().as_str();
    let uri = req.request_uri();
    let mut key = String::with_capacity(method.len() + uri.len());
    key.push_str(method);
    key.push_str(uri);
    key
}

/// Wraps `handler` so its responses are cached in `cache`.
///
/// # Examples
///
/// ```rust,no_run
/// use std::{sync::Arc, time::Duration};
/// use rttp_cache::cache::TtlCache;
/// use rttp_cache::http::ResponseWriter;
/// use rttp_cache::middleware::{cached, handler_fn};
/// use rttp_cache::server::Server;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let cache = Arc::new(TtlCache::new(Duration::from_secs(30))?);
///     let slow = handler_fn(|_req, w| Box::pin(async move {
///         w.write(b"expensive result");
///         Ok(())
///     }));
///
///     let server = Server::bind("127.0.0.1:9000").await?;
///     server.run(cached(cache, slow)).await?;
///     Ok(())
/// }
/// ```
pub fn cached<C, H>(cache: Arc<C>, handler: H) -> CachedHandler<C, H>
where
    C: CacheProvider + ?Sized + 'static,
    H: Handler,
{
    CachedHandler {
        cache,
        inner: handler,
        policy: FailurePolicy::default(),
    }
}

/// A [`Handler`] that serves memoized responses. Created by [`cached`].
pub struct CachedHandler<C: ?Sized, H> {
    cache: Arc<C>,
    inner: H,
    policy: FailurePolicy,
}

impl<C, H> CachedHandler<C, H>
where
    C: CacheProvider + ?Sized + 'static,
    H: Handler,
{
    /// Chooses how cache backend failures are handled.
    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    async fn serve_cached(
        &self,
        req: &Request,
        w: &mut dyn ResponseWriter,
    ) -> Result<(), HandlerError> {
        let key = cache_key(req);

        match self.cache.read(&key).await {
            Ok(Some(stored)) => {
                let recorded = codec::decode(&stored)?;
                debug!(key = %key, status = recorded.status.as_u16(), "cache hit");
                recorded.replay(w);
                return Ok(());
            }
            Ok(None) => debug!(key = %key, "cache miss"),
            Err(e) => {
                self.on_cache_error(&key, e)?;
                return self.inner.serve(req, w).await;
            }
        }

        let mut recorder = ResponseRecorder::new();
        self.inner.serve(req, &mut recorder).await?;
        let recorded = recorder.finish();

        let encoded = codec::encode(&recorded)?;
        match self.cache.write(&key, encoded).await {
            Ok(()) => debug!(key = %key, bytes = recorded.body.len(), "response cached"),
            Err(e) => self.on_cache_error(&key, e)?,
        }

        recorded.replay(w);
        Ok(())
    }

    // Returns the error back under `Abort`, swallows it under `Bypass`.
    fn on_cache_error(&self, key: &str, error: CacheError) -> Result<(), HandlerError> {
        match self.policy {
            FailurePolicy::Abort => Err(error.into()),
            FailurePolicy::Bypass => {
                warn!(key = %key, error = %error, "cache unavailable; serving uncached");
                Ok(())
            }
        }
    }
}

impl<C, H> Handler for CachedHandler<C, H>
where
    C: CacheProvider + ?Sized + 'static,
    H: Handler,
{
    fn serve<'a>(&'a self, req: &'a Request, w: &'a mut dyn ResponseWriter) -> HandlerFuture<'a> {
        Box::pin(self.serve_cached(req, w))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::cache::{CacheFuture, TtlCache};
    use crate::http::{Response, StatusCode};
    use crate::middleware::handler_fn;

    fn request(method: &str, target: &str) -> Request {
        let raw = format!("{method} {target} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        req
    }

    /// A handler whose body changes on every call, so a repeated body proves
    /// the response came from the cache.
    fn counting_handler(calls: Arc<AtomicUsize>) -> impl Handler {
        handler_fn(move |req, w| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                w.set_header("Content-Type", "text/plain");
                w.append_header("X-Call", &n.to_string());
                w.append_header("X-Call", "seen");
                w.write_status(StatusCode::Accepted);
                w.write(format!("call {n} for {} ", req.method()).as_bytes());
                w.write(req.request_uri().as_bytes());
                Ok(())
            })
        })
    }

    async fn serve(handler: &impl Handler, req: &Request) -> Result<Response, HandlerError> {
        let mut response = Response::default();
        handler.serve(req, &mut response).await?;
        Ok(response)
    }

    fn ttl_cache() -> Arc<TtlCache> {
        Arc::new(TtlCache::new(Duration::from_secs(30)).unwrap())
    }

    #[tokio::test]
    async fn second_request_is_served_from_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = cached(ttl_cache(), counting_handler(Arc::clone(&calls)));
        let req = request("GET", "/test");

        let first = serve(&handler, &req).await.unwrap();
        let second = serve(&handler, &req).await.unwrap();
        let third = serve(&handler, &req).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for repeat in [&second, &third] {
            assert_eq!(repeat.status(), first.status());
            assert_eq!(repeat.headers(), first.headers());
            assert_eq!(repeat.content(), first.content());
        }
    }

    #[tokio::test]
    async fn first_caller_sees_the_recorded_response() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = cached(ttl_cache(), counting_handler(calls));

        let response = serve(&handler, &request("GET", "/test")).await.unwrap();
        assert_eq!(response.status(), StatusCode::Accepted);
        assert_eq!(response.headers().get("content-type"), Some("text/plain"));
        let call_headers: Vec<_> = response.headers().get_all("x-call").collect();
        assert_eq!(call_headers, vec!["0", "seen"]);
        assert_eq!(response.content(), b"call 0 for GET /test");
    }

    #[tokio::test]
    async fn different_path_is_a_different_entry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = cached(ttl_cache(), counting_handler(Arc::clone(&calls)));

        let base = serve(&handler, &request("GET", "/test")).await.unwrap();
        let suffixed = serve(&handler, &request("GET", "/test/1")).await.unwrap();
        let slashed = serve(&handler, &request("GET", "/test/")).await.unwrap();
        let queried = serve(&handler, &request("GET", "/test?x=1")).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_ne!(base.content(), suffixed.content());
        assert_ne!(base.content(), slashed.content());
        assert_ne!(base.content(), queried.content());
    }

    #[tokio::test]
    async fn different_method_is_a_different_entry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = cached(ttl_cache(), counting_handler(Arc::clone(&calls)));

        let get = serve(&handler, &request("GET", "/test")).await.unwrap();
        let post = serve(&handler, &request("POST", "/test")).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_ne!(get.content(), post.content());
    }

    #[test]
    fn key_is_method_then_uri() {
        assert_eq!(cache_key(&request("GET", "/test")), "GET/test");
        assert_eq!(cache_key(&request("DELETE", "/a/b?c=d")), "DELETE/a/b?c=d");
        assert_ne!(
            cache_key(&request("GET", "/q?a=1&b=2")),
            cache_key(&request("GET", "/q?b=2&a=1"))
        );
    }

    #[tokio::test]
    async fn hit_replaces_sink_headers_of_same_name() {
        let handler = cached(ttl_cache(), counting_handler(Arc::new(AtomicUsize::new(0))));
        let req = request("GET", "/test");
        serve(&handler, &req).await.unwrap();

        let mut response = Response::default().header("X-Call", "stale").header("Server", "rttp");
        handler.serve(&req, &mut response).await.unwrap();

        let call_headers: Vec<_> = response.headers().get_all("x-call").collect();
        assert_eq!(call_headers, vec!["0", "seen"]);
        assert_eq!(response.headers().get("server"), Some("rttp"));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_runs_handler_again() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(TtlCache::new(Duration::from_secs(1)).unwrap());
        let handler = cached(cache, counting_handler(Arc::clone(&calls)));
        let req = request("GET", "/test");

        serve(&handler, &req).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        let later = serve(&handler, &req).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(later.content().starts_with(b"call 1"));
    }

    #[tokio::test]
    async fn handler_error_is_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let flaky = handler_fn(move |_req, w| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if n == 0 {
                    w.write(b"half written");
                    return Err(HandlerError::Other("upstream timed out".into()));
                }
                w.write(b"ok");
                Ok(())
            })
        });
        let cache = ttl_cache();
        let handler = cached(Arc::clone(&cache), flaky);
        let req = request("GET", "/flaky");

        assert!(matches!(
            serve(&handler, &req).await,
            Err(HandlerError::Other(_))
        ));
        assert!(cache.is_empty());

        let response = serve(&handler, &req).await.unwrap();
        assert_eq!(response.content(), b"ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    /// Backend that is down for reads, writes, or both.
    struct BrokenCache {
        reads_fail: bool,
        writes_fail: bool,
        inner: TtlCache,
    }

    impl BrokenCache {
        fn new(reads_fail: bool, writes_fail: bool) -> Arc<Self> {
            Arc::new(Self {
                reads_fail,
                writes_fail,
                inner: TtlCache::new(Duration::from_secs(30)).unwrap(),
            })
        }
    }

    impl CacheProvider for BrokenCache {
        fn read<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<Bytes>> {
            if self.reads_fail {
                return Box::pin(async { Err(CacheError::Unavailable("read refused".into())) });
            }
            self.inner.read(key)
        }

        fn write<'a>(&'a self, key: &'a str, value: Bytes) -> CacheFuture<'a, ()> {
            if self.writes_fail {
                return Box::pin(async { Err(CacheError::Unavailable("write refused".into())) });
            }
            self.inner.write(key, value)
        }
    }

    #[tokio::test]
    async fn read_failure_aborts_by_default() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = cached(
            BrokenCache::new(true, false),
            counting_handler(Arc::clone(&calls)),
        );

        let mut response = Response::default();
        let result = handler.serve(&request("GET", "/test"), &mut response).await;

        assert!(matches!(result, Err(HandlerError::Cache(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(response.content().is_empty());
    }

    #[tokio::test]
    async fn write_failure_aborts_by_default() {
        let handler = cached(
            BrokenCache::new(false, true),
            counting_handler(Arc::new(AtomicUsize::new(0))),
        );

        let mut response = Response::default();
        let result = handler.serve(&request("GET", "/test"), &mut response).await;

        assert!(matches!(result, Err(HandlerError::Cache(_))));
        assert!(response.content().is_empty());
    }

    #[tokio::test]
    async fn bypass_policy_serves_live() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = cached(
            BrokenCache::new(true, true),
            counting_handler(Arc::clone(&calls)),
        )
        .with_policy(FailurePolicy::Bypass);
        let req = request("GET", "/test");

        let first = serve(&handler, &req).await.unwrap();
        let second = serve(&handler, &req).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(first.content().starts_with(b"call 0"));
        assert!(second.content().starts_with(b"call 1"));
    }

    #[tokio::test]
    async fn bypass_policy_replays_when_only_writes_fail() {
        let handler = cached(
            BrokenCache::new(false, true),
            counting_handler(Arc::new(AtomicUsize::new(0))),
        )
        .with_policy(FailurePolicy::Bypass);

        let response = serve(&handler, &request("GET", "/test")).await.unwrap();
        assert_eq!(response.status(), StatusCode::Accepted);
        assert_eq!(response.content(), b"call 0 for GET /test");
    }

    #[tokio::test]
    async fn corrupt_entry_is_reported() {
        let cache = ttl_cache();
        cache
            .write("GET/test", Bytes::from_static(b"not a record"))
            .await
            .unwrap();
        let handler = cached(cache, counting_handler(Arc::new(AtomicUsize::new(0))));

        let result = serve(&handler, &request("GET", "/test")).await;
        assert!(matches!(result, Err(HandlerError::Codec(_))));
    }

    #[tokio::test]
    async fn works_with_dyn_cache_provider() {
        let cache: Arc<dyn CacheProvider> = ttl_cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = cached(cache, counting_handler(Arc::clone(&calls)));
        let req = request("GET", "/dyn");

        serve(&handler, &req).await.unwrap();
        serve(&handler, &req).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_share_entries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(cached(ttl_cache(), counting_handler(Arc::clone(&calls))));

        // Warm ten keys, then hit them concurrently.
        for i in 0..10 {
            serve(&handler, &request("GET", &format!("/item/{i}"))).await.unwrap();
        }

        let tasks: Vec<_> = (0..200)
            .map(|n| {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    let i = n % 10;
                    let response = serve(&handler, &request("GET", &format!("/item/{i}")))
                        .await
                        .unwrap();
                    (i, response.content().to_vec())
                })
            })
            .collect();

        for task in tasks {
            let (i, body) = task.await.unwrap();
            let body = String::from_utf8(body).unwrap();
            assert!(body.ends_with(&format!("/item/{i}")), "{body}");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }
}
