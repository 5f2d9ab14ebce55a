//! # rttp-cache
//!
//! A time-bounded, concurrency-safe key/value cache and an HTTP middleware
//! that uses it to memoize complete responses, built on the rttp async
//! HTTP/1.1 server.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::{sync::Arc, time::Duration};
//! use rttp_cache::cache::TtlCache;
//! use rttp_cache::http::{ResponseWriter, StatusCode};
//! use rttp_cache::middleware::{cached, handler_fn};
//! use rttp_cache::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = Arc::new(TtlCache::new(Duration::from_secs(30))?);
//!     let handler = handler_fn(|req, w| Box::pin(async move {
//!         w.write_status(StatusCode::Ok);
//!         w.write(format!("rendered {}", req.path()).as_bytes());
//!         Ok(())
//!     }));
//!
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     println!("Listening on http://127.0.0.1:8080");
//!     server.run(cached(cache, handler)).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod http;
pub mod middleware;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{CacheConfig, CacheError, CacheProvider, TtlCache};
pub use http::{Headers, Method, Request, Response, ResponseRecorder, ResponseWriter, StatusCode};
pub use middleware::{CachedHandler, FailurePolicy, Handler, HandlerError, cached, handler_fn};
pub use server::{Server, ServerError};
