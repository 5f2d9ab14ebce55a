//! Serves a deliberately slow handler behind the response cache.
//!
//! ```text
//! RUST_LOG=debug cargo run --example cached_server
//! curl -i http://127.0.0.1:9000/anything   # ~4s the first time, instant after
//! ```

use std::{sync::Arc, time::Duration};

use rand::{Rng, distributions::Alphanumeric};
use rttp_cache::cache::{CacheConfig, TtlCache};
use rttp_cache::http::{ResponseWriter, StatusCode};
use rttp_cache::middleware::{cached, handler_fn};
use rttp_cache::server::Server;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = CacheConfig::new(Duration::from_secs(30))
        .with_simulated_latency(Duration::from_millis(5));
    let cache = Arc::new(TtlCache::with_config(config)?);

    let expensive = handler_fn(|_req, w| {
        Box::pin(async move {
            let out: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(20)
                .map(char::from)
                .collect();

            tokio::time::sleep(Duration::from_secs(4)).await;
            w.write_status(StatusCode::Ok);
            w.write(out.as_bytes());
            Ok(())
        })
    });

    let server = Server::bind("127.0.0.1:9000").await?;
    server.run(cached(cache, expensive)).await?;
    Ok(())
}
