//! Wires a small request-handling graph and walks through its lifetimes.
//!
//! Run with `RUST_LOG=weft_container=debug` to watch the container work.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;
use tracing_subscriber::EnvFilter;
use weft::prelude::*;

struct Config {
    database_url: String,
}

struct Database {
    url: String,
}

impl Database {
    fn connect(config: Arc<Config>) -> std::io::Result<Self> {
        if config.database_url.is_empty() {
            return Err(std::io::Error::other("empty database url"));
        }
        Ok(Self {
            url: config.database_url.clone(),
        })
    }
}

trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

struct TickClock(AtomicU64);

impl Clock for TickClock {
    fn now(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

struct RequestContext {
    started_at: u64,
}

struct UserHandler {
    db: Arc<Database>,
    request: Arc<RequestContext>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let container = Container::builder()
        .transient(|db: Arc<Database>, request: Arc<RequestContext>| UserHandler { db, request })
        .scoped(|clock: Arc<dyn Clock>| RequestContext {
            started_at: clock.now(),
        })
        .fallible_singleton(Database::connect)
        .singleton(|| TickClock(AtomicU64::new(1_000)))
        .bind::<dyn Clock, TickClock>(|clock| clock)
        .singleton_value(Config {
            database_url: "postgres://localhost/app".into(),
        })
        .build()?;

    for request in 0..2 {
        let scope = container.scope();
        let first = scope.resolve::<UserHandler>()?;
        let second = scope.resolve::<UserHandler>()?;

        info!(
            request,
            scope = %scope.id(),
            db = %first.db.url,
            started_at = first.request.started_at,
            same_context = Arc::ptr_eq(&first.request, &second.request),
            "Handled request"
        );
    }

    match container.resolve::<UserHandler>() {
        Ok(_) => info!("Resolved outside a scope"),
        Err(err) => info!(error = %err.root_cause(), "Scoped dependency needs a scope"),
    }

    Ok(())
}
