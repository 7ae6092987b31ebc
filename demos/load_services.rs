//! # Example: load_services
//!
//! Registers three services and loads them with a deadline, printing every session
//! event through [`LogWriter`].
//!
//! Demonstrates how to:
//! - Implement [`Service`] with start/run/stop phases.
//! - Build a closure-backed service with [`ServiceFn`].
//! - Load services with [`ServiceLoader`] and read the aggregated error.
//!
//! ## Flow
//! ```text
//! SessionBuilder::build()
//!     ├─► register db, cache, mailer
//!     ├─► loader(["db", "cache"]).wait()      → Ok
//!     ├─► loader(["mailer"]).wait()           → StartFailed (mailer refuses to start)
//!     └─► shutdown()                          → every service stops
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example load_services --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use servicevisor::settings::LOADER_TIMEOUT;
use servicevisor::{
    LogWriter, Service, ServiceError, ServiceFn, Session, SessionBuilder, SessionConfig,
    Subscribe,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Pretends to hold a connection pool.
struct Database;

#[async_trait]
impl Service for Database {
    fn name(&self) -> &str {
        "database"
    }

    async fn start(&self, _session: &Session) -> Result<(), ServiceError> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok(())
    }

    async fn run(&self, _session: &Session, ctx: CancellationToken) -> Result<(), ServiceError> {
        let mut tick = tokio::time::interval(Duration::from_millis(250));
        loop {
            tokio::select! {
                _ = ctx.cancelled() => return Ok(()),
                _ = tick.tick() => tracing::debug!("database heartbeat"),
            }
        }
    }

    async fn stop(&self, _session: &Session) -> Result<(), ServiceError> {
        tracing::info!("closing database pool");
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // 1. Session with a logging subscriber and a short loader deadline
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let session = SessionBuilder::new(SessionConfig::with_address("svc://localhost/demo"))
        .with_subscribers(subs)
        .with_setting(LOADER_TIMEOUT, "2s")
        .build()?;

    // 2. Services
    session.register("db", Arc::new(Database))?;
    session.register(
        "cache",
        ServiceFn::arc("cache", |_s: Session| async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, ServiceError>(())
        }),
    )?;
    session.register(
        "mailer",
        ServiceFn::arc("mailer", |_s: Session| async {
            Err::<(), _>(ServiceError::fail("smtp relay unreachable"))
        }),
    )?;

    // 3. Load what the app needs
    session.loader(["db", "cache"]).wait().await?;
    println!("db and cache are running");

    // 4. A failing load reports every cause
    if let Err(err) = session.loader(["mailer"]).wait().await {
        println!("mailer did not load:");
        for cause in err.iter() {
            println!("  - {cause}");
        }
    }

    for info in session.services() {
        println!("{} state={} errors={}", info.addr(), info.state(), info.errs().len());
    }

    // 5. Tear down
    session.shutdown().await?;
    Ok(())
}
