//! # Example: cron_jobs
//!
//! Schedules two session-bound actions, runs both once at start and stops the
//! scheduler after a few seconds, waiting for in-flight runs.
//!
//! ## Flow
//! ```text
//! CronScheduler::job("heartbeat", "@every 1s")
//! CronScheduler::job("report", "*/2 * * * * *")
//! CronScheduler::start()   (services.cron_on_service_start = true → both run now)
//! sleep(5s)
//! CronScheduler::stop()    (waits for running actions)
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example cron_jobs
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use servicevisor::settings::CRON_ON_SERVICE_START;
use servicevisor::{Action, CronScheduler, ServiceError, Session, SessionBuilder, SessionConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    let session = SessionBuilder::new(SessionConfig::default())
        .with_setting(CRON_ON_SERVICE_START, true)
        .build()?;
    let cron = CronScheduler::new(session.clone());

    let beats = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&beats);
    cron.job(
        "heartbeat",
        "@every 1s",
        Action::new(move |_s: Session| {
            let counter = Arc::clone(&counter);
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                println!("[heartbeat] #{n}");
                Ok::<_, ServiceError>(())
            }
        }),
    )?;

    cron.job(
        "report",
        "*/2 * * * * *",
        Action::new(|s: Session| async move {
            println!("[report] {} services registered", s.services().len());
            tokio::time::sleep(Duration::from_millis(700)).await;
            println!("[report] done");
            Ok::<_, ServiceError>(())
        }),
    )?;

    // Rejected expressions are reported and never scheduled.
    if let Err(e) = cron.job("broken", "every other day", Action::new(|_s: Session| async {
        Ok::<_, ServiceError>(())
    })) {
        println!("[broken] {e}");
    }

    for job in cron.jobs() {
        println!("job #{} {} ({})", job.id, job.name, job.expr);
    }

    cron.start();
    tokio::time::sleep(Duration::from_secs(5)).await;
    cron.stop().await;

    println!("heartbeats: {}", beats.load(Ordering::SeqCst));
    session.shutdown().await?;
    Ok(())
}
