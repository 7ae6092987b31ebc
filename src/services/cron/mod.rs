//! # Cron-driven session actions.
//!
//! [`CronScheduler`] binds schedule expressions to [`Action`]s invoked with the
//! session. Timekeeping is delegated to a [`CronEngine`] ([`TokioCron`] by default).
//!
//! ## Lifecycle
//! ```text
//! job(name, expr, action) ─► Schedule::parse ─► engine.add_job ─► jobs index
//! start() ─► services.cron_on_service_start? ─► engine.trigger(id) for every job
//!         └► engine.start()
//! stop()  ─► engine.stop()  (returns after in-flight runs finished)
//! ```
//!
//! Failed runs are logged and never stop the schedule.

mod engine;
mod schedule;

pub use engine::{CronEngine, JobCallback, JobId, TokioCron};
pub use schedule::Schedule;

use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{Instrument, debug, error, info};

use crate::error::CronError;
use crate::services::Action;
use crate::session::Session;

/// Registered job as listed by [`CronScheduler::jobs`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobInfo {
    pub id: JobId,
    pub name: String,
    pub expr: String,
}

/// Schedules session-bound actions.
pub struct CronScheduler {
    session: Session,
    engine: Arc<dyn CronEngine>,
    jobs: Mutex<Vec<JobInfo>>,
}

impl CronScheduler {
    /// Scheduler backed by [`TokioCron`].
    pub fn new(session: Session) -> Self {
        Self::with_engine(session, Arc::new(TokioCron::new()))
    }

    pub fn with_engine(session: Session, engine: Arc<dyn CronEngine>) -> Self {
        Self {
            session,
            engine,
            jobs: Mutex::new(Vec::new()),
        }
    }

    /// Registers `action` under `expr`.
    ///
    /// A rejected job is logged, left out of the index and reported to the caller.
    pub fn job(
        &self,
        name: impl Into<String>,
        expr: &str,
        action: Action,
    ) -> Result<JobId, CronError> {
        let name = name.into();
        let registered = Schedule::parse(expr).and_then(|schedule| {
            let callback = self.callback(name.clone(), action);
            self.engine.add_job(schedule, callback)
        });

        match registered {
            Ok(id) => {
                debug!(parent: self.session.log(), job = id, %name, expr, "cron job registered");
                self.jobs.lock().push(JobInfo {
                    id,
                    name,
                    expr: expr.to_string(),
                });
                Ok(id)
            }
            Err(e) => {
                error!(
                    parent: self.session.log(),
                    %name,
                    expr,
                    error = %e,
                    label = e.as_label(),
                    "failed to add cron job"
                );
                Err(e)
            }
        }
    }

    /// Registered jobs in registration order.
    pub fn jobs(&self) -> Vec<JobInfo> {
        self.jobs.lock().clone()
    }

    /// Starts the engine, first running every job once when
    /// `services.cron_on_service_start` is set.
    pub fn start(&self) {
        if self.session.settings().services().cron_on_service_start {
            for job in self.jobs() {
                info!(
                    parent: self.session.log(),
                    job = job.id,
                    name = %job.name,
                    expr = %job.expr,
                    "executing cron first time"
                );
                if let Err(e) = self.engine.trigger(job.id) {
                    error!(parent: self.session.log(), job = job.id, error = %e, "cron trigger failed");
                }
            }
        }
        self.engine.start();
    }

    /// Stops the engine and waits for in-flight runs to finish.
    pub async fn stop(&self) {
        self.engine.stop().await;
        debug!(parent: self.session.log(), "cron stopped");
    }

    fn callback(&self, name: String, action: Action) -> JobCallback {
        let session = self.session.clone();
        let name: Arc<str> = name.into();
        Arc::new(move || {
            let session = session.clone();
            let action = action.clone();
            let name = Arc::clone(&name);
            let span = session.log().clone();
            async move {
                if let Err(e) = action.call(session).await {
                    error!(job = %name, error = %e, label = e.as_label(), "cron job failed");
                }
            }
            .instrument(span)
            .boxed()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::error::ServiceError;
    use crate::session::{SessionBuilder, SessionConfig};
    use crate::settings::CRON_ON_SERVICE_START;

    fn counting(counter: &Arc<AtomicUsize>) -> Action {
        let counter = Arc::clone(counter);
        Action::new(move |_s: Session| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ServiceError>(())
            }
        })
    }

    #[tokio::test]
    async fn rejected_job_is_reported_and_not_indexed() {
        let session = SessionBuilder::new(SessionConfig::default()).build().unwrap();
        let cron = CronScheduler::new(session);
        let hits = Arc::new(AtomicUsize::new(0));

        assert!(cron.job("bad", "every tuesday", counting(&hits)).is_err());
        let id = cron.job("good", "@daily", counting(&hits)).unwrap();

        let jobs = cron.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, id);
        assert_eq!(jobs[0].name, "good");
        assert_eq!(jobs[0].expr, "@daily");
        cron.stop().await;
    }

    #[tokio::test]
    async fn no_run_on_start_without_flag() {
        let session = SessionBuilder::new(SessionConfig::default()).build().unwrap();
        let cron = CronScheduler::new(session);
        let hits = Arc::new(AtomicUsize::new(0));
        cron.job("daily", "@daily", counting(&hits)).unwrap();
        cron.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        cron.stop().await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_job_keeps_running() {
        let session = SessionBuilder::new(SessionConfig::default())
            .with_setting(CRON_ON_SERVICE_START, true)
            .build()
            .unwrap();
        let cron = CronScheduler::new(session);
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        cron.job(
            "flaky",
            "@every 20ms",
            Action::new(move |_s: Session| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ServiceError::fail("nope"))
                }
            }),
        )
        .unwrap();
        cron.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        cron.stop().await;
        assert!(runs.load(Ordering::SeqCst) >= 2);
    }
}
