//! # Cron engine: the clock behind [`CronScheduler`](super::CronScheduler).
//!
//! [`CronEngine`] is the narrow seam between the scheduler and whatever drives time.
//! [`TokioCron`] is the default implementation:
//!
//! ```text
//! add_job(schedule, cb) ─► jobs[id]
//! start() ─► per job: loop { sleep until next occurrence ─► tracker.spawn(cb()) }
//! trigger(id) ─► tracker.spawn(cb())          (run once now)
//! stop() ─► cancel loops ─► tracker.close() ─► tracker.wait()   (drains executions)
//! ```
//!
//! Executions of the same or different jobs may overlap; the engine never serializes them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

use super::schedule::Schedule;
use crate::error::CronError;

/// Engine-assigned job identifier.
pub type JobId = u64;

/// Callback invoked on every occurrence; each call yields a fresh future.
pub type JobCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Calendar scheduling engine.
#[async_trait]
pub trait CronEngine: Send + Sync + 'static {
    /// Registers a job. Jobs added after [`start`](Self::start) are scheduled immediately.
    fn add_job(&self, schedule: Schedule, callback: JobCallback) -> Result<JobId, CronError>;

    /// Runs a job once now, outside its schedule. The run is drained by [`stop`](Self::stop).
    fn trigger(&self, id: JobId) -> Result<(), CronError>;

    /// Starts firing jobs on their schedules. Idempotent.
    fn start(&self);

    /// Stops scheduling and waits until every in-flight execution has finished.
    async fn stop(&self);
}

struct Job {
    id: JobId,
    schedule: Schedule,
    callback: JobCallback,
}

/// [`CronEngine`] on top of tokio timers.
pub struct TokioCron {
    jobs: Mutex<Vec<Arc<Job>>>,
    next_id: AtomicU64,
    started: AtomicBool,
    token: CancellationToken,
    tracker: TaskTracker,
}

impl TokioCron {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            started: AtomicBool::new(false),
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Number of executions and schedule loops currently alive.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    fn spawn_loop(&self, job: Arc<Job>) {
        let token = self.token.clone();
        let tracker = self.tracker.clone();
        self.tracker.spawn(async move {
            loop {
                let now = Utc::now();
                let Some(next) = job.schedule.next_after(&now) else {
                    debug!(job = job.id, "cron schedule exhausted");
                    return;
                };
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = sleep(wait) => {
                        tracker.spawn((job.callback)());
                    }
                }
            }
        });
    }
}

impl Default for TokioCron {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CronEngine for TokioCron {
    fn add_job(&self, schedule: Schedule, callback: JobCallback) -> Result<JobId, CronError> {
        if self.token.is_cancelled() {
            return Err(CronError::Stopped);
        }
        let job = Arc::new(Job {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            schedule,
            callback,
        });
        let id = job.id;
        self.jobs.lock().push(Arc::clone(&job));
        if self.started.load(Ordering::Acquire) {
            self.spawn_loop(job);
        }
        Ok(id)
    }

    fn trigger(&self, id: JobId) -> Result<(), CronError> {
        if self.token.is_cancelled() {
            return Err(CronError::Stopped);
        }
        let callback = self
            .jobs
            .lock()
            .iter()
            .find(|j| j.id == id)
            .map(|j| Arc::clone(&j.callback))
            .ok_or(CronError::UnknownJob(id))?;
        self.tracker.spawn(callback());
        Ok(())
    }

    fn start(&self) {
        if self.token.is_cancelled() || self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        let jobs: Vec<Arc<Job>> = self.jobs.lock().clone();
        for job in jobs {
            self.spawn_loop(job);
        }
    }

    async fn stop(&self) {
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use futures::FutureExt;

    use super::*;

    fn counting(counter: &Arc<AtomicUsize>, delay: Duration) -> JobCallback {
        let counter = Arc::clone(counter);
        Arc::new(move || {
            let counter = Arc::clone(&counter);
            async move {
                sleep(delay).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn fires_on_schedule() {
        let engine = TokioCron::new();
        let hits = Arc::new(AtomicUsize::new(0));
        engine
            .add_job(
                Schedule::Every(Duration::from_millis(20)),
                counting(&hits, Duration::ZERO),
            )
            .unwrap();
        engine.start();
        sleep(Duration::from_millis(150)).await;
        engine.stop().await;
        assert!(hits.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn stop_drains_triggered_runs() {
        let engine = TokioCron::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let id = engine
            .add_job(
                Schedule::parse("@yearly").unwrap(),
                counting(&hits, Duration::from_millis(100)),
            )
            .unwrap();
        engine.trigger(id).unwrap();
        engine.stop().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(engine.in_flight(), 0);
    }

    #[tokio::test]
    async fn stopped_engine_rejects_work() {
        let engine = TokioCron::new();
        engine.stop().await;
        let cb = counting(&Arc::new(AtomicUsize::new(0)), Duration::ZERO);
        assert_eq!(
            engine.add_job(Schedule::Every(Duration::from_secs(1)), cb),
            Err(CronError::Stopped)
        );
        assert_eq!(engine.trigger(1), Err(CronError::Stopped));
    }

    #[tokio::test]
    async fn unknown_job() {
        let engine = TokioCron::new();
        assert_eq!(engine.trigger(42), Err(CronError::UnknownJob(42)));
    }
}
