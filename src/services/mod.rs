//! Services: lifecycle, loading and scheduled actions.
//!
//! ## Contents
//! - [`Service`], [`ServiceFn`], [`ServiceRef`] the unit the session manages
//! - [`ServiceInfo`], [`ServiceState`] read-only status view
//! - [`ServiceLoader`], [`Completion`] one-shot "start these and wait" orchestration
//! - [`CronScheduler`] and its [`CronEngine`] seam, driving [`Action`]s
//!
//! ```text
//! Session::register(path, svc) ─► registry: addr → (ServiceRef, ServiceInfo)
//! ServiceLoader::load() ─► services/start.services ─► manager runs start/run/stop
//!        └── polls ServiceInfo until running / failed / deadline
//! ```

mod action;
mod cron;
mod loader;
mod service;
mod state;

pub use action::Action;
pub use cron::{CronEngine, CronScheduler, JobCallback, JobId, JobInfo, Schedule, TokioCron};
pub use loader::{Completion, DEFAULT_LOADER_TIMEOUT, ServiceLoader};
pub use service::{Service, ServiceFn, ServiceRef};
pub use state::{ServiceInfo, ServiceState};
