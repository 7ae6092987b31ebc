//! # servicevisor
//!
//! **Servicevisor** is a session-scoped service runtime for Rust.
//!
//! A process assembles itself from independently addressable services
//! (`svc://host/instance/path`), starts them through a shared [`Session`] and waits for
//! them with a deadline-bound [`ServiceLoader`]. A [`CronScheduler`] fires
//! session-bound [`Action`]s on calendar schedules.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   caller ──► ServiceLoader::load()
//!                 │  resolve refs against app.address, dedupe, lookup
//!                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Session (shared context)                                         │
//! │  - Settings (services.loader_timeout, ...)                        │
//! │  - Bus (broadcast events)                                         │
//! │  - Registry (address → Service + ServiceInfo)                     │
//! │  - span (tracing)                                                 │
//! └──────┬──────────────────────────────┬─────────────────────────────┘
//!        │ services/start.services      │ every event
//!        ▼                              ▼
//!   service manager                subscriber listener ──► SubscriberSet
//!        │                                                   ├─► worker ─► LogWriter
//!        ▼                                                   └─► worker ─► custom
//!   run_service(): start ─► run ─► stop
//!        │ records status + publishes service.started / service.failed / service.stopped
//!        ▼
//!   ServiceInfo ◄── polled by ServiceLoader until running / failed / deadline
//! ```
//!
//! ### Loader outcome
//! ```text
//! load() ─► Completion (fires exactly once)
//!   ├─ all queued services running ─► err() == Ok(())
//!   ├─ any queued service failed    ─► Service{..}... + StartFailed
//!   ├─ deadline                     ─► NotLoadedOnTime(addr)... + DeadlineExceeded
//!   └─ bad host / refs / lookup     ─► immediately, without waiting
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                         |
//! |-------------------|----------------------------------------------------------|--------------------------------------------|
//! | **Addresses**     | Parse and resolve hierarchical service identifiers.      | [`Address`]                                |
//! | **Services**      | Define services as trait impls or closures.              | [`Service`], [`ServiceFn`], [`ServiceInfo`]|
//! | **Loading**       | Start a set of services and wait under a deadline.       | [`ServiceLoader`], [`Completion`]          |
//! | **Cron**          | Run session-bound actions on schedules.                  | [`CronScheduler`], [`CronEngine`]          |
//! | **Events**        | Observe everything the session does.                     | [`Event`], [`Subscribe`]                   |
//! | **Configuration** | Fixed config plus a runtime settings store.              | [`SessionConfig`], [`Settings`]            |
//! | **Errors**        | Typed errors per component.                              | [`LoaderError`], [`SessionError`], ...     |
//!
//! ## Optional features
//! - `logging`: exports the [`LogWriter`] subscriber that forwards events to `tracing`.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use servicevisor::{ServiceError, ServiceFn, Session, SessionBuilder, SessionConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = SessionBuilder::new(SessionConfig::with_address("svc://localhost/demo"))
//!         .with_setting("services.loader_timeout", Duration::from_secs(5))
//!         .with_service("db", ServiceFn::arc("db", |_s: Session| async { Ok::<_, ServiceError>(()) }))
//!         .build()?;
//!
//!     let loader = session.loader(["db"]);
//!     loader.load().wait().await;
//!     loader.err()?;
//!
//!     session.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod address;
mod error;
pub mod events;
mod policies;
mod services;
mod session;
pub mod settings;
pub mod subscribers;

// ---- Public re-exports ----

pub use address::{Address, SCHEME};
pub use error::{
    AddressError, CronError, LoaderError, PayloadError, RuntimeError, ServiceError,
    SessionError, TransitionError,
};
pub use events::{Event, EventKey, Payload};
pub use policies::{JitterPolicy, PollPolicy};
pub use services::{
    Action, Completion, CronEngine, CronScheduler, DEFAULT_LOADER_TIMEOUT, JobCallback, JobId,
    JobInfo, Schedule, Service, ServiceFn, ServiceInfo, ServiceLoader, ServiceRef, ServiceState,
    TokioCron,
};
pub use session::{DEFAULT_ADDRESS, Session, SessionBuilder, SessionConfig};
pub use settings::{ServicesSettings, Settings, Value};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
