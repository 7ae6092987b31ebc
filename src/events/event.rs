//! # Session events.
//!
//! An [`Event`] is an immutable, timestamped record identified by a `scope` and a
//! `key`, optionally carrying a human-readable value, an ordered [`Payload`] and an
//! error message. Producers build events from an [`EventKey`] template and publish
//! them once through [`Session::dispatch`](crate::Session::dispatch).
//!
//! ## Well-known keys
//! | template             | scope      | key                  | producer / consumer                   |
//! |----------------------|------------|----------------------|---------------------------------------|
//! | [`START_SERVICES`]   | `services` | `start.services`     | loader → service manager              |
//! | [`STOP_SERVICES`]    | `services` | `stop.services`      | caller → service manager              |
//! | [`SERVICE_STARTED`]  | `services` | `service.started`    | service manager                       |
//! | [`SERVICE_FAILED`]   | `services` | `service.failed`     | service manager                       |
//! | [`SERVICE_STOPPED`]  | `services` | `service.stopped`    | service manager                       |
//! | [`SHUTDOWN_REQUESTED`] | `session` | `shutdown.requested` | session teardown                     |
//! | [`SHUTDOWN_COMPLETED`] | `session` | `shutdown.completed` | session teardown                     |
//! | [`GRACE_EXCEEDED`]   | `session`  | `grace.exceeded`     | session teardown                      |
//!
//! ## Ordering guarantees
//! Each event has a process-wide sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use servicevisor::events::START_SERVICES;
//! use servicevisor::{Event, Payload};
//!
//! let mut payload = Payload::new();
//! payload.store("service.0", "svc://localhost/app/cache").unwrap();
//!
//! let ev = START_SERVICES.create("requested services (1)", payload);
//! assert!(ev.is(&START_SERVICES));
//! assert_eq!(ev.scope(), "services");
//! assert_eq!(ev.payload().get("service.0"), Some("svc://localhost/app/cache"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use chrono::{DateTime, Utc};

use super::payload::Payload;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// `(scope, key)` template used to create and match events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub scope: &'static str,
    pub key: &'static str,
}

impl EventKey {
    pub const fn new(scope: &'static str, key: &'static str) -> Self {
        Self { scope, key }
    }

    /// Creates an event from this template.
    pub fn create(&self, value: impl Into<Arc<str>>, payload: Payload) -> Event {
        Event::new(self.scope, self.key)
            .with_value(value)
            .with_payload(payload)
    }
}

/// Request to start the services listed in the payload (`service.N` keys).
pub const START_SERVICES: EventKey = EventKey::new("services", "start.services");
/// Request to stop the services listed in the payload (`service.N` keys).
pub const STOP_SERVICES: EventKey = EventKey::new("services", "stop.services");
/// A service reached `Running`.
pub const SERVICE_STARTED: EventKey = EventKey::new("services", "service.started");
/// A service recorded an error.
pub const SERVICE_FAILED: EventKey = EventKey::new("services", "service.failed");
/// A service reached `Stopped`.
pub const SERVICE_STOPPED: EventKey = EventKey::new("services", "service.stopped");
/// Session teardown started.
pub const SHUTDOWN_REQUESTED: EventKey = EventKey::new("session", "shutdown.requested");
/// Every service stopped within the grace period.
pub const SHUTDOWN_COMPLETED: EventKey = EventKey::new("session", "shutdown.completed");
/// Grace period elapsed with services still running.
pub const GRACE_EXCEEDED: EventKey = EventKey::new("session", "grace.exceeded");

/// Immutable session event.
#[derive(Clone, Debug)]
pub struct Event {
    seq: u64,
    at: DateTime<Utc>,
    scope: Arc<str>,
    key: Arc<str>,
    value: Option<Arc<str>>,
    payload: Payload,
    error: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event with current timestamp and next sequence number.
    pub fn new(scope: impl Into<Arc<str>>, key: impl Into<Arc<str>>) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: Utc::now(),
            scope: scope.into(),
            key: key.into(),
            value: None,
            payload: Payload::default(),
            error: None,
        }
    }

    /// Attaches a human-readable value.
    #[inline]
    pub fn with_value(mut self, value: impl Into<Arc<str>>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Attaches a payload, replacing any previous one.
    #[inline]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Attaches an error message.
    #[inline]
    pub fn with_error(mut self, err: impl ToString) -> Self {
        self.error = Some(err.to_string().into());
        self
    }

    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    #[inline]
    pub fn time(&self) -> DateTime<Utc> {
        self.at
    }

    #[inline]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    #[inline]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// True if the event was created from `template`.
    #[inline]
    pub fn is(&self, template: &EventKey) -> bool {
        self.scope.as_ref() == template.scope && self.key.as_ref() == template.key
    }
}
