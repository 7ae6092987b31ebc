//! Session events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to publish and
//! subscribe to events dispatched through the [`Session`](crate::Session).
//!
//! ## Contents
//! - [`Event`], [`EventKey`] event record and `(scope, key)` templates
//! - [`Payload`] ordered string payload
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: callers via `Session::dispatch`, `ServiceLoader` (start request),
//!   the service manager (lifecycle notifications), session teardown.
//! - **Consumers**: the service manager listener, the `SubscriberSet` fan-out, and any
//!   receiver obtained from `Session::subscribe`.

mod bus;
mod event;
mod payload;

pub use bus::Bus;
pub use event::{
    Event, EventKey, GRACE_EXCEEDED, SERVICE_FAILED, SERVICE_STARTED, SERVICE_STOPPED,
    SHUTDOWN_COMPLETED, SHUTDOWN_REQUESTED, START_SERVICES, STOP_SERVICES,
};
pub use payload::Payload;
