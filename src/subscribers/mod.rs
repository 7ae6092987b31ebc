//! # Event subscribers.
//!
//! Subscribers observe the events dispatched through a [`Session`](crate::Session)
//! without slowing the publisher down.
//!
//! ```text
//!   dispatch(Event) ──► Bus ──► subscriber listener ──► SubscriberSet::emit(&Event)
//!                                                         ├──► [queue] ─► LogWriter
//!                                                         └──► [queue] ─► custom ...
//! ```
//!
//! ## Contents
//! - [`Subscribe`] the extension trait
//! - [`SubscriberSet`] per-subscriber bounded queues and workers
//! - `LogWriter` (feature `logging`) forwards events to `tracing`

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
