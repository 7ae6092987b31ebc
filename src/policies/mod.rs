//! Polling policies.
//!
//! This module groups the knobs that control **how often** a loader inspects the
//! service registry while waiting for services to come up.
//!
//! ## Contents
//! - [`PollPolicy`] nominal interval + jitter
//! - [`JitterPolicy`] randomization strategy to avoid lockstep polling
//!
//! ## Quick wiring
//! ```text
//! Settings { services.loader_poll_interval, services.loader_poll_jitter }
//!      └─► ServicesSettings::poll ─► ServiceLoader poll loop: sleep(poll.next_delay())
//! ```
//!
//! ## Defaults
//! - `PollPolicy::default()` → interval=100ms, jitter=None.

mod jitter;
mod poll;

pub use jitter::JitterPolicy;
pub use poll::PollPolicy;
