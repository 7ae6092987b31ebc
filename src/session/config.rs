//! # Session configuration.
//!
//! [`SessionConfig`] holds the settings fixed for the lifetime of a session. Tunables
//! that may change at runtime live in [`Settings`](crate::Settings) instead.
//!
//! ## Sentinel values
//! - `grace = 0s` → shutdown does not wait for services at all.
//! - `bus_capacity = 0` → clamped to 1.

use std::time::Duration;

/// Host address used when none is configured.
pub const DEFAULT_ADDRESS: &str = "svc://localhost/app";

/// Configuration for a [`Session`](crate::Session).
///
/// ## Field semantics
/// - `address`: host address (`svc://host/instance`); seeds the `app.address` setting
/// - `grace`: maximum wait for services to stop during [`shutdown`](crate::Session::shutdown)
/// - `bus_capacity`: event bus ring buffer size (min 1)
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub address: String,

    /// Maximum time to wait for services to stop once the session is torn down.
    ///
    /// If exceeded, shutdown returns `RuntimeError::GraceExceeded`.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel.
    ///
    /// Receivers lagging more than `bus_capacity` events skip the oldest ones.
    pub bus_capacity: usize,
}

impl SessionConfig {
    /// Config with the given host address and default values otherwise.
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for SessionConfig {
    /// - `address = svc://localhost/app`
    /// - `grace = 30s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            grace: Duration::from_secs(30),
            bus_capacity: 1024,
        }
    }
}
