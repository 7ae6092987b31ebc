//! # Session settings.
//!
//! [`Settings`] is the session's concurrent `key → Value` store. Keys are dotted
//! strings (`services.loader_timeout`). Defaults for the runtime's own keys are
//! written by [`Settings::with_defaults`]; anything else is application-defined.
//!
//! | key                              | default   |
//! |----------------------------------|-----------|
//! | [`APP_ADDRESS`]                  | set from `SessionConfig::address` |
//! | [`LOADER_TIMEOUT`]               | `30s`     |
//! | [`LOADER_POLL_INTERVAL`]         | `100ms`   |
//! | [`LOADER_POLL_JITTER`]           | `none`    |
//! | [`START_TIMEOUT`]                | `0s` (no timeout) |
//! | [`CRON_ON_SERVICE_START`]        | `false`   |
//!
//! [`ServicesSettings`] is the typed view of the `services.*` keys.

mod services;
mod value;

use std::collections::HashMap;

use parking_lot::RwLock;

pub use services::ServicesSettings;
pub use value::Value;

/// Host address of the application instance.
pub const APP_ADDRESS: &str = "app.address";
/// Deadline for one service load.
pub const LOADER_TIMEOUT: &str = "services.loader_timeout";
/// Tick of the loader's readiness poll.
pub const LOADER_POLL_INTERVAL: &str = "services.loader_poll_interval";
/// Jitter applied to the loader tick: `none`, `full` or `equal`.
pub const LOADER_POLL_JITTER: &str = "services.loader_poll_jitter";
/// Per-service start timeout (`0s` = none).
pub const START_TIMEOUT: &str = "services.start_timeout";
/// Run every cron job once when the scheduler starts.
pub const CRON_ON_SERVICE_START: &str = "services.cron_on_service_start";

/// Concurrent settings store.
#[derive(Debug, Default)]
pub struct Settings {
    values: RwLock<HashMap<String, Value>>,
}

impl Settings {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the runtime defaults for `services.*`.
    pub fn with_defaults() -> Self {
        let settings = Self::new();
        settings.set(LOADER_TIMEOUT, "30s");
        settings.set(LOADER_POLL_INTERVAL, "100ms");
        settings.set(LOADER_POLL_JITTER, "none");
        settings.set(START_TIMEOUT, "0s");
        settings.set(CRON_ON_SERVICE_START, false);
        settings
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    /// Sets `key`, returning the previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.write().insert(key.into(), value.into())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }

    /// Sorted list of keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.read().keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Typed snapshot of the `services.*` keys.
    pub fn services(&self) -> ServicesSettings {
        ServicesSettings::from_settings(self)
    }
}

impl<K, V> FromIterator<(K, V)> for Settings
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let settings = Self::new();
        for (k, v) in iter {
            settings.set(k, v);
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults_cover_services_keys() {
        let s = Settings::with_defaults();
        assert_eq!(
            s.get(LOADER_TIMEOUT).and_then(|v| v.as_duration()),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            s.get(CRON_ON_SERVICE_START).and_then(|v| v.as_bool()),
            Some(false)
        );
        assert_eq!(s.get(LOADER_POLL_JITTER).unwrap().as_str(), "none");
        assert!(!s.contains(APP_ADDRESS));
    }

    #[test]
    fn set_replaces_and_returns_previous() {
        let s: Settings = [("a", "1")].into_iter().collect();
        let prev = s.set("a", "2");
        assert_eq!(prev.map(|v| v.to_string()), Some("1".to_string()));
        assert_eq!(s.get("a").and_then(|v| v.as_int()), Some(2));
        assert_eq!(s.keys(), vec!["a".to_string()]);
    }
}
