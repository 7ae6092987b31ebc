//! Typed view over the `services.*` settings.

use std::time::Duration;

use crate::policies::{JitterPolicy, PollPolicy};

use super::{
    CRON_ON_SERVICE_START, LOADER_POLL_INTERVAL, LOADER_POLL_JITTER, LOADER_TIMEOUT, Settings,
    START_TIMEOUT,
};

/// Snapshot of the settings that drive service loading and cron jobs.
///
/// ## Sentinel values
/// - `loader_timeout = None` → the key is absent, unparsable or `0s`; the loader
///   substitutes its default.
/// - `start_timeout = None` → services start without a timeout.
#[derive(Clone, Debug, PartialEq)]
pub struct ServicesSettings {
    pub loader_timeout: Option<Duration>,
    pub poll: PollPolicy,
    pub start_timeout: Option<Duration>,
    pub cron_on_service_start: bool,
}

impl ServicesSettings {
    pub fn from_settings(settings: &Settings) -> Self {
        let duration = |key: &str| {
            settings
                .get(key)
                .and_then(|v| v.as_duration())
                .filter(|d| !d.is_zero())
        };

        let mut poll = PollPolicy::default();
        if let Some(interval) = duration(LOADER_POLL_INTERVAL) {
            poll.interval = interval;
        }
        if let Some(jitter) = settings
            .get(LOADER_POLL_JITTER)
            .and_then(|v| v.as_str().parse::<JitterPolicy>().ok())
        {
            poll.jitter = jitter;
        }

        Self {
            loader_timeout: duration(LOADER_TIMEOUT),
            poll,
            start_timeout: duration(START_TIMEOUT),
            cron_on_service_start: settings
                .get(CRON_ON_SERVICE_START)
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        }
    }
}
