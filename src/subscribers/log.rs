//! # Logging subscriber for debugging and demos.
//!
//! [`LogWriter`] forwards every session event to `tracing` at `INFO` (or `WARN` when
//! the event carries an error). Install a `tracing` subscriber to see the output:
//!
//! ```text
//! INFO event scope="services" key="start.services" value="requested services (2)" payload="service.0=svc://localhost/app/db service.1=..."
//! WARN event scope="services" key="service.failed" value="svc://localhost/app/db" error="execution failed: refused"
//! ```

use async_trait::async_trait;
use tracing::{info, warn};

use super::Subscribe;
use crate::events::Event;

/// Subscriber writing events to `tracing`.
///
/// Enabled via the `logging` feature.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

impl LogWriter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let payload = e
            .payload()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");
        let value = e.value().unwrap_or_default();

        match e.error() {
            Some(err) => warn!(
                seq = e.seq(),
                scope = e.scope(),
                key = e.key(),
                value,
                %payload,
                error = err,
                "event"
            ),
            None => info!(
                seq = e.seq(),
                scope = e.scope(),
                key = e.key(),
                value,
                %payload,
                "event"
            ),
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
