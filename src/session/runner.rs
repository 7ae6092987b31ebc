//! # Drive one service through start, run and stop.
//!
//! ```text
//! Starting ── start() ──► Ok ─► Running ── run(token) ──► Stopping ── stop() ──► Stopped
//!                   │                         │
//!                   ├─ Err / timeout ─► Failed ┘ (stop phase still runs)
//!                   └─ token cancelled ─► Stopping
//! ```
//!
//! ## Rules
//! - The registry moves the service to `Starting` before spawning the runner.
//! - `stop()` runs on every exit path, including failed starts.
//! - Each failure is recorded on the service and published as `service.failed`.
//! - `Canceled` from `run` is a graceful exit, not a failure.

use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ServiceError;
use crate::events::{Payload, SERVICE_FAILED, SERVICE_STARTED, SERVICE_STOPPED};
use crate::services::{ServiceInfo, ServiceRef};
use crate::session::Session;

pub(crate) async fn run_service(
    session: Session,
    service: ServiceRef,
    info: ServiceInfo,
    token: CancellationToken,
    start_timeout: Option<Duration>,
) {
    let addr = info.addr().to_string();

    let started = tokio::select! {
        biased;
        _ = token.cancelled() => Err(ServiceError::Canceled),
        res = start_once(&session, &service, start_timeout) => res,
    };

    match started {
        Ok(()) => match info.mark_running() {
            Ok(()) => {
                info!(service = %addr, "service started");
                session.dispatch(SERVICE_STARTED.create(addr.as_str(), Payload::new()));

                match service.run(&session, token.clone()).await {
                    Ok(()) | Err(ServiceError::Canceled) => {}
                    Err(e) => fail(&session, &info, e),
                }
            }
            Err(e) => warn!(service = %addr, error = %e, "start finished in unexpected state"),
        },
        Err(ServiceError::Canceled) => debug!(service = %addr, "start cancelled"),
        Err(e) => fail(&session, &info, e),
    }

    if let Err(e) = info.begin_stop() {
        debug!(service = %addr, error = %e, "skipping stop transition");
    }
    if let Err(e) = service.stop(&session).await {
        fail(&session, &info, e);
    }
    if let Err(e) = info.mark_stopped() {
        debug!(service = %addr, error = %e, "skipping stopped transition");
    }
    info!(service = %addr, state = %info.state(), "service stopped");
    session.dispatch(SERVICE_STOPPED.create(addr, Payload::new()));
}

async fn start_once(
    session: &Session,
    service: &ServiceRef,
    timeout: Option<Duration>,
) -> Result<(), ServiceError> {
    match timeout.filter(|d| !d.is_zero()) {
        Some(dur) => match time::timeout(dur, service.start(session)).await {
            Ok(res) => res,
            Err(_elapsed) => Err(ServiceError::Timeout { timeout: dur }),
        },
        None => service.start(session).await,
    }
}

fn fail(session: &Session, info: &ServiceInfo, err: ServiceError) {
    let addr = info.addr().to_string();
    warn!(service = %addr, error = %err, label = err.as_label(), "service failed");
    info.record_error(err.clone());
    session.dispatch(
        SERVICE_FAILED
            .create(addr, Payload::new())
            .with_error(err),
    );
}
