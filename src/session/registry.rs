//! # Service registry and manager listener.
//!
//! The registry is the single source of truth for service status. It owns every
//! registered service together with its [`ServiceInfo`] and, while the service
//! executes, the runner's join handle and cancellation token.
//!
//! ## Architecture
//! ```text
//! Bus → manager listener
//!         ├─► services/start.services {service.N} → start(addr) → spawn run_service
//!         └─► services/stop.services  {service.N} → stop(addr)  → cancel child token
//! ```
//!
//! ## Rules
//! - Only runners mutate a service's status; readers go through [`ServiceInfo`].
//! - `begin_start` under the write lock guards against double starts.
//! - Runner tokens are children of the session token, so teardown reaches every service.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, warn};

use crate::address::Address;
use crate::error::SessionError;
use crate::events::{Event, Payload, SERVICE_FAILED, START_SERVICES, STOP_SERVICES};
use crate::services::{ServiceInfo, ServiceRef};
use crate::session::Session;

use super::runner::run_service;

/// Payload key prefix listing service addresses in start/stop requests.
pub(crate) const SERVICE_KEY_PREFIX: &str = "service.";

struct Run {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

struct Entry {
    service: ServiceRef,
    info: ServiceInfo,
    run: Option<Run>,
}

#[derive(Default)]
pub(crate) struct Registry {
    entries: RwLock<HashMap<String, Entry>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a service in `Pending` state.
    pub(crate) fn insert(
        &self,
        addr: Address,
        service: ServiceRef,
    ) -> Result<ServiceInfo, SessionError> {
        let key = addr.to_string();
        let mut entries = self.entries.write();
        if entries.contains_key(&key) {
            return Err(SessionError::DuplicateService(key));
        }
        let info = ServiceInfo::new(service.name(), addr);
        entries.insert(
            key,
            Entry {
                service,
                info: info.clone(),
                run: None,
            },
        );
        Ok(info)
    }

    pub(crate) fn info(&self, key: &str) -> Result<ServiceInfo, SessionError> {
        self.entries
            .read()
            .get(key)
            .map(|e| e.info.clone())
            .ok_or_else(|| SessionError::ServiceNotFound(key.to_string()))
    }

    /// All services, sorted by address.
    pub(crate) fn infos(&self) -> Vec<ServiceInfo> {
        let mut infos: Vec<ServiceInfo> =
            self.entries.read().values().map(|e| e.info.clone()).collect();
        infos.sort_by(|a, b| a.addr().cmp(b.addr()));
        infos
    }

    /// Spawns the runner for `key` unless the service is already active.
    pub(crate) fn start(&self, session: &Session, key: &str) -> Result<(), SessionError> {
        if session.is_destroyed() {
            return Err(SessionError::Destroyed);
        }
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(key)
            .ok_or_else(|| SessionError::ServiceNotFound(key.to_string()))?;

        if let Err(e) = entry.info.begin_start() {
            debug!(service = key, error = %e, "start request ignored");
            return Ok(());
        }

        let cancel = session.token().child_token();
        let start_timeout = session.settings().services().start_timeout;
        let join = tokio::spawn(
            run_service(
                session.clone(),
                entry.service.clone(),
                entry.info.clone(),
                cancel.clone(),
                start_timeout,
            )
            .instrument(session.log().clone()),
        );
        entry.run = Some(Run { cancel, join });
        Ok(())
    }

    /// Cancels the runner of `key`; the service goes through its stop phase.
    pub(crate) fn stop(&self, key: &str) -> Result<(), SessionError> {
        let entries = self.entries.read();
        let entry = entries
            .get(key)
            .ok_or_else(|| SessionError::ServiceNotFound(key.to_string()))?;
        if let Some(run) = &entry.run {
            run.cancel.cancel();
        }
        Ok(())
    }

    /// Takes every runner join handle, keyed by address.
    pub(crate) fn take_runs(&self) -> Vec<(String, JoinHandle<()>)> {
        let mut entries = self.entries.write();
        entries
            .iter_mut()
            .filter_map(|(key, e)| e.run.take().map(|run| (key.clone(), run.join)))
            .collect()
    }
}

/// Subscribes to the bus and serves start/stop requests until the session is torn down.
///
/// The subscription is taken before returning, so requests dispatched right after
/// session construction are not missed.
pub(crate) fn spawn_listener(session: Session) {
    let mut rx = session.subscribe();
    let token = session.token().clone();
    let span = session.log().clone();

    tokio::spawn(
        async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => handle_event(&session, &ev),
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "service manager lagged behind the bus");
                        }
                    }
                }
            }
            debug!("service manager stopped");
        }
        .instrument(span),
    );
}

fn handle_event(session: &Session, ev: &Event) {
    let start = ev.is(&START_SERVICES);
    if !start && !ev.is(&STOP_SERVICES) {
        return;
    }

    for key in ev.payload().values_with_prefix(SERVICE_KEY_PREFIX) {
        let res = if start {
            session.registry().start(session, key)
        } else {
            session.registry().stop(key)
        };
        if let Err(e) = res {
            warn!(service = key, error = %e, label = e.as_label(), "service request failed");
            if !matches!(e, SessionError::Destroyed) {
                session.dispatch(
                    SERVICE_FAILED
                        .create(key, Payload::new())
                        .with_error(e),
                );
            }
        }
    }
}
