//! # One-shot service loader.
//!
//! [`ServiceLoader`] resolves a set of service references against a host address,
//! asks the session to start them and polls the registry until every requested
//! service runs, one of them records an error, or the deadline elapses.
//!
//! ```text
//! ServiceLoader::new(session, host, refs)      (errors deferred)
//!        │
//!   load() ──► queue (lookup, dedupe, skip running)
//!        │        └─► dispatch services/start.services {service.0, service.1, ...}
//!        │
//!        └─► poll task ──┬─ deadline        → NotLoadedOnTime(addr)... + DeadlineExceeded
//!                        ├─ session closed  → SessionDestroyed
//!                        └─ tick            → any errs?  → Service{..}... + StartFailed
//!                                             all running → done
//! ```
//!
//! ## Rules
//! - The completion signal fires exactly once; every outcome goes through
//!   [`Shared::complete`].
//! - The start request is dispatched before the first tick.
//! - [`ServiceLoader::err`] never blocks: before completion it returns
//!   [`LoaderError::NotFinished`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use crate::address::Address;
use crate::error::LoaderError;
use crate::events::{Event, Payload, START_SERVICES};
use crate::policies::PollPolicy;
use crate::services::ServiceInfo;
use crate::session::Session;

/// Deadline used when `services.loader_timeout` is unset or not positive.
pub const DEFAULT_LOADER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Loading,
    Done,
}

#[derive(Debug)]
struct LoadState {
    phase: Phase,
    errors: Vec<LoaderError>,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<LoadState>,
    closed: CancellationToken,
}

impl Shared {
    /// Appends `errors` and closes the completion signal. Later calls are ignored.
    fn complete(&self, errors: Vec<LoaderError>) -> bool {
        {
            let mut st = self.state.lock();
            if st.phase == Phase::Done {
                return false;
            }
            st.errors.extend(errors);
            st.phase = Phase::Done;
        }
        self.closed.cancel();
        true
    }
}

/// Completion signal of a [`ServiceLoader`].
#[derive(Clone, Debug)]
pub struct Completion {
    closed: CancellationToken,
}

impl Completion {
    /// Resolves once the load finished, successfully or not.
    pub async fn wait(&self) {
        self.closed.cancelled().await
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

/// Loads a set of services and reports the aggregated outcome once.
///
/// Not reusable: after completion, [`load`](Self::load) returns the closed signal.
#[derive(Debug)]
pub struct ServiceLoader {
    session: Session,
    host: Option<Address>,
    requested: Vec<Address>,
    init_errors: Vec<LoaderError>,
    shared: Arc<Shared>,
}

impl ServiceLoader {
    /// Resolves `refs` against `host`. Failures are kept and reported by [`load`](Self::load).
    pub fn new<I, S>(session: Session, host: &str, refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut init_errors = Vec::new();
        let mut requested = Vec::new();
        let mut seen = HashSet::new();

        let host = match Address::parse(host) {
            Ok(addr) => Some(addr),
            Err(e) => {
                init_errors.push(LoaderError::InvalidAddress(e));
                init_errors.push(LoaderError::InvalidHost {
                    address: host.to_string(),
                });
                None
            }
        };

        if let Some(host) = &host {
            for r in refs {
                match host.resolve_service(r.as_ref()) {
                    Ok(addr) => {
                        if seen.insert(addr.to_string()) {
                            requested.push(addr);
                        }
                    }
                    Err(e) => init_errors.push(LoaderError::InvalidAddress(e)),
                }
            }
        }

        Self {
            session,
            host,
            requested,
            init_errors,
            shared: Arc::new(Shared {
                state: Mutex::new(LoadState {
                    phase: Phase::Idle,
                    errors: Vec::new(),
                }),
                closed: CancellationToken::new(),
            }),
        }
    }

    /// Resolved, deduplicated service addresses in request order.
    pub fn requested(&self) -> &[Address] {
        &self.requested
    }

    pub fn host(&self) -> Option<&Address> {
        self.host.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.state.lock().phase == Phase::Loading
    }

    /// Starts loading and returns the completion signal.
    ///
    /// Idempotent: later calls return the same signal without loading again.
    /// Must be called within a tokio runtime.
    pub fn load(&self) -> Completion {
        {
            let mut st = self.shared.state.lock();
            if st.phase != Phase::Idle {
                return self.completion();
            }
            st.phase = Phase::Loading;
        }

        if !self.init_errors.is_empty() {
            let mut errors = self.init_errors.clone();
            errors.push(LoaderError::InitFailed);
            self.cancel(errors);
            return self.completion();
        }

        let settings = self.session.settings().services();
        let timeout = match settings.loader_timeout {
            Some(t) => t,
            None => {
                warn!(
                    parent: self.session.log(),
                    timeout = ?DEFAULT_LOADER_TIMEOUT,
                    "service loader using default timeout"
                );
                DEFAULT_LOADER_TIMEOUT
            }
        };
        if let Some(host) = &self.host {
            info!(
                parent: self.session.log(),
                host = host.host(),
                instance = host.instance(),
                "loading services"
            );
        }

        let mut queue: Vec<(String, ServiceInfo)> = Vec::with_capacity(self.requested.len());
        let mut queued = HashSet::new();
        for addr in &self.requested {
            let key = addr.to_string();
            let info = match self.session.service_info(&key) {
                Ok(info) => info,
                Err(e) => {
                    self.cancel(vec![LoaderError::Lookup(e)]);
                    return self.completion();
                }
            };
            if !queued.insert(key.clone()) {
                self.cancel(vec![LoaderError::DuplicateRequest { address: key }]);
                return self.completion();
            }
            if info.running() {
                info!(parent: self.session.log(), service = %key, "service already running");
                continue;
            }
            debug!(parent: self.session.log(), service = %key, "requesting service");
            queue.push((key, info));
        }

        let require: Vec<&str> = queue.iter().map(|(key, _)| key.as_str()).collect();
        self.session.dispatch(start_event(&require));

        let poll = Poller {
            session: self.session.clone(),
            shared: Arc::clone(&self.shared),
            queue,
            timeout,
            poll: settings.poll,
        };
        tokio::spawn(poll.run().instrument(self.session.log().clone()));

        self.completion()
    }

    /// Convenience: [`load`](Self::load), wait for completion, return [`err`](Self::err).
    pub async fn wait(&self) -> Result<(), LoaderError> {
        self.load().wait().await;
        self.err()
    }

    /// Accumulated outcome of the finished load.
    ///
    /// Returns [`LoaderError::NotFinished`] unless the completion signal has fired.
    pub fn err(&self) -> Result<(), LoaderError> {
        let st = self.shared.state.lock();
        if st.phase != Phase::Done {
            return Err(LoaderError::NotFinished);
        }
        match LoaderError::join(st.errors.clone()) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn completion(&self) -> Completion {
        Completion {
            closed: self.shared.closed.clone(),
        }
    }

    fn cancel(&self, errors: Vec<LoaderError>) {
        cancel(self.session.log(), &self.shared, errors);
    }
}

fn cancel(span: &tracing::Span, shared: &Shared, errors: Vec<LoaderError>) {
    let reason = errors.last().map(|e| e.to_string()).unwrap_or_default();
    if shared.complete(errors) {
        warn!(parent: span, %reason, "service loader canceled");
    }
}

/// Start request carrying `service.N` → canonical address.
fn start_event(services: &[&str]) -> Event {
    let mut payload = Payload::new();
    let mut errs = Vec::new();
    for (i, addr) in services.iter().enumerate() {
        if let Err(e) = payload.store(format!("service.{i}"), *addr) {
            errs.push(e.to_string());
        }
    }
    if !errs.is_empty() {
        // "err" cannot collide with "service.N" keys.
        let _ = payload.store("err", errs.join("\n"));
    }
    START_SERVICES.create(format!("requested services ({})", services.len()), payload)
}

/// Background half of a load: owns the queue until completion.
struct Poller {
    session: Session,
    shared: Arc<Shared>,
    queue: Vec<(String, ServiceInfo)>,
    timeout: Duration,
    poll: PollPolicy,
}

impl Poller {
    async fn run(self) {
        // `sleep` saturates oversized timeouts instead of overflowing the clock.
        let deadline = sleep(self.timeout);
        tokio::pin!(deadline);
        let destroyed = self.session.token().clone();

        loop {
            tokio::select! {
                biased;

                _ = &mut deadline => {
                    warn!("loader deadline reached");
                    let mut errors: Vec<LoaderError> = self
                        .queue
                        .iter()
                        .filter(|(_, info)| !info.running())
                        .map(|(key, _)| LoaderError::NotLoadedOnTime { address: key.clone() })
                        .collect();
                    errors.push(LoaderError::DeadlineExceeded { timeout: self.timeout });
                    cancel(self.session.log(), &self.shared, errors);
                    return;
                }
                _ = destroyed.cancelled() => {
                    cancel(self.session.log(), &self.shared, vec![LoaderError::SessionDestroyed]);
                    return;
                }
                _ = sleep(self.poll.next_delay()) => {
                    if let Some(errors) = self.failures() {
                        cancel(self.session.log(), &self.shared, errors);
                        return;
                    }
                    if self.queue.iter().all(|(_, info)| info.running()) {
                        break;
                    }
                }
            }
        }

        if self.shared.complete(Vec::new()) {
            info!(services = self.queue.len(), "services loaded");
        }
    }

    /// Errors of every queued service that recorded any, followed by the summary.
    fn failures(&self) -> Option<Vec<LoaderError>> {
        let mut errors = Vec::new();
        let mut addresses = Vec::new();
        for (key, info) in &self.queue {
            let errs = info.errs();
            if errs.is_empty() {
                continue;
            }
            errors.extend(errs.into_iter().map(|(_, error)| LoaderError::Service {
                address: key.clone(),
                error,
            }));
            addresses.push(key.clone());
        }
        if addresses.is_empty() {
            return None;
        }
        errors.push(LoaderError::StartFailed { addresses });
        Some(errors)
    }
}
