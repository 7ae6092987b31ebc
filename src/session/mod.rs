//! # Session: the shared context every service, loader and job runs in.
//!
//! A [`Session`] owns the event bus, the service registry, the settings store and the
//! logging span. It is a cheap `Clone` handle and is passed explicitly to every
//! operation that needs it.
//!
//! ## Architecture
//! ```text
//! SessionBuilder::build()
//!   ├─ Settings::with_defaults() + overrides (app.address from SessionConfig)
//!   ├─ Bus(bus_capacity)
//!   ├─ subscriber listener: Bus ─► SubscriberSet::emit(&Event)
//!   └─ service manager:     Bus ─► start/stop requests ─► Registry ─► run_service()
//!
//! Session::shutdown()
//!   └─► dispatch(shutdown.requested)
//!   └─► token.cancel()              → every service runner enters its stop phase
//!   └─► wait up to grace:
//!          ├─ all joined  → dispatch(shutdown.completed)
//!          └─ timeout     → dispatch(grace.exceeded), RuntimeError::GraceExceeded
//!   └─► subscribers get every event published so far, then their queues drain
//! ```
//!
//! ## Example
//! ```rust
//! use servicevisor::{ServiceError, ServiceFn, Session, SessionBuilder, SessionConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = SessionBuilder::new(SessionConfig::default())
//!         .with_setting("services.loader_timeout", "5s")
//!         .build()?;
//!
//!     session.register("db", ServiceFn::arc("db", |_s: Session| async { Ok::<_, ServiceError>(()) }))?;
//!     session.loader(["db"]).wait().await?;
//!     assert!(session.service_info("svc://localhost/app/db")?.running());
//!
//!     session.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod builder;
mod config;
mod registry;
mod runner;

pub use builder::SessionBuilder;
pub use config::{DEFAULT_ADDRESS, SessionConfig};

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, error, info, warn};

use crate::address::Address;
use crate::error::{RuntimeError, SessionError};
use crate::events::{
    Bus, Event, GRACE_EXCEEDED, Payload, SHUTDOWN_COMPLETED, SHUTDOWN_REQUESTED, START_SERVICES,
    STOP_SERVICES,
};
use crate::services::{ServiceInfo, ServiceLoader, ServiceRef};
use crate::settings::{APP_ADDRESS, Settings, Value};

use registry::{Registry, SERVICE_KEY_PREFIX};

struct Inner {
    cfg: SessionConfig,
    settings: Settings,
    bus: Bus,
    registry: Registry,
    token: CancellationToken,
    span: Span,
    subscribers: Mutex<Option<SubscriberListener>>,
}

/// Task forwarding bus events to the subscriber set.
struct SubscriberListener {
    close: CancellationToken,
    join: JoinHandle<()>,
}

/// Shared process context: settings, events, logging and the service registry.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    pub fn builder(cfg: SessionConfig) -> SessionBuilder {
        SessionBuilder::new(cfg)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.cfg
    }

    // ---------------------------
    // Settings
    // ---------------------------

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.settings.get(key)
    }

    /// Sets a value and returns the previous one.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.inner.settings.set(key, value)
    }

    /// Parses the `app.address` setting.
    pub fn host_address(&self) -> Result<Address, SessionError> {
        let raw = self.get(APP_ADDRESS).unwrap_or_default();
        Ok(Address::parse(raw.as_str())?.host_address())
    }

    // ---------------------------
    // Events and logging
    // ---------------------------

    /// Publishes an event; fire-and-forget.
    pub fn dispatch(&self, ev: Event) {
        debug!(parent: &self.inner.span, seq = ev.seq(), scope = ev.scope(), key = ev.key(), "dispatch");
        self.inner.bus.publish(ev);
    }

    /// Receiver for events dispatched from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }

    /// The session span; background work of the session is instrumented with it.
    pub fn log(&self) -> &Span {
        &self.inner.span
    }

    // ---------------------------
    // Services
    // ---------------------------

    /// Registers `service` at `path`, resolved against the host address.
    pub fn register(&self, path: &str, service: ServiceRef) -> Result<Address, SessionError> {
        if self.is_destroyed() {
            return Err(SessionError::Destroyed);
        }
        let addr = self.host_address()?.resolve_service(path)?;
        self.inner.registry.insert(addr.clone(), service)?;
        debug!(parent: &self.inner.span, service = %addr, "service registered");
        Ok(addr)
    }

    /// Status of the service with the given canonical address.
    pub fn service_info(&self, addr: &str) -> Result<ServiceInfo, SessionError> {
        self.inner.registry.info(addr)
    }

    /// Every registered service, sorted by address.
    pub fn services(&self) -> Vec<ServiceInfo> {
        self.inner.registry.infos()
    }

    /// Loader for `refs` against the `app.address` host.
    pub fn loader<I, S>(&self, refs: I) -> ServiceLoader
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let host = self.get(APP_ADDRESS).unwrap_or_default();
        ServiceLoader::new(self.clone(), host.as_str(), refs)
    }

    /// Dispatches a start request for `addrs` without waiting.
    pub fn start_services(&self, addrs: &[Address]) {
        self.dispatch(request(&START_SERVICES, addrs));
    }

    /// Dispatches a stop request for `addrs` without waiting.
    pub fn stop_services(&self, addrs: &[Address]) {
        self.dispatch(request(&STOP_SERVICES, addrs));
    }

    // ---------------------------
    // Lifecycle
    // ---------------------------

    /// Root token; cancelled once the session is torn down.
    pub fn token(&self) -> &CancellationToken {
        &self.inner.token
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Tears the session down: every service is stopped and awaited up to `grace`.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        info!(parent: &self.inner.span, "session shutdown requested");
        self.dispatch(SHUTDOWN_REQUESTED.create("shutdown requested", Payload::new()));
        self.inner.token.cancel();

        let grace = self.inner.cfg.grace;
        let mut runs = self.inner.registry.take_runs();
        let joined = tokio::time::timeout(
            grace,
            futures::future::join_all(runs.iter_mut().map(|(_, join)| join)),
        )
        .await;

        let res = match joined {
            Ok(results) => {
                for ((key, _), res) in runs.iter().zip(results) {
                    if let Err(e) = res {
                        error!(parent: &self.inner.span, service = %key, error = %e, "service runner panicked");
                    }
                }
                self.dispatch(SHUTDOWN_COMPLETED.create("all services stopped", Payload::new()));
                Ok(())
            }
            Err(_elapsed) => {
                let stuck: Vec<String> = runs
                    .iter()
                    .filter(|(_, join)| !join.is_finished())
                    .map(|(key, _)| key.clone())
                    .collect();
                warn!(parent: &self.inner.span, ?grace, ?stuck, "shutdown grace exceeded");
                self.dispatch(
                    GRACE_EXCEEDED
                        .create(format!("stuck services ({})", stuck.len()), Payload::new())
                        .with_error(format!("grace {grace:?} exceeded")),
                );
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        };

        self.drain_subscribers(grace).await;
        res
    }

    /// Lets subscribers see every event published so far, waiting at most `grace`.
    async fn drain_subscribers(&self, grace: std::time::Duration) {
        let listener = self.inner.subscribers.lock().take();
        let Some(listener) = listener else {
            return;
        };
        listener.close.cancel();
        match tokio::time::timeout(grace, listener.join).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(parent: &self.inner.span, error = %e, "subscriber listener panicked");
            }
            Err(_elapsed) => {
                warn!(parent: &self.inner.span, ?grace, "subscribers did not drain in time");
            }
        }
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.inner.registry
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.inner.cfg.address)
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

fn request(key: &crate::events::EventKey, addrs: &[Address]) -> Event {
    let mut payload = Payload::new();
    for (i, addr) in addrs.iter().enumerate() {
        // Keys are unique and non-empty.
        let _ = payload.store(format!("{SERVICE_KEY_PREFIX}{i}"), addr.to_string());
    }
    key.create(format!("requested services ({})", addrs.len()), payload)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::ServiceError;
    use crate::events::{SERVICE_FAILED, SERVICE_STARTED};
    use crate::services::{Service, ServiceFn, ServiceState};
    use crate::settings::START_TIMEOUT;

    fn ok_service(name: &'static str) -> ServiceRef {
        ServiceFn::arc(name, |_s: Session| async { Ok::<_, ServiceError>(()) })
    }

    async fn wait_for(cond: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn register_resolves_against_host() {
        let s = SessionBuilder::new(SessionConfig::with_address("svc://Node-1/app"))
            .build()
            .unwrap();
        let addr = s.register("cache/redis", ok_service("redis")).unwrap();
        assert_eq!(addr.to_string(), "svc://node-1/app/cache/redis");

        let info = s.service_info("svc://node-1/app/cache/redis").unwrap();
        assert_eq!(info.name(), "redis");
        assert_eq!(info.state(), ServiceState::Pending);

        assert_eq!(
            s.register("/cache/redis/", ok_service("again")),
            Err(SessionError::DuplicateService("svc://node-1/app/cache/redis".into()))
        );
        assert!(matches!(
            s.service_info("svc://node-1/app/nope"),
            Err(SessionError::ServiceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn start_and_stop_through_events() {
        let s = SessionBuilder::new(SessionConfig::default()).build().unwrap();
        let addr = s.register("db", ok_service("db")).unwrap();
        let mut rx = s.subscribe();

        s.start_services(std::slice::from_ref(&addr));
        let info = s.service_info(&addr.to_string()).unwrap();
        wait_for(|| info.running()).await;

        loop {
            let ev = rx.recv().await.unwrap();
            if ev.is(&SERVICE_STARTED) {
                assert_eq!(ev.value(), Some("svc://localhost/app/db"));
                break;
            }
        }

        s.stop_services(std::slice::from_ref(&addr));
        wait_for(|| info.state() == ServiceState::Stopped).await;
        assert!(!info.running());
        assert!(info.stopped_at().is_some());
    }

    #[tokio::test]
    async fn start_timeout_marks_service_failed() {
        let s = SessionBuilder::new(SessionConfig::default())
            .with_setting(START_TIMEOUT, "30ms")
            .build()
            .unwrap();
        let slow = ServiceFn::arc("slow", |_s: Session| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, ServiceError>(())
        });
        let addr = s.register("slow", slow).unwrap();
        let mut rx = s.subscribe();
        s.start_services(&[addr.clone()]);

        loop {
            let ev = rx.recv().await.unwrap();
            if ev.is(&SERVICE_FAILED) {
                assert!(ev.error().unwrap_or_default().contains("timed out"));
                break;
            }
        }
        let info = s.service_info(&addr.to_string()).unwrap();
        assert!(info.failed());
        assert!(matches!(info.errs()[0].1, ServiceError::Timeout { .. }));
    }

    struct Stubborn;

    #[async_trait::async_trait]
    impl Service for Stubborn {
        fn name(&self) -> &str {
            "stubborn"
        }
        async fn start(&self, _s: &Session) -> Result<(), ServiceError> {
            Ok(())
        }
        async fn stop(&self, _s: &Session) -> Result<(), ServiceError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn shutdown_reports_stuck_services() {
        let cfg = SessionConfig {
            grace: Duration::from_millis(50),
            ..SessionConfig::default()
        };
        let s = SessionBuilder::new(cfg)
            .with_service("stubborn", Arc::new(Stubborn))
            .with_service("db", ok_service("db"))
            .build()
            .unwrap();
        s.loader(["stubborn", "db"]).wait().await.unwrap();

        let err = s.shutdown().await.unwrap_err();
        assert_eq!(
            err,
            RuntimeError::GraceExceeded {
                grace: Duration::from_millis(50),
                stuck: vec!["svc://localhost/app/stubborn".into()],
            }
        );
        assert!(s.is_destroyed());
        assert_eq!(
            s.register("late", ok_service("late")),
            Err(SessionError::Destroyed)
        );
    }

    /// Records every event key, slowly.
    #[derive(Default)]
    struct Recorder(parking_lot::Mutex<Vec<String>>);

    #[async_trait::async_trait]
    impl crate::subscribers::Subscribe for Recorder {
        async fn on_event(&self, ev: &Event) {
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.0.lock().push(ev.key().to_string());
        }
        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[tokio::test]
    async fn shutdown_delivers_pending_events_to_subscribers() {
        let recorder = Arc::new(Recorder::default());
        let subs: Vec<Arc<dyn crate::subscribers::Subscribe>> = vec![recorder.clone()];
        let s = SessionBuilder::new(SessionConfig::default())
            .with_subscribers(subs)
            .with_service("db", ok_service("db"))
            .with_service("cache", ok_service("cache"))
            .build()
            .unwrap();
        s.loader(["db", "cache"]).wait().await.unwrap();
        s.shutdown().await.unwrap();

        let keys = recorder.0.lock().clone();
        assert_eq!(keys.last().map(String::as_str), Some(SHUTDOWN_COMPLETED.key));
        assert!(keys.iter().any(|k| k == SHUTDOWN_REQUESTED.key));
        assert_eq!(keys.iter().filter(|k| *k == SERVICE_STARTED.key).count(), 2);

        // A second shutdown has nothing left to drain.
        s.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn clean_shutdown() {
        let s = SessionBuilder::new(SessionConfig::default())
            .with_service("db", ok_service("db"))
            .build()
            .unwrap();
        s.loader(["db"]).wait().await.unwrap();
        s.shutdown().await.unwrap();
        let info = s.service_info("svc://localhost/app/db").unwrap();
        assert_eq!(info.state(), ServiceState::Stopped);
    }
}
