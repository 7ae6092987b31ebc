use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info_span, warn};

use crate::error::SessionError;
use crate::events::{Bus, Event};
use crate::services::ServiceRef;
use crate::settings::{APP_ADDRESS, Settings, Value};
use crate::subscribers::{Subscribe, SubscriberSet};

use super::registry::{self, Registry};
use super::{Inner, Session, SessionConfig, SubscriberListener};

/// Builder for constructing a [`Session`] with settings, subscribers and services.
pub struct SessionBuilder {
    cfg: SessionConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    settings: Vec<(String, Value)>,
    services: Vec<(String, ServiceRef)>,
}

impl SessionBuilder {
    pub fn new(cfg: SessionConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            settings: Vec::new(),
            services: Vec::new(),
        }
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive every dispatched event through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Overrides a setting; applied after the defaults.
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.push((key.into(), value.into()));
        self
    }

    /// Registers a service at `path` (relative to the host address) during [`build`](Self::build).
    pub fn with_service(mut self, path: impl Into<String>, service: ServiceRef) -> Self {
        self.services.push((path.into(), service));
        self
    }

    /// Builds the session and spawns its background listeners.
    ///
    /// Must be called within a tokio runtime. Fails if a service cannot be registered.
    pub fn build(self) -> Result<Session, SessionError> {
        let settings = Settings::with_defaults();
        settings.set(APP_ADDRESS, self.cfg.address.as_str());
        for (key, value) in self.settings {
            settings.set(key, value);
        }

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let span = info_span!("session", host = %self.cfg.address);
        let subscribers = (!self.subscribers.is_empty()).then(|| {
            subscriber_listener(
                bus.subscribe(),
                SubscriberSet::new(self.subscribers),
                span.clone(),
            )
        });

        let session = Session {
            inner: Arc::new(Inner {
                cfg: self.cfg,
                settings,
                bus,
                registry: Registry::new(),
                token: CancellationToken::new(),
                span,
                subscribers: Mutex::new(subscribers),
            }),
        };

        registry::spawn_listener(session.clone());

        for (path, service) in self.services {
            session.register(&path, service)?;
        }
        Ok(session)
    }
}

/// Forwards bus events to the subscriber set.
///
/// Once `close` is cancelled the listener forwards what is still buffered on the
/// bus, then waits for the subscriber queues to empty.
fn subscriber_listener(
    mut rx: broadcast::Receiver<Event>,
    set: SubscriberSet,
    span: Span,
) -> SubscriberListener {
    let close = CancellationToken::new();
    let closing = close.clone();
    let join = tokio::spawn(
        async move {
            loop {
                tokio::select! {
                    biased;
                    msg = rx.recv() => match msg {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "subscriber listener lagged behind the bus");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = closing.cancelled() => {
                        loop {
                            match rx.try_recv() {
                                Ok(ev) => set.emit(&ev),
                                Err(TryRecvError::Lagged(skipped)) => {
                                    warn!(skipped, "subscriber listener lagged behind the bus");
                                }
                                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                            }
                        }
                        break;
                    }
                }
            }
            set.drain().await;
            debug!("subscribers drained");
        }
        .instrument(span),
    );
    SubscriberListener { close, join }
}
