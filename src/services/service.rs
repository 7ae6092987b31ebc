//! # Service abstraction and closure-backed implementation.
//!
//! A [`Service`] is a named unit with a three-phase lifecycle driven by the session's
//! service manager:
//!
//! ```text
//! start(&Session) ──► run(&Session, token) ──► stop(&Session)
//!   (readiness)        (until token fires)      (teardown)
//! ```
//!
//! The service is reported as running as soon as `start` returns `Ok`.
//! [`ServiceRef`] (`Arc<dyn Service>`) is the handle stored in the registry.

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;
use crate::session::Session;

/// Shared handle to a service.
pub type ServiceRef = Arc<dyn Service>;

/// # Asynchronous, session-bound service.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use servicevisor::{Service, ServiceError, Session};
///
/// struct Cache;
///
/// #[async_trait]
/// impl Service for Cache {
///     fn name(&self) -> &str { "cache" }
///
///     async fn start(&self, _session: &Session) -> Result<(), ServiceError> {
///         // open connections, warm up...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Returns a stable, human-readable service name.
    fn name(&self) -> &str;

    /// Brings the service up. The service counts as running once this returns `Ok`.
    async fn start(&self, session: &Session) -> Result<(), ServiceError>;

    /// Serves until `ctx` is cancelled. An `Err` marks the service as failed.
    async fn run(&self, _session: &Session, ctx: CancellationToken) -> Result<(), ServiceError> {
        ctx.cancelled().await;
        Ok(())
    }

    /// Releases resources after `run` returned.
    async fn stop(&self, _session: &Session) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// Closure-backed service: `F: Fn(Session) -> Fut` is its `start` phase.
///
/// ```
/// use servicevisor::{ServiceError, ServiceFn, ServiceRef, Session};
///
/// let svc: ServiceRef = ServiceFn::arc("db", |_session: Session| async {
///     Ok::<_, ServiceError>(())
/// });
/// assert_eq!(svc.name(), "db");
/// ```
#[derive(Debug)]
pub struct ServiceFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> ServiceFn<F> {
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Service for ServiceFn<F>
where
    F: Fn(Session) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ServiceError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, session: &Session) -> Result<(), ServiceError> {
        (self.f)(session.clone()).await
    }
}
