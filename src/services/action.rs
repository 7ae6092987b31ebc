//! Session-bound actions fired by the cron scheduler.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::ServiceError;
use crate::session::Session;

/// A cloneable async callback invoked with the session.
///
/// Each invocation produces a fresh future, so concurrent runs never share state
/// unless the closure captures an `Arc` explicitly.
#[derive(Clone)]
pub struct Action {
    f: Arc<dyn Fn(Session) -> BoxFuture<'static, Result<(), ServiceError>> + Send + Sync>,
}

impl Action {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Session) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ServiceError>> + Send + 'static,
    {
        Self {
            f: Arc::new(move |session| f(session).boxed()),
        }
    }

    pub fn call(&self, session: Session) -> BoxFuture<'static, Result<(), ServiceError>> {
        (self.f)(session)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Action")
    }
}
