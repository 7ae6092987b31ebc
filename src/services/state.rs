//! # Service lifecycle state and read-only status view.
//!
//! ```text
//!            begin_start          mark_running           begin_stop          mark_stopped
//! Pending ──────────────► Starting ───────────► Running ───────────► Stopping ───────────► Stopped
//!    ▲                      │  │                   │                                          │
//!    │                      │  └── begin_stop ─────┼──────────────► Stopping                  │
//!    │                      │                      │                                          │
//!    │                record_error           record_error                                     │
//!    │                      ▼                      ▼                                          │
//!    │                    Failed (absorbing; stop only clears `running`)                      │
//!    └──────────────────────────────── begin_start (restart) ◄───────────────────────────────┘
//! ```
//!
//! ## Rules
//! - Only the session's service manager drives transitions; everything else reads
//!   through [`ServiceInfo`].
//! - Errors are timestamped and accumulate for the lifetime of the service.
//! - Recording an error does not clear `running`: a service that reached `Running`
//!   keeps reporting `running() == true` until it is stopped.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::address::Address;
use crate::error::{ServiceError, TransitionError};

/// Lifecycle state of a service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceState {
    Pending,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Pending => "pending",
            ServiceState::Starting => "starting",
            ServiceState::Running => "running",
            ServiceState::Stopping => "stopping",
            ServiceState::Stopped => "stopped",
            ServiceState::Failed => "failed",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct Status {
    state: ServiceState,
    running: bool,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
    errs: Vec<(DateTime<Utc>, ServiceError)>,
}

#[derive(Debug)]
struct Meta {
    name: String,
    addr: Address,
}

/// Read-only, cheaply cloneable view of a registered service.
///
/// Every clone observes the same live status.
#[derive(Clone, Debug)]
pub struct ServiceInfo {
    meta: Arc<Meta>,
    status: Arc<RwLock<Status>>,
}

impl ServiceInfo {
    pub(crate) fn new(name: impl Into<String>, addr: Address) -> Self {
        Self {
            meta: Arc::new(Meta {
                name: name.into(),
                addr,
            }),
            status: Arc::new(RwLock::new(Status {
                state: ServiceState::Pending,
                running: false,
                started_at: None,
                stopped_at: None,
                errs: Vec::new(),
            })),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    #[inline]
    pub fn addr(&self) -> &Address {
        &self.meta.addr
    }

    pub fn state(&self) -> ServiceState {
        self.status.read().state
    }

    pub fn running(&self) -> bool {
        self.status.read().running
    }

    /// When the service last reached `Running`.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.status.read().started_at
    }

    /// When the service last stopped; `None` while it has not stopped since its last start.
    pub fn stopped_at(&self) -> Option<DateTime<Utc>> {
        self.status.read().stopped_at
    }

    /// True once any error has been recorded.
    pub fn failed(&self) -> bool {
        !self.status.read().errs.is_empty()
    }

    /// Recorded errors, oldest first.
    pub fn errs(&self) -> Vec<(DateTime<Utc>, ServiceError)> {
        self.status.read().errs.clone()
    }

    // ---------------------------
    // Transitions (service manager only)
    // ---------------------------

    pub(crate) fn begin_start(&self) -> Result<(), TransitionError> {
        let mut st = self.status.write();
        match st.state {
            ServiceState::Pending | ServiceState::Stopped => {
                st.state = ServiceState::Starting;
                st.stopped_at = None;
                Ok(())
            }
            from => Err(self.illegal(from, ServiceState::Starting)),
        }
    }

    pub(crate) fn mark_running(&self) -> Result<(), TransitionError> {
        let mut st = self.status.write();
        match st.state {
            ServiceState::Starting => {
                st.state = ServiceState::Running;
                st.running = true;
                st.started_at = Some(Utc::now());
                Ok(())
            }
            from => Err(self.illegal(from, ServiceState::Running)),
        }
    }

    pub(crate) fn begin_stop(&self) -> Result<(), TransitionError> {
        let mut st = self.status.write();
        match st.state {
            ServiceState::Starting | ServiceState::Running => {
                st.state = ServiceState::Stopping;
                Ok(())
            }
            ServiceState::Failed => Ok(()),
            from => Err(self.illegal(from, ServiceState::Stopping)),
        }
    }

    pub(crate) fn mark_stopped(&self) -> Result<(), TransitionError> {
        let mut st = self.status.write();
        match st.state {
            ServiceState::Stopping | ServiceState::Failed => {
                if st.state == ServiceState::Stopping {
                    st.state = ServiceState::Stopped;
                }
                st.running = false;
                st.stopped_at = Some(Utc::now());
                Ok(())
            }
            from => Err(self.illegal(from, ServiceState::Stopped)),
        }
    }

    /// Records an error; an active service moves to `Failed`.
    pub(crate) fn record_error(&self, err: ServiceError) {
        let mut st = self.status.write();
        st.errs.push((Utc::now(), err));
        if matches!(
            st.state,
            ServiceState::Starting | ServiceState::Running | ServiceState::Stopping
        ) {
            st.state = ServiceState::Failed;
        }
    }

    fn illegal(&self, from: ServiceState, to: ServiceState) -> TransitionError {
        TransitionError {
            service: self.meta.addr.to_string(),
            from,
            to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> ServiceInfo {
        let addr = Address::parse("svc://localhost/app/db").unwrap();
        ServiceInfo::new("db", addr)
    }

    #[test]
    fn happy_path() {
        let s = info();
        assert_eq!(s.state(), ServiceState::Pending);
        assert!(!s.running());

        s.begin_start().unwrap();
        assert!(!s.running());
        s.mark_running().unwrap();
        assert!(s.running());
        assert!(s.started_at().is_some());
        assert!(s.stopped_at().is_none());

        s.begin_stop().unwrap();
        s.mark_stopped().unwrap();
        assert_eq!(s.state(), ServiceState::Stopped);
        assert!(!s.running());
        assert!(s.stopped_at().is_some());
        assert!(!s.failed());
    }

    #[test]
    fn restart_clears_stopped_at() {
        let s = info();
        s.begin_start().unwrap();
        s.mark_running().unwrap();
        s.begin_stop().unwrap();
        s.mark_stopped().unwrap();
        s.begin_start().unwrap();
        assert!(s.stopped_at().is_none());
    }

    #[test]
    fn error_while_starting_fails_service() {
        let s = info();
        s.begin_start().unwrap();
        s.record_error(ServiceError::fail("boom"));
        assert_eq!(s.state(), ServiceState::Failed);
        assert!(s.failed());
        assert!(!s.running());
        assert!(s.mark_running().is_err());
        assert!(s.begin_start().is_err());
    }

    #[test]
    fn error_after_running_keeps_running_flag() {
        let s = info();
        s.begin_start().unwrap();
        s.mark_running().unwrap();
        s.record_error(ServiceError::fail("first"));
        s.record_error(ServiceError::fail("second"));
        assert_eq!(s.state(), ServiceState::Failed);
        assert!(s.running());

        let errs = s.errs();
        assert_eq!(errs.len(), 2);
        assert!(errs[0].0 <= errs[1].0);
        assert_eq!(errs[1].1, ServiceError::fail("second"));

        s.begin_stop().unwrap();
        s.mark_stopped().unwrap();
        assert_eq!(s.state(), ServiceState::Failed);
        assert!(!s.running());
    }

    #[test]
    fn illegal_transitions_are_reported() {
        let s = info();
        let err = s.mark_running().unwrap_err();
        assert_eq!(err.from, ServiceState::Pending);
        assert_eq!(err.to, ServiceState::Running);
        assert!(s.begin_stop().is_err());
        assert!(s.mark_stopped().is_err());
    }

    #[test]
    fn clones_share_status() {
        let a = info();
        let b = a.clone();
        a.begin_start().unwrap();
        a.mark_running().unwrap();
        assert!(b.running());
    }
}
