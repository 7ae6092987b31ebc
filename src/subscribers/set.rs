//! # Per-subscriber delivery queues.
//!
//! The session forwards every bus event to [`SubscriberSet::emit`], which copies it
//! into one bounded queue per [`Subscribe`] implementation. A worker task per queue
//! awaits `on_event` so a slow subscriber never holds up the bus or its peers.
//!
//! ```text
//!   subscriber listener ─► emit(&Event) ─┬─► [queue "log-writer"] ─► worker ─► on_event()
//!                                        └─► [queue "metrics"]    ─► worker ─► on_event()
//! ```
//!
//! A full queue drops the event for that subscriber only. A panicking `on_event` is
//! logged and the worker moves on to the next event.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::events::Event;

use super::Subscribe;

struct Queue {
    subscriber: &'static str,
    tx: mpsc::Sender<Arc<Event>>,
}

/// Fan-out to subscriber workers.
pub struct SubscriberSet {
    queues: Vec<Queue>,
    workers: Vec<JoinHandle<()>>,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber. Must be called within a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let (queues, workers) = subs.into_iter().map(spawn_worker).unzip();
        Self { queues, workers }
    }

    /// Queues `event` for every subscriber without waiting.
    pub fn emit(&self, event: &Event) {
        if self.queues.is_empty() {
            return;
        }
        let ev = Arc::new(event.clone());
        for queue in &self.queues {
            let reason = match queue.tx.try_send(Arc::clone(&ev)) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "queue full",
                Err(TrySendError::Closed(_)) => "worker gone",
            };
            warn!(subscriber = queue.subscriber, seq = ev.seq(), reason, "event dropped");
        }
    }

    /// Closes every queue and waits until the workers processed what was queued.
    pub async fn drain(self) {
        drop(self.queues);
        for res in futures::future::join_all(self.workers).await {
            if let Err(e) = res {
                error!(error = %e, "subscriber worker aborted");
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queues.len()
    }
}

fn spawn_worker(sub: Arc<dyn Subscribe>) -> (Queue, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));
    let subscriber = sub.name();
    let worker = tokio::spawn(async move {
        while let Some(ev) = rx.recv().await {
            let handled = AssertUnwindSafe(sub.on_event(&ev)).catch_unwind().await;
            if handled.is_err() {
                error!(subscriber, seq = ev.seq(), "subscriber panicked");
            }
        }
    });
    (Queue { subscriber, tx }, worker)
}
