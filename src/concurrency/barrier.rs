//! Completion barrier
//!
//! The pending counter is the only mutable state shared between pull tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct BarrierState {
    pending: AtomicUsize,
    notify: Notify,
}

impl BarrierState {
    fn complete_one(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.notify.notify_waiters();
        }
    }
}

/// Releases [`CompletionBarrier::wait`] once every issued signal has fired
#[derive(Debug, Clone, Default)]
pub struct CompletionBarrier {
    state: Arc<BarrierState>,
}

impl CompletionBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one more outstanding task and return its signal
    pub fn add(&self) -> CompletionSignal {
        self.state.pending.fetch_add(1, Ordering::AcqRel);
        CompletionSignal {
            state: Some(Arc::clone(&self.state)),
        }
    }

    /// Number of signals that have not fired yet
    pub fn pending(&self) -> usize {
        self.state.pending.load(Ordering::Acquire)
    }

    /// Wait until no signal is outstanding
    pub async fn wait(&self) {
        loop {
            let notified = self.state.notify.notified();
            tokio::pin!(notified);
            // Register before checking, otherwise the final notify could be missed.
            notified.as_mut().enable();

            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// One task's completion signal. Fires exactly once: on [`done`](Self::done)
/// or, failing that, when dropped.
#[derive(Debug)]
pub struct CompletionSignal {
    state: Option<Arc<BarrierState>>,
}

impl CompletionSignal {
    pub fn done(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        if let Some(state) = self.state.take() {
            state.complete_one();
        }
    }
}

impl Drop for CompletionSignal {
    fn drop(&mut self) {
        self.fire();
    }
}
