//! A minimal cancellation signal threaded through the executor and
//! orchestrator layers (spec §5).
//!
//! Deliberately not `tokio-util`'s `CancellationToken` — the workspace
//! already depends on `tokio`'s `sync` feature, and a one-shot `watch`
//! channel covers exactly what's needed here: "has cancellation been
//! requested yet", observable from any number of clones without an extra
//! dependency.

use tokio::sync::watch;

/// A cheaply-cloneable handle for observing (and, from one owner, raising) a
/// single cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, rx }
    }

    /// Raise the signal. Idempotent: cancelling twice is a no-op the second
    /// time.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    /// True once [`CancelToken::cancel`] has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Suspend until cancellation is raised. Used by poll loops (file lock
    /// contention, report discovery retries) so they unblock promptly
    /// instead of only checking at the top of their sleep.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        let _ = rx.changed().await;
    }
}
