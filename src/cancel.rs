//! Cancellation scopes for an export run.
//!
//! DESIGN
//! ======
//! A root scope is cancelled by Ctrl-C. Each page derives a child scope that
//! also carries a deadline. Only the lifecycle wait observes scopes; every
//! other protocol step is bounded by the transport's command timeout.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Why a scope fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The root scope was cancelled explicitly.
    Cancelled,
    /// The scope's deadline passed.
    DeadlineExceeded,
}

/// Owner side of a root scope. Dropping it does not cancel.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// A cheap, clonable view of a cancellation signal plus an optional deadline.
#[derive(Clone, Debug)]
pub struct Scope {
    rx: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

/// Create a root scope and the handle that cancels it.
#[must_use]
pub fn root() -> (CancelHandle, Scope) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, Scope { rx, deadline: None })
}

impl Scope {
    /// Derive a child scope that also expires after `timeout`. An earlier
    /// deadline inherited from `self` wins. A timeout too large to represent
    /// adds no deadline.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = match (self.deadline, Instant::now().checked_add(timeout)) {
            (Some(existing), Some(candidate)) => Some(existing.min(candidate)),
            (existing, candidate) => existing.or(candidate),
        };
        Self { rx: self.rx.clone(), deadline }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the scope is cancelled or its deadline passes.
    pub async fn cancelled(&self) -> CancelReason {
        let mut rx = self.rx.clone();
        let signal = async move {
            let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
            if closed {
                // Handle dropped without cancelling: only the deadline can fire.
                std::future::pending::<()>().await;
            }
        };

        match self.deadline {
            Some(deadline) => tokio::select! {
                () = signal => CancelReason::Cancelled,
                () = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
            },
            None => {
                signal.await;
                CancelReason::Cancelled
            }
        }
    }
}

#[cfg(test)]
#[path = "cancel_test.rs"]
mod tests;
