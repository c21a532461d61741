//! Waiting for a named page lifecycle event.
//!
//! The subscription must exist before the navigation that triggers the event,
//! so arming and waiting are separate steps. Ordering against navigation is
//! heuristic: a same-named event from the initial `about:blank` load can
//! satisfy the wait.

use tracing::debug;

use crate::browser::{EventStream, Surface};
use crate::cancel::{CancelReason, Scope};

/// Name of the lifecycle event that marks the engine page as settled.
pub const NETWORK_IDLE: &str = "networkIdle";

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("cancelled while waiting for {0}")]
    Cancelled(String),
    #[error("deadline exceeded while waiting for {0}")]
    DeadlineExceeded(String),
    #[error("event stream closed while waiting for {0}")]
    StreamClosed(String),
}

/// An armed lifecycle subscription. Dropping it unsubscribes.
pub struct Subscription {
    events: EventStream,
}

/// Start listening for lifecycle events on `surface`.
#[must_use]
pub fn subscribe<S: Surface + ?Sized>(surface: &S) -> Subscription {
    Subscription { events: surface.subscribe() }
}

impl Subscription {
    /// Block until an event named `name` arrives, consuming the subscription.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] if `scope` fires or the stream ends first.
    pub async fn wait_for(mut self, name: &str, scope: &Scope) -> Result<(), LifecycleError> {
        let matched = async {
            while let Some(event) = self.events.next_lifecycle().await {
                debug!(event = %event.name, frame = %event.frame_id, "lifecycle event");
                if event.name == name {
                    return true;
                }
            }
            false
        };

        tokio::select! {
            found = matched => {
                if found {
                    Ok(())
                } else {
                    Err(LifecycleError::StreamClosed(name.to_owned()))
                }
            }
            reason = scope.cancelled() => Err(match reason {
                CancelReason::Cancelled => LifecycleError::Cancelled(name.to_owned()),
                CancelReason::DeadlineExceeded => LifecycleError::DeadlineExceeded(name.to_owned()),
            }),
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_test.rs"]
mod tests;
