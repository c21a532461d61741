//! Browser transport: the remote rendering surface behind a trait seam.
//!
//! ARCHITECTURE
//! ============
//! - `connection`: one DevTools WebSocket with request/response correlation
//!   and event fan-out.
//! - `launcher`: starts a headless Chromium (or attaches to a running one)
//!   and hands out sessions.
//! - `session`: one isolated browser context + page target per capture.
//!
//! The capture pipeline only sees [`Surface`] and [`SessionFactory`], so it
//! can be exercised against an in-memory surface in tests.

pub mod connection;
pub mod launcher;
pub mod session;

#[cfg(test)]
pub(crate) mod mock;

use std::collections::HashMap;
use std::path::PathBuf;

use cdp::emulation::SetDeviceMetricsOverride;
use cdp::page::{LIFECYCLE_EVENT, LifecycleEvent, NavigateReturns, Viewport};
use cdp::runtime::EvaluateReturns;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

pub use launcher::{Browser, BrowserConfig};
pub use session::CdpSession;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("no Chromium executable found; pass --browser or set DRAWIO_EXPORT_BROWSER")]
    ExecutableNotFound,
    #[error("failed to launch {}: {source}", path.display())]
    Launch { path: PathBuf, source: std::io::Error },
    #[error("browser exited before announcing its DevTools endpoint")]
    LaunchEnded,
    #[error("timed out waiting for the browser DevTools endpoint")]
    LaunchTimeout,
    #[error("DevTools endpoint discovery failed: {0}")]
    Discovery(#[from] reqwest::Error),
    #[error("websocket connect failed: {0}")]
    WsConnect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed")]
    WsClosed,
    #[error("protocol message decode failed: {0}")]
    Codec(#[from] cdp::CodecError),
    #[error("timed out waiting for {method}")]
    Timeout { method: &'static str },
    #[error("{method} failed: {message} ({code})")]
    Protocol { method: &'static str, code: i64, message: String },
    #[error("script threw: {0}")]
    Script(String),
    #[error("screenshot payload is not valid base64: {0}")]
    ScreenshotDecode(#[from] base64::DecodeError),
}

// =============================================================================
// EVENT STREAM
// =============================================================================

/// A live subscription to one session's lifecycle notifications.
///
/// Dropping the stream unsubscribes. Events emitted before the stream was
/// created are never replayed.
pub struct EventStream {
    rx: broadcast::Receiver<cdp::Event>,
    session_id: Option<String>,
}

impl EventStream {
    /// Wrap a broadcast receiver, keeping only events for `session_id`
    /// (or all events when `None`).
    #[must_use]
    pub fn new(rx: broadcast::Receiver<cdp::Event>, session_id: Option<String>) -> Self {
        Self { rx, session_id }
    }

    /// Next lifecycle event, or `None` once the underlying transport is gone.
    pub async fn next_lifecycle(&mut self) -> Option<LifecycleEvent> {
        loop {
            let event = match self.rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event stream lagged; lifecycle events dropped");
                    continue;
                }
                Err(RecvError::Closed) => return None,
            };

            if event.method != LIFECYCLE_EVENT {
                continue;
            }
            if self.session_id.is_some() && event.session_id != self.session_id {
                continue;
            }
            match event.parse::<LifecycleEvent>() {
                Ok(lifecycle) => return Some(lifecycle),
                Err(e) => debug!(error = %e, "ignoring malformed lifecycle event"),
            }
        }
    }
}

// =============================================================================
// SEAMS
// =============================================================================

/// The action primitives the capture pipeline issues against one page.
#[async_trait::async_trait]
pub trait Surface: Send + Sync {
    /// Enable page events, then lifecycle events.
    async fn enable_lifecycle_events(&self) -> Result<(), BrowserError>;

    /// Start receiving lifecycle events from this point on.
    fn subscribe(&self) -> EventStream;

    async fn navigate(&self, url: &str) -> Result<NavigateReturns, BrowserError>;

    /// Evaluate `expression` and return its value by value. The expression
    /// must produce a small, shallow result.
    async fn evaluate(&self, expression: &str) -> Result<EvaluateReturns, BrowserError>;

    /// All attributes of the first element matching `selector`, or `None`
    /// when nothing matches.
    async fn attributes(&self, selector: &str) -> Result<Option<HashMap<String, String>>, BrowserError>;

    async fn set_device_metrics(&self, metrics: &SetDeviceMetricsOverride) -> Result<(), BrowserError>;

    /// Capture `clip` and return the decoded image bytes.
    async fn capture_screenshot(&self, clip: &Viewport) -> Result<Vec<u8>, BrowserError>;

    /// Tear the session down. The surface must not be used afterwards.
    async fn close(&self) -> Result<(), BrowserError>;
}

/// Hands out a fresh, isolated [`Surface`] per capture.
#[async_trait::async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: Surface;

    async fn open(&self) -> Result<Self::Session, BrowserError>;
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
