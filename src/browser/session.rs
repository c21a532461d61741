//! One page target inside its own browser context.

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cdp::emulation::SetDeviceMetricsOverride;
use cdp::page::{self, CaptureScreenshot, Navigate, NavigateReturns, SetLifecycleEventsEnabled, Viewport};
use cdp::runtime::{Evaluate, EvaluateReturns};
use cdp::target::{AttachToTarget, CloseTarget, CreateBrowserContext, CreateTarget, DisposeBrowserContext};
use tracing::debug;

use super::connection::Connection;
use super::{BrowserError, EventStream, Surface};

/// A flattened session on a fresh `about:blank` target. Cookies, cache and
/// emulation state die with the browser context on [`Surface::close`].
pub struct CdpSession {
    connection: Arc<Connection>,
    session_id: String,
    target_id: String,
    browser_context_id: String,
}

impl CdpSession {
    /// Create a browser context and a page target in it, then attach.
    ///
    /// # Errors
    ///
    /// Returns the failing `Target.*` call's error. A context created before
    /// the failure is disposed.
    pub async fn open(connection: Arc<Connection>) -> Result<Self, BrowserError> {
        let context = connection
            .call(&CreateBrowserContext { dispose_on_detach: true }, None)
            .await?
            .browser_context_id;

        let attached = async {
            let target_id = connection
                .call(
                    &CreateTarget { url: "about:blank".into(), browser_context_id: Some(context.clone()) },
                    None,
                )
                .await?
                .target_id;
            let session_id = connection
                .call(&AttachToTarget { target_id: target_id.clone(), flatten: true }, None)
                .await?
                .session_id;
            Ok::<_, BrowserError>((target_id, session_id))
        }
        .await;

        match attached {
            Ok((target_id, session_id)) => {
                debug!(%session_id, %target_id, browser_context_id = %context, "session opened");
                Ok(Self { connection, session_id, target_id, browser_context_id: context })
            }
            Err(e) => {
                let _ = connection.call(&DisposeBrowserContext { browser_context_id: context }, None).await;
                Err(e)
            }
        }
    }
}

/// Expression returning every attribute of the first element matching the
/// JSON-encoded selector as a flat object, or `null`.
fn attributes_expression(selector: &str) -> String {
    let quoted = serde_json::Value::String(selector.to_owned());
    format!(
        "(() => {{ const el = document.querySelector({quoted}); if (!el) return null; \
         const out = {{}}; for (const a of el.attributes) out[a.name] = a.value; return out; }})()"
    )
}

#[async_trait::async_trait]
impl Surface for CdpSession {
    async fn enable_lifecycle_events(&self) -> Result<(), BrowserError> {
        let session = Some(self.session_id.as_str());
        self.connection.call(&page::Enable {}, session).await?;
        self.connection.call(&SetLifecycleEventsEnabled { enabled: true }, session).await?;
        Ok(())
    }

    fn subscribe(&self) -> EventStream {
        EventStream::new(self.connection.subscribe(), Some(self.session_id.clone()))
    }

    async fn navigate(&self, url: &str) -> Result<NavigateReturns, BrowserError> {
        self.connection.call(&Navigate { url: url.to_owned() }, Some(&self.session_id)).await
    }

    async fn evaluate(&self, expression: &str) -> Result<EvaluateReturns, BrowserError> {
        let params = Evaluate { expression: expression.to_owned(), return_by_value: true, await_promise: false };
        self.connection.call(&params, Some(&self.session_id)).await
    }

    async fn attributes(&self, selector: &str) -> Result<Option<HashMap<String, String>>, BrowserError> {
        let returns = self.evaluate(&attributes_expression(selector)).await?;
        if let Some(details) = returns.exception_details {
            return Err(BrowserError::Script(details.message()));
        }
        match returns.result.value {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value).map_err(cdp::CodecError::from)?)),
        }
    }

    async fn set_device_metrics(&self, metrics: &SetDeviceMetricsOverride) -> Result<(), BrowserError> {
        self.connection.call(metrics, Some(&self.session_id)).await?;
        Ok(())
    }

    async fn capture_screenshot(&self, clip: &Viewport) -> Result<Vec<u8>, BrowserError> {
        // Always PNG: an svg export is a raster of the rendered region too.
        let params = CaptureScreenshot { format: Some("png".into()), clip: Some(clip.clone()) };
        let returns = self.connection.call(&params, Some(&self.session_id)).await?;
        Ok(STANDARD.decode(returns.data)?)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let closed = self
            .connection
            .call(&CloseTarget { target_id: self.target_id.clone() }, None)
            .await;
        let disposed = self
            .connection
            .call(&DisposeBrowserContext { browser_context_id: self.browser_context_id.clone() }, None)
            .await;
        closed?;
        disposed?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
