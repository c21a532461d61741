//! Drive the engine page to a finished render.
//!
//! Strict order per page: enable lifecycle events, arm the subscription,
//! navigate, wait for network idle, evaluate the render call, then read the
//! sentinel element's attributes.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::browser::Surface;
use crate::cancel::Scope;
use crate::capture::CaptureError;
use crate::lifecycle::{self, NETWORK_IDLE};
use crate::params::RenderParams;

/// Engine entry page, relative to the static server root.
pub const ENGINE_PAGE: &str = "export3.html";

/// Element the engine adds once a render has completed.
pub const SENTINEL_SELECTOR: &str = "#LoadingComplete";

/// Attribute bundle of the sentinel element.
pub type RenderAttributes = HashMap<String, String>;

/// How often the sentinel is re-read while it or its `bounds` is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributePoll {
    pub retries: u32,
    pub interval: Duration,
}

/// Render `params` on a fresh page at `url` and return the sentinel's
/// attributes.
///
/// The returned map may lack `bounds` when the engine never produced it; the
/// caller decides what that means.
///
/// # Errors
///
/// Returns [`CaptureError`] on any protocol failure, a navigation error, a
/// lifecycle wait failure, or a script exception.
pub async fn render<S>(
    surface: &S,
    url: &str,
    params: &RenderParams,
    poll: AttributePoll,
    scope: &Scope,
) -> Result<RenderAttributes, CaptureError>
where
    S: Surface + ?Sized,
{
    surface.enable_lifecycle_events().await?;

    let subscription = lifecycle::subscribe(surface);
    let navigated = surface.navigate(url).await?;
    if let Some(error_text) = navigated.error_text.filter(|t| !t.is_empty()) {
        return Err(CaptureError::Navigation { url: url.to_owned(), error_text });
    }
    subscription.wait_for(NETWORK_IDLE, scope).await?;

    let statement = params.render_statement();
    debug!(page_id = %params.page_id, len = statement.len(), "evaluating render call");
    let returns = surface.evaluate(&statement).await?;
    if let Some(details) = returns.exception_details {
        return Err(CaptureError::Script(details.message()));
    }
    debug!(enabled = ?returns.result.value, "render call returned");

    read_sentinel(surface, poll).await
}

async fn read_sentinel<S>(surface: &S, poll: AttributePoll) -> Result<RenderAttributes, CaptureError>
where
    S: Surface + ?Sized,
{
    let mut attempt = 0;
    loop {
        match surface.attributes(SENTINEL_SELECTOR).await? {
            Some(attrs) if attrs.contains_key("bounds") => return Ok(attrs),
            attrs if attempt >= poll.retries => {
                debug!(attempts = attempt + 1, "sentinel incomplete after polling");
                return Ok(attrs.unwrap_or_default());
            }
            _ => {}
        }
        attempt += 1;
        tokio::time::sleep(poll.interval).await;
    }
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
