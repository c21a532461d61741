//! Turn a finished render into image bytes.

use cdp::emulation::{OrientationType, ScreenOrientation, SetDeviceMetricsOverride};
use cdp::page::Viewport;
use serde::Deserialize;
use tracing::debug;

use crate::browser::{BrowserError, Surface};
use crate::cancel::Scope;
use crate::lifecycle::LifecycleError;
use crate::params::RenderParams;
use crate::render::{self, AttributePoll, RenderAttributes};

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("navigation to {url} failed: {error_text}")]
    Navigation { url: String, error_text: String },
    #[error("render call threw: {0}")]
    Script(String),
    #[error("sentinel has no bounds attribute")]
    MissingBounds,
    #[error("invalid bounds {raw:?}: {source}")]
    InvalidBounds { raw: String, source: serde_json::Error },
}

/// Rendered extent reported by the engine, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: i64,
    pub height: i64,
}

impl Bounds {
    /// Parse the `bounds` attribute of `attrs`.
    ///
    /// # Errors
    ///
    /// [`CaptureError::MissingBounds`] or [`CaptureError::InvalidBounds`].
    pub fn from_attributes(attrs: &RenderAttributes) -> Result<Self, CaptureError> {
        let raw = attrs.get("bounds").ok_or(CaptureError::MissingBounds)?;
        serde_json::from_str(raw).map_err(|source| CaptureError::InvalidBounds { raw: raw.clone(), source })
    }
}

/// Clip scale from the `scale` attribute. Anything unparsable is 1.0.
#[must_use]
pub fn clip_scale(attrs: &RenderAttributes) -> f64 {
    attrs.get("scale").and_then(|s| s.trim().parse().ok()).unwrap_or(1.0)
}

/// Resize the viewport to `attrs`' bounds and screenshot that region.
///
/// Bounds are parsed before any protocol call; a page without usable bounds
/// costs nothing further.
///
/// # Errors
///
/// Returns [`CaptureError`] on a bounds parse failure or a protocol failure.
pub async fn capture<S>(surface: &S, attrs: &RenderAttributes) -> Result<Vec<u8>, CaptureError>
where
    S: Surface + ?Sized,
{
    let bounds = Bounds::from_attributes(attrs)?;
    debug!(?bounds, "parsed bounds");

    surface
        .set_device_metrics(&SetDeviceMetricsOverride {
            width: bounds.width,
            height: bounds.height,
            device_scale_factor: 1.0,
            mobile: false,
            screen_orientation: Some(ScreenOrientation { kind: OrientationType::PortraitPrimary, angle: 0 }),
        })
        .await?;

    let scale = clip_scale(attrs);
    debug!(scale, "clip scale");

    #[allow(clippy::cast_precision_loss)]
    let clip = Viewport {
        x: bounds.x,
        y: bounds.y,
        width: bounds.width as f64,
        height: bounds.height as f64,
        scale,
    };
    Ok(surface.capture_screenshot(&clip).await?)
}

/// Render then capture one page.
///
/// # Errors
///
/// Returns the first [`CaptureError`] from either stage.
pub async fn capture_page<S>(
    surface: &S,
    url: &str,
    params: &RenderParams,
    poll: AttributePoll,
    scope: &Scope,
) -> Result<Vec<u8>, CaptureError>
where
    S: Surface + ?Sized,
{
    let attrs = render::render(surface, url, params, poll, scope).await?;
    capture(surface, &attrs).await
}

#[cfg(test)]
#[path = "capture_test.rs"]
mod tests;
