//! `Page` domain.

use serde::{Deserialize, Serialize};

use crate::{Empty, Method};

/// `Page.enable`
#[derive(Clone, Debug, Default, Serialize)]
pub struct Enable {}

impl Method for Enable {
    const NAME: &'static str = "Page.enable";
    type Returns = Empty;
}

/// `Page.setLifecycleEventsEnabled`
#[derive(Clone, Debug, Serialize)]
pub struct SetLifecycleEventsEnabled {
    pub enabled: bool,
}

impl Method for SetLifecycleEventsEnabled {
    const NAME: &'static str = "Page.setLifecycleEventsEnabled";
    type Returns = Empty;
}

/// `Page.navigate`
#[derive(Clone, Debug, Serialize)]
pub struct Navigate {
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateReturns {
    pub frame_id: String,
    #[serde(default)]
    pub loader_id: Option<String>,
    /// Set when the navigation itself failed (DNS, refused connection, ...).
    #[serde(default)]
    pub error_text: Option<String>,
}

impl Method for Navigate {
    const NAME: &'static str = "Page.navigate";
    type Returns = NavigateReturns;
}

/// Name of the lifecycle notification.
pub const LIFECYCLE_EVENT: &str = "Page.lifecycleEvent";

/// Payload of `Page.lifecycleEvent`.
///
/// Names seen in practice: `init`, `DOMContentLoaded`, `load`, `firstPaint`,
/// `firstContentfulPaint`, `firstMeaningfulPaintCandidate`,
/// `networkAlmostIdle`, `firstMeaningfulPaint`, `networkIdle`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    pub frame_id: String,
    #[serde(default)]
    pub loader_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub timestamp: f64,
}

/// Clip rectangle for screenshots, in CSS pixels.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub scale: f64,
}

/// `Page.captureScreenshot`
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureScreenshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip: Option<Viewport>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CaptureScreenshotReturns {
    /// Base64-encoded image bytes.
    pub data: String,
}

impl Method for CaptureScreenshot {
    const NAME: &'static str = "Page.captureScreenshot";
    type Returns = CaptureScreenshotReturns;
}
