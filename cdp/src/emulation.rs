//! `Emulation` domain.

use serde::Serialize;

use crate::{Empty, Method};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OrientationType {
    PortraitPrimary,
    PortraitSecondary,
    LandscapePrimary,
    LandscapeSecondary,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScreenOrientation {
    #[serde(rename = "type")]
    pub kind: OrientationType,
    pub angle: i64,
}

/// `Emulation.setDeviceMetricsOverride`
///
/// The override sticks to the target until cleared or the target is closed.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDeviceMetricsOverride {
    pub width: i64,
    pub height: i64,
    pub device_scale_factor: f64,
    pub mobile: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_orientation: Option<ScreenOrientation>,
}

impl Method for SetDeviceMetricsOverride {
    const NAME: &'static str = "Emulation.setDeviceMetricsOverride";
    type Returns = Empty;
}
