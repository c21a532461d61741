//! `Target` domain: isolated contexts and flattened sessions.

use serde::{Deserialize, Serialize};

use crate::{Empty, Method};

/// `Target.createBrowserContext`, an incognito-like profile with its own
/// cookies, cache and emulation state.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBrowserContext {
    pub dispose_on_detach: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBrowserContextReturns {
    pub browser_context_id: String,
}

impl Method for CreateBrowserContext {
    const NAME: &'static str = "Target.createBrowserContext";
    type Returns = CreateBrowserContextReturns;
}

/// `Target.createTarget`
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTarget {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_context_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTargetReturns {
    pub target_id: String,
}

impl Method for CreateTarget {
    const NAME: &'static str = "Target.createTarget";
    type Returns = CreateTargetReturns;
}

/// `Target.attachToTarget`. With `flatten`, commands for the target are sent
/// over the browser socket tagged with the returned `sessionId`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachToTarget {
    pub target_id: String,
    pub flatten: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachToTargetReturns {
    pub session_id: String,
}

impl Method for AttachToTarget {
    const NAME: &'static str = "Target.attachToTarget";
    type Returns = AttachToTargetReturns;
}

/// `Target.closeTarget`
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseTarget {
    pub target_id: String,
}

impl Method for CloseTarget {
    const NAME: &'static str = "Target.closeTarget";
    type Returns = Empty;
}

/// `Target.disposeBrowserContext`
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisposeBrowserContext {
    pub browser_context_id: String,
}

impl Method for DisposeBrowserContext {
    const NAME: &'static str = "Target.disposeBrowserContext";
    type Returns = Empty;
}
