//! In-memory surfaces for pipeline tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use cdp::emulation::SetDeviceMetricsOverride;
use cdp::page::{LIFECYCLE_EVENT, NavigateReturns, Viewport};
use cdp::runtime::{EvaluateReturns, ExceptionDetails, RemoteObject};
use serde_json::json;
use tokio::sync::broadcast;

use super::{BrowserError, EventStream, SessionFactory, Surface};

/// One protocol action issued against a mock surface.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Open,
    EnableLifecycle,
    Navigate(String),
    Evaluate(String),
    Attributes(String),
    SetDeviceMetrics(SetDeviceMetricsOverride),
    CaptureScreenshot(Viewport),
    Close,
}

pub type ActionLog = Arc<Mutex<Vec<Action>>>;

/// Scripted behavior of one page session.
#[derive(Debug, Clone)]
pub struct PageScript {
    pub fail_open: bool,
    pub fail_enable: bool,
    pub navigate_error: Option<String>,
    /// Lifecycle event names emitted when `navigate` is called.
    pub lifecycle: Vec<&'static str>,
    pub script_exception: Option<String>,
    /// Successive attribute reads; the last entry repeats.
    pub attributes: Vec<Option<HashMap<String, String>>>,
    pub screenshot: Vec<u8>,
    pub fail_screenshot: bool,
    pub fail_close: bool,
}

impl Default for PageScript {
    fn default() -> Self {
        Self {
            fail_open: false,
            fail_enable: false,
            navigate_error: None,
            lifecycle: vec!["init", "DOMContentLoaded", "load", "networkIdle"],
            script_exception: None,
            attributes: vec![Some(attrs(r#"{"x":0,"y":0,"width":800,"height":600}"#, "1"))],
            screenshot: b"\x89PNG\r\n\x1a\nfake".to_vec(),
            fail_screenshot: false,
            fail_close: false,
        }
    }
}

/// Sentinel attributes with the given `bounds` JSON and `scale`.
pub fn attrs(bounds: &str, scale: &str) -> HashMap<String, String> {
    HashMap::from([
        ("id".to_owned(), "LoadingComplete".to_owned()),
        ("bounds".to_owned(), bounds.to_owned()),
        ("scale".to_owned(), scale.to_owned()),
    ])
}

pub struct MockSurface {
    script: PageScript,
    reads: Mutex<usize>,
    events: broadcast::Sender<cdp::Event>,
    log: ActionLog,
}

impl MockSurface {
    pub fn new(script: PageScript, log: ActionLog) -> Self {
        let (events, _) = broadcast::channel(32);
        Self { script, reads: Mutex::new(0), events, log }
    }

    fn record(&self, action: Action) {
        self.log.lock().unwrap().push(action);
    }
}

fn protocol_error(method: &'static str, message: &str) -> BrowserError {
    BrowserError::Protocol { method, code: -32000, message: message.to_owned() }
}

#[async_trait::async_trait]
impl Surface for MockSurface {
    async fn enable_lifecycle_events(&self) -> Result<(), BrowserError> {
        self.record(Action::EnableLifecycle);
        if self.script.fail_enable {
            return Err(protocol_error("Page.enable", "target crashed"));
        }
        Ok(())
    }

    fn subscribe(&self) -> EventStream {
        EventStream::new(self.events.subscribe(), None)
    }

    async fn navigate(&self, url: &str) -> Result<NavigateReturns, BrowserError> {
        self.record(Action::Navigate(url.to_owned()));
        for name in &self.script.lifecycle {
            let _ = self.events.send(cdp::Event {
                method: LIFECYCLE_EVENT.to_owned(),
                params: json!({ "frameId": "F", "loaderId": "L", "name": name, "timestamp": 0.0 }),
                session_id: None,
            });
        }
        Ok(NavigateReturns {
            frame_id: "F".into(),
            loader_id: Some("L".into()),
            error_text: self.script.navigate_error.clone(),
        })
    }

    async fn evaluate(&self, expression: &str) -> Result<EvaluateReturns, BrowserError> {
        self.record(Action::Evaluate(expression.to_owned()));
        let exception_details = self.script.script_exception.as_ref().map(|message| ExceptionDetails {
            text: "Uncaught".into(),
            exception: Some(RemoteObject {
                kind: "object".into(),
                description: Some(message.clone()),
                ..RemoteObject::default()
            }),
        });
        Ok(EvaluateReturns {
            result: RemoteObject { kind: "boolean".into(), value: Some(json!(true)), ..RemoteObject::default() },
            exception_details,
        })
    }

    async fn attributes(&self, selector: &str) -> Result<Option<HashMap<String, String>>, BrowserError> {
        self.record(Action::Attributes(selector.to_owned()));
        let mut reads = self.reads.lock().unwrap();
        let index = (*reads).min(self.script.attributes.len().saturating_sub(1));
        *reads += 1;
        Ok(self.script.attributes.get(index).cloned().flatten())
    }

    async fn set_device_metrics(&self, metrics: &SetDeviceMetricsOverride) -> Result<(), BrowserError> {
        self.record(Action::SetDeviceMetrics(metrics.clone()));
        Ok(())
    }

    async fn capture_screenshot(&self, clip: &Viewport) -> Result<Vec<u8>, BrowserError> {
        self.record(Action::CaptureScreenshot(clip.clone()));
        if self.script.fail_screenshot {
            return Err(protocol_error("Page.captureScreenshot", "Unable to capture screenshot"));
        }
        Ok(self.script.screenshot.clone())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.record(Action::Close);
        if self.script.fail_close {
            return Err(BrowserError::WsClosed);
        }
        Ok(())
    }
}

/// Hands out one scripted surface per `open`, in order. Runs out into
/// default scripts.
pub struct MockFactory {
    scripts: Mutex<VecDeque<PageScript>>,
    pub log: ActionLog,
}

impl MockFactory {
    pub fn new(scripts: Vec<PageScript>) -> Self {
        Self { scripts: Mutex::new(scripts.into()), log: Arc::default() }
    }

    pub fn actions(&self) -> Vec<Action> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SessionFactory for MockFactory {
    type Session = MockSurface;

    async fn open(&self) -> Result<MockSurface, BrowserError> {
        self.log.lock().unwrap().push(Action::Open);
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        if script.fail_open {
            return Err(protocol_error("Target.createTarget", "Failed to open a new tab"));
        }
        Ok(MockSurface::new(script, Arc::clone(&self.log)))
    }
}
