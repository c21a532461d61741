//! Browser process management and DevTools endpoint discovery.
//!
//! A run uses exactly one browser: either a headless Chromium launched here
//! with a throwaway profile, or an already running one reached through its
//! DevTools HTTP endpoint. Isolation between pages comes from per-session
//! browser contexts, not from separate processes.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tracing::{debug, info, warn};

use super::connection::Connection;
use super::session::CdpSession;
use super::{BrowserError, SessionFactory};

/// Executable names searched on `PATH`, in order.
const EXECUTABLE_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

const LAUNCH_ARGS: &[&str] = &[
    "--headless=new",
    "--remote-debugging-port=0",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-sync",
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-renderer-backgrounding",
    "--disable-popup-blocking",
    "--force-color-profile=srgb",
    "--hide-scrollbars",
    "--mute-audio",
];

const DEVTOOLS_BANNER: &str = "DevTools listening on ";
const CLOSE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Chromium executable; searched on `PATH` when `None`.
    pub executable: Option<PathBuf>,
    /// DevTools HTTP endpoint of a running browser. Takes precedence over
    /// launching.
    pub endpoint: Option<String>,
    /// Pass `--no-sandbox` (required when running as root in containers).
    pub no_sandbox: bool,
    pub command_timeout: Duration,
    pub launch_timeout: Duration,
}

struct BrowserProcess {
    child: Child,
    _profile: tempfile::TempDir,
}

/// A connected browser that hands out isolated sessions.
pub struct Browser {
    connection: Arc<Connection>,
    process: Option<BrowserProcess>,
}

impl Browser {
    /// Attach to `config.endpoint`, or launch a headless Chromium.
    ///
    /// # Errors
    ///
    /// Returns a [`BrowserError`] if no executable is found, the process
    /// fails to start or announce its endpoint in time, discovery fails, or
    /// the socket handshake fails.
    pub async fn start(config: &BrowserConfig) -> Result<Self, BrowserError> {
        if let Some(endpoint) = &config.endpoint {
            let ws_url = discover_ws_url(endpoint).await?;
            info!(%endpoint, "attaching to running browser");
            let connection = Connection::connect(&ws_url, config.command_timeout).await?;
            return Ok(Self { connection: Arc::new(connection), process: None });
        }

        let executable = resolve_executable(config.executable.as_deref())?;
        let launch_err = |source| BrowserError::Launch { path: executable.clone(), source };

        let profile = tempfile::Builder::new()
            .prefix("drawio-export-profile-")
            .tempdir()
            .map_err(launch_err)?;

        let mut command = Command::new(&executable);
        command
            .args(LAUNCH_ARGS)
            .arg(format!("--user-data-dir={}", profile.path().display()));
        if config.no_sandbox {
            command.arg("--no-sandbox");
        }
        let mut child = command
            .arg("about:blank")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(launch_err)?;
        info!(executable = %executable.display(), pid = child.id(), "launched browser");

        let stderr = child.stderr.take().ok_or(BrowserError::LaunchEnded)?;
        let ws_url = tokio::time::timeout(config.launch_timeout, read_devtools_url(stderr))
            .await
            .map_err(|_| BrowserError::LaunchTimeout)??;

        let connection = Connection::connect(&ws_url, config.command_timeout).await?;
        Ok(Self {
            connection: Arc::new(connection),
            process: Some(BrowserProcess { child, _profile: profile }),
        })
    }

    /// Close a launched browser and reap it. An attached browser is left
    /// running.
    pub async fn close(self) {
        let Some(mut process) = self.process else {
            return;
        };

        if let Err(e) = self.connection.call(&cdp::browser::Close {}, None).await {
            debug!(error = %e, "Browser.close failed; killing process");
        }
        match tokio::time::timeout(CLOSE_GRACE, process.child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "browser exited"),
            Ok(Err(e)) => warn!(error = %e, "failed to reap browser"),
            Err(_) => {
                warn!("browser did not exit in time; killing");
                let _ = process.child.kill().await;
            }
        }
    }
}

#[async_trait::async_trait]
impl SessionFactory for Browser {
    type Session = CdpSession;

    async fn open(&self) -> Result<CdpSession, BrowserError> {
        CdpSession::open(Arc::clone(&self.connection)).await
    }
}

// =============================================================================
// DISCOVERY
// =============================================================================

#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "Browser", default)]
    browser: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

/// Resolve the browser-level WebSocket URL for a DevTools endpoint.
/// `ws://` URLs are used as-is.
async fn discover_ws_url(endpoint: &str) -> Result<String, BrowserError> {
    if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
        return Ok(endpoint.to_owned());
    }

    let url = format!("{}/json/version", endpoint.trim_end_matches('/'));
    let info = reqwest::get(&url)
        .await?
        .error_for_status()?
        .json::<VersionInfo>()
        .await?;
    debug!(browser = %info.browser, ws_url = %info.web_socket_debugger_url, "discovered DevTools endpoint");
    Ok(info.web_socket_debugger_url)
}

fn resolve_executable(explicit: Option<&Path>) -> Result<PathBuf, BrowserError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let path_var = std::env::var_os("PATH").ok_or(BrowserError::ExecutableNotFound)?;
    find_executable(&path_var, EXECUTABLE_CANDIDATES).ok_or(BrowserError::ExecutableNotFound)
}

fn find_executable(path_var: &std::ffi::OsStr, names: &[&str]) -> Option<PathBuf> {
    names.iter().find_map(|name| {
        std::env::split_paths(path_var)
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

/// Read stderr until the DevTools banner, then keep draining it in the
/// background so the browser never blocks on a full pipe.
async fn read_devtools_url(stderr: ChildStderr) -> Result<String, BrowserError> {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(url) = parse_devtools_banner(&line) {
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(%line, "browser stderr");
                }
            });
            return Ok(url);
        }
        debug!(%line, "browser stderr");
    }
    Err(BrowserError::LaunchEnded)
}

fn parse_devtools_banner(line: &str) -> Option<String> {
    line.trim()
        .strip_prefix(DEVTOOLS_BANNER)
        .filter(|url| url.starts_with("ws://"))
        .map(ToOwned::to_owned)
}

#[cfg(test)]
#[path = "launcher_test.rs"]
mod tests;
