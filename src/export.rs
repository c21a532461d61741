//! Per-page export loop.
//!
//! DESIGN
//! ======
//! Pages are exported strictly one after another. Each page gets its own
//! session from the factory (a fresh browser context), so device metric
//! overrides never leak into the next page. The session is closed whatever
//! the outcome.
//!
//! ERROR HANDLING
//! ==============
//! A page failure is logged and recorded in its [`PageReport`]; it never
//! stops the loop. Only cancellation of the root scope does, and then the
//! remaining pages are not attempted.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::browser::{BrowserError, SessionFactory, Surface};
use crate::cancel::Scope;
use crate::capture::{self, CaptureError};
use crate::catalog::{Diagram, Page};
use crate::config::{ExportConfig, Format};
use crate::params;
use crate::render::{AttributePoll, ENGINE_PAGE};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to open session: {0}")]
    Session(#[source] BrowserError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: std::io::Error },
}

/// Everything the loop needs besides the diagram and sessions.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub engine_url: String,
    pub format: Format,
    pub background: String,
    pub destination: PathBuf,
    pub page_timeout: Duration,
    pub attribute_poll: AttributePoll,
}

impl ExportOptions {
    #[must_use]
    pub fn from_config(config: &ExportConfig, server_addr: SocketAddr) -> Self {
        Self {
            engine_url: engine_url(server_addr),
            format: config.format,
            background: config.background.clone(),
            destination: config.output.clone(),
            page_timeout: config.page_timeout,
            attribute_poll: config.attribute_poll,
        }
    }
}

#[must_use]
pub fn engine_url(server_addr: SocketAddr) -> String {
    format!("http://{server_addr}/{ENGINE_PAGE}")
}

/// Outcome of one attempted page: the written file or why there is none.
pub type PageReport = Result<PathBuf, ExportError>;

/// `<destination>/<rel_path without extension>_<name or index>.<format>`.
#[must_use]
pub fn output_path(destination: &Path, rel_path: &Path, page: &Page, index: usize, format: Format) -> PathBuf {
    let base = destination.join(rel_path).with_extension("");
    let suffix = if page.name.is_empty() { index.to_string() } else { page.name.clone() };

    let mut file_name = base.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    file_name.push(format!("_{suffix}.{format}"));
    base.with_file_name(file_name)
}

/// Export every page of `diagram`.
///
/// Returns one report per attempted page, in page order. Fewer reports than
/// pages means `scope` was cancelled.
pub async fn export<F>(diagram: &Diagram, factory: &F, options: &ExportOptions, scope: &Scope) -> Vec<PageReport>
where
    F: SessionFactory + ?Sized,
{
    info!(path = %diagram.rel_path.display(), pages = diagram.pages.len(), "exporting diagram");

    let mut reports = Vec::with_capacity(diagram.pages.len());
    for (index, page) in diagram.pages.iter().enumerate() {
        if scope.is_cancelled() {
            info!(path = %diagram.rel_path.display(), remaining = diagram.pages.len() - index, "export cancelled");
            break;
        }

        let result = export_page(diagram, page, index, factory, options, scope).await;
        match &result {
            Ok(path) => info!(path = %path.display(), "saved exported page"),
            Err(e) => warn!(
                diagram = %diagram.rel_path.display(),
                page = %page.id,
                name = %page.name,
                index,
                error = %e,
                "failed to export page"
            ),
        }
        reports.push(result);
    }
    reports
}

async fn export_page<F>(
    diagram: &Diagram,
    page: &Page,
    index: usize,
    factory: &F,
    options: &ExportOptions,
    scope: &Scope,
) -> Result<PathBuf, ExportError>
where
    F: SessionFactory + ?Sized,
{
    let params = params::build(diagram, page, options.format, &options.background);
    let page_scope = scope.with_timeout(options.page_timeout);

    let session = factory.open().await.map_err(ExportError::Session)?;
    let captured = capture::capture_page(
        &session,
        &options.engine_url,
        &params,
        options.attribute_poll,
        &page_scope,
    )
    .await;
    if let Err(e) = session.close().await {
        debug!(page = %page.id, error = %e, "session close failed");
    }
    let bytes = captured?;

    let path = output_path(&options.destination, &diagram.rel_path, page, index, options.format);
    write_output(&path, &bytes).await?;
    Ok(path)
}

async fn write_output(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let write_err = |source| ExportError::Write { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    tokio::fs::write(path, bytes).await.map_err(write_err)
}

#[cfg(test)]
#[path = "export_test.rs"]
mod tests;
