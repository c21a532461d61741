mod browser;
mod cancel;
mod capture;
mod catalog;
mod config;
mod export;
mod lifecycle;
mod params;
mod render;
mod server;

use std::net::SocketAddr;
use std::process::ExitCode;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::browser::{Browser, BrowserError};
use crate::cancel::Scope;
use crate::catalog::CatalogError;
use crate::config::{Cli, ConfigError, ExportConfig};
use crate::export::ExportOptions;
use crate::server::{ServerError, StaticServer};

/// Exit status after Ctrl-C, as a shell reports SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Browser(#[from] BrowserError),
}

#[derive(Debug, Default)]
struct Summary {
    diagrams: usize,
    exported: usize,
    failed: usize,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // --debug wins over RUST_LOG; otherwise RUST_LOG or info.
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let (handle, scope) = cancel::root();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; finishing current page");
            handle.cancel();
        }
    });

    match run(cli, &scope).await {
        Ok(true) if scope.is_cancelled() => ExitCode::from(EXIT_INTERRUPTED),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "export aborted");
            ExitCode::FAILURE
        }
    }
}

/// Returns `true` when an export ran, `false` in serve-only mode.
async fn run(cli: Cli, scope: &Scope) -> Result<bool, AppError> {
    let config = ExportConfig::from_cli(cli)?;
    let server = StaticServer::start(&config.webapp).await?;

    let result = if config.serve_only {
        info!(url = %export::engine_url(server.addr()), "serving draw.io until Ctrl-C");
        scope.cancelled().await;
        Ok(false)
    } else {
        export_all(&config, server.addr(), scope).await.map(|summary| {
            info!(
                diagrams = summary.diagrams,
                exported = summary.exported,
                failed = summary.failed,
                "export finished"
            );
            true
        })
    };

    server.shutdown().await;
    result
}

async fn export_all(config: &ExportConfig, server_addr: SocketAddr, scope: &Scope) -> Result<Summary, AppError> {
    let diagrams = catalog::read_dir(&config.input, catalog::DIAGRAM_EXTENSIONS)?;
    let options = ExportOptions::from_config(config, server_addr);
    let browser = Browser::start(&config.browser).await?;

    let mut summary = Summary::default();
    for diagram in &diagrams {
        if scope.is_cancelled() {
            break;
        }
        summary.diagrams += 1;
        for report in export::export(diagram, &browser, &options, scope).await {
            if report.is_ok() {
                summary.exported += 1;
            } else {
                summary.failed += 1;
            }
        }
    }

    browser.close().await;
    Ok(summary)
}
