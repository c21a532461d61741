//! Static file server for the draw.io webapp.
//!
//! Binds an ephemeral loopback port so the browser can load `export3.html`
//! and its assets over plain HTTP.

use std::net::SocketAddr;
use std::path::Path;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind static server: {0}")]
    Bind(#[source] std::io::Error),
}

fn app(webapp: &Path) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(webapp))
        .layer(TraceLayer::new_for_http())
}

pub struct StaticServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl StaticServer {
    /// Serve `webapp` on `127.0.0.1:0`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the listener cannot be created.
    pub async fn start(webapp: &Path) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.map_err(ServerError::Bind)?;
        let addr = listener.local_addr().map_err(ServerError::Bind)?;
        let (shutdown, rx) = oneshot::channel::<()>();

        let router = app(webapp);
        let task = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await;
            if let Err(e) = served {
                warn!(error = %e, "static server stopped with error");
            }
        });

        info!(%addr, webapp = %webapp.display(), "static server listening");
        Ok(Self { addr, shutdown, task })
    }

    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for the serving task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            warn!(error = %e, "static server task failed");
        }
        info!("static server stopped");
    }
}

#[cfg(test)]
#[path = "server_test.rs"]
mod tests;
