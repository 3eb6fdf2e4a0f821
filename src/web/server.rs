use crate::Result;
use crate::supervisor::Supervisor;
use axum::{
    Router,
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use super::routes;

pub fn router(supervisor: Arc<Supervisor>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/servers", get(routes::servers::list))
        .route("/start-server", post(routes::servers::start))
        .route("/server-status/{port}", get(routes::servers::status))
        .route("/kill-server/{port}", post(routes::servers::kill))
        // the dev frontends call this from their own localhost origins
        .layer(CorsLayer::permissive())
        .with_state(supervisor)
}

pub async fn serve(bind: &str, port: u16, supervisor: Arc<Supervisor>) -> Result<()> {
    let addr = format!("{bind}:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| miette::miette!("Failed to bind control API to {}: {}", addr, e))?;
    serve_on(listener, supervisor, shutdown_signal()).await
}

/// Serves on an already bound listener until `shutdown` resolves.
pub async fn serve_on(
    listener: TcpListener,
    supervisor: Arc<Supervisor>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = listener
        .local_addr()
        .map_err(|e| miette::miette!("Failed to read control API address: {}", e))?;
    info!("control API listening on http://{addr}");

    axum::serve(listener, router(supervisor))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| miette::miette!("Control API error: {}", e))?;

    info!("control API stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let (Ok(mut term), Ok(mut int)) = (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) else {
            warn!("could not install signal handlers for the control API");
            return std::future::pending().await;
        };
        tokio::select! {
            _ = term.recv() => {},
            _ = int.recv() => {},
        }
    }
    #[cfg(windows)]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("could not listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    }
}
