use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use crate::error::SupervisorError;
use crate::registry::ManagedServer;
use crate::supervisor::Supervisor;

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    port: u16,
    script: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    success: bool,
    message: String,
    pid: u32,
    killed_existing: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    port: u16,
    is_running: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KillResponse {
    success: bool,
    message: String,
    killed: usize,
    pids: Vec<u32>,
    survivors: Vec<u32>,
}

/// Path ports arrive as strings so a non-numeric one can be reported as
/// `invalid_port` instead of axum's plain-text rejection.
fn parse_port(raw: &str) -> Result<u16, SupervisorError> {
    match raw.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(SupervisorError::InvalidPort {
            raw: raw.to_string(),
        }),
    }
}

pub async fn list(State(sup): State<Arc<Supervisor>>) -> Json<Vec<ManagedServer>> {
    Json(sup.config().registry.iter().cloned().collect())
}

pub async fn start(
    State(sup): State<Arc<Supervisor>>,
    body: Result<Json<StartRequest>, JsonRejection>,
) -> ApiResult<StartResponse> {
    let Json(req) = body?;
    if req.port == 0 {
        return Err(ApiError::bad_request("port must be between 1 and 65535"));
    }
    let script = req.script.trim();
    if script.is_empty() {
        return Err(ApiError::bad_request("script must not be empty"));
    }

    let outcome = sup.start_server(req.port, script).await?;
    Ok(Json(StartResponse {
        success: true,
        message: outcome.message(),
        pid: outcome.handle.pid,
        killed_existing: outcome.killed_existing,
    }))
}

pub async fn status(
    State(sup): State<Arc<Supervisor>>,
    Path(port): Path<String>,
) -> ApiResult<StatusResponse> {
    let port = parse_port(&port)?;
    let is_running = sup.server_status(port).await;
    Ok(Json(StatusResponse { port, is_running }))
}

pub async fn kill(
    State(sup): State<Arc<Supervisor>>,
    Path(port): Path<String>,
) -> ApiResult<KillResponse> {
    let port = parse_port(&port)?;
    let report = sup.kill_server(port).await;
    let message = if report.pids.is_empty() {
        format!("no process listening on port {port}")
    } else if report.is_clean() {
        format!("stopped {} process(es) on port {port}", report.killed)
    } else {
        SupervisorError::PartialKillFailure {
            port,
            pids: report.survivors.clone(),
        }
        .to_string()
    };
    Ok(Json(KillResponse {
        success: report.is_clean(),
        message,
        killed: report.killed,
        pids: report.pids,
        survivors: report.survivors,
    }))
}
