//! Request handlers.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::http::server::AppState;
use crate::http::validation::{parse_output_index, validate_profile_name, validate_txid, ParamError};
use crate::pipeline::{StartCommand, StartOutcome};
use crate::profiles::ProfileSummary;
use crate::resilience::circuit_breaker::CircuitSnapshot;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub profiles: usize,
    pub cached_responses: usize,
    pub circuits: Vec<CircuitSnapshot>,
}

pub async fn get_test() -> Json<serde_json::Value> {
    Json(json!({ "msg": "backend works" }))
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let http = state.orchestrator.chain().http();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        profiles: state.orchestrator.profiles().len(),
        cached_responses: http.cache().len(),
        circuits: http.breakers().snapshot(),
    })
}

pub async fn get_profiles(State(state): State<AppState>) -> Json<Vec<ProfileSummary>> {
    Json(state.orchestrator.profiles().list_profiles())
}

pub async fn start(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path((txid, index)): Path<(String, String)>,
) -> Response {
    handle_start(state, addr, txid, index, None).await
}

pub async fn start_with_profile(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path((txid, index, profile)): Path<(String, String, String)>,
) -> Response {
    handle_start(state, addr, txid, index, Some(profile)).await
}

async fn handle_start(
    state: AppState,
    addr: SocketAddr,
    txid: String,
    index: String,
    profile: Option<String>,
) -> Response {
    let command = match parse_command(txid, &index, profile, addr) {
        Ok(command) => command,
        Err(e) => {
            tracing::warn!(caller_ip = %addr.ip(), error = %e, "Invalid start parameters");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "error", "error": e.to_string() })),
            )
                .into_response();
        }
    };

    tracing::info!(
        txid = %command.txid,
        index = command.output_index,
        profile = command.profile.as_deref().unwrap_or("-"),
        caller_ip = %addr.ip(),
        "Processing start request"
    );

    let outcome = state.orchestrator.start_node(command).await;
    (status_for(&outcome), Json(outcome.to_json())).into_response()
}

fn parse_command(
    txid: String,
    index: &str,
    profile: Option<String>,
    addr: SocketAddr,
) -> Result<StartCommand, ParamError> {
    validate_txid(&txid)?;
    let output_index = parse_output_index(index)?;
    if let Some(name) = &profile {
        validate_profile_name(name)?;
    }
    Ok(StartCommand {
        txid,
        output_index,
        profile,
        caller_ip: Some(addr.ip()),
    })
}

/// HTTP status for a pipeline outcome.
pub fn status_for(outcome: &StartOutcome) -> StatusCode {
    match outcome {
        StartOutcome::Broadcast { .. } => StatusCode::OK,
        StartOutcome::Rejected { .. } => StatusCode::BAD_REQUEST,
        StartOutcome::Failed {
            circuit_open: true, ..
        } => StatusCode::SERVICE_UNAVAILABLE,
        StartOutcome::Failed { .. } => StatusCode::BAD_GATEWAY,
        StartOutcome::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
