use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;

use bankeu_workflow::error::AppError;
use bankeu_workflow::workflows::bankeu::{
    proposal_router, Activity, DistrictId, GatewaySource, NewProposal, ProposalStatusView,
    VillageId,
};

use crate::infra::{ApiWorkflowService, AppState, ToggleGateway};

/// Intake payload for a village upload, mirroring `NewProposal` but with
/// the file carried inline as text for this in-memory deployment.
#[derive(Debug, Deserialize)]
pub(crate) struct ProposalIntakeRequest {
    pub(crate) village_id: String,
    pub(crate) district_id: String,
    pub(crate) title: String,
    pub(crate) requested_budget: u64,
    pub(crate) funding_year: u16,
    #[serde(default)]
    pub(crate) activities: Vec<Activity>,
    #[serde(default)]
    pub(crate) content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GatewayToggleRequest {
    pub(crate) open: bool,
}

pub(crate) fn with_workflow_routes(
    service: Arc<ApiWorkflowService>,
    gateway: Arc<ToggleGateway>,
) -> axum::Router {
    proposal_router(service.clone(), gateway.clone() as Arc<dyn GatewaySource>)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/bankeu/proposals",
            axum::routing::post(proposal_intake_endpoint),
        )
        .route(
            "/api/v1/bankeu/gateway",
            axum::routing::post(gateway_toggle_endpoint),
        )
        .layer(Extension(service))
        .layer(Extension(gateway))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn proposal_intake_endpoint(
    Extension(service): Extension<Arc<ApiWorkflowService>>,
    Json(payload): Json<ProposalIntakeRequest>,
) -> Result<(StatusCode, Json<ProposalStatusView>), AppError> {
    let ProposalIntakeRequest {
        village_id,
        district_id,
        title,
        requested_budget,
        funding_year,
        activities,
        content,
    } = payload;

    let proposal = service.create_proposal(NewProposal {
        village_id: VillageId(village_id),
        district_id: DistrictId(district_id),
        title,
        requested_budget,
        funding_year,
        activities,
        file: content.map(String::into_bytes),
    })?;

    Ok((
        StatusCode::CREATED,
        Json(ProposalStatusView::from_proposal(&proposal)),
    ))
}

pub(crate) async fn gateway_toggle_endpoint(
    Extension(gateway): Extension<Arc<ToggleGateway>>,
    Json(payload): Json<GatewayToggleRequest>,
) -> Json<serde_json::Value> {
    gateway.set(payload.open);
    let current = gateway.current();
    Json(json!({ "open": current.open }))
}
