use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{LetterKind, ProposalId, VillageId};
use super::gateway::GatewaySource;
use super::review::{AgencyDecision, LetterDecision};
use super::service::{ProposalWorkflowService, WorkflowError};
use super::store::{DocumentRenderer, FileStore, ProposalStore, ProposalStatusView, StoreError};

/// Shared router state: the workflow facade plus the gateway source the
/// decision endpoints snapshot per request.
pub struct WorkflowRouterState<S, F, D> {
    pub service: Arc<ProposalWorkflowService<S, F, D>>,
    pub gateway: Arc<dyn GatewaySource>,
}

impl<S, F, D> Clone for WorkflowRouterState<S, F, D> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            gateway: self.gateway.clone(),
        }
    }
}

/// Router builder exposing the proposal workflow endpoints.
pub fn proposal_router<S, F, D>(
    service: Arc<ProposalWorkflowService<S, F, D>>,
    gateway: Arc<dyn GatewaySource>,
) -> Router
where
    S: ProposalStore + 'static,
    F: FileStore + 'static,
    D: DocumentRenderer + 'static,
{
    let state = WorkflowRouterState { service, gateway };
    Router::new()
        .route(
            "/api/v1/bankeu/proposals/:proposal_id/approve",
            post(approve_handler::<S, F, D>),
        )
        .route(
            "/api/v1/bankeu/proposals/:proposal_id/request-revision",
            post(request_revision_handler::<S, F, D>),
        )
        .route(
            "/api/v1/bankeu/proposals/:proposal_id/resubmit",
            post(resubmit_handler::<S, F, D>),
        )
        .route(
            "/api/v1/bankeu/proposals/:proposal_id/agency-decision",
            post(agency_decision_handler::<S, F, D>),
        )
        .route(
            "/api/v1/bankeu/proposals/:proposal_id/team-status",
            get(team_status_handler::<S, F, D>),
        )
        .route(
            "/api/v1/bankeu/proposals/:proposal_id/berita-acara",
            post(berita_acara_handler::<S, F, D>),
        )
        .route(
            "/api/v1/bankeu/proposals/:proposal_id/surat-pengantar",
            post(surat_pengantar_handler::<S, F, D>),
        )
        .route(
            "/api/v1/bankeu/proposals/:proposal_id/comparison",
            get(comparison_handler::<S, F, D>),
        )
        .route(
            "/api/v1/bankeu/villages/:village_id/summary",
            get(summary_handler::<S, F, D>),
        )
        .route(
            "/api/v1/bankeu/villages/:village_id/forward",
            post(forward_handler::<S, F, D>),
        )
        .route(
            "/api/v1/bankeu/letters/:village_id/review",
            post(letter_review_handler::<S, F, D>),
        )
        .with_state(state)
}

/// Status code for a workflow error, shared with the crate-level
/// `AppError` response mapping.
pub fn status_for(error: &WorkflowError) -> StatusCode {
    match error {
        WorkflowError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        WorkflowError::InvalidState(_) | WorkflowError::Gate(_) => StatusCode::CONFLICT,
        WorkflowError::Precondition(_) => StatusCode::PRECONDITION_FAILED,
        WorkflowError::ArtifactGeneration(_) => StatusCode::BAD_GATEWAY,
        WorkflowError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
        WorkflowError::Store(StoreError::Conflict)
        | WorkflowError::Store(StoreError::VersionConflict) => StatusCode::CONFLICT,
        WorkflowError::Store(StoreError::Unavailable(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: WorkflowError) -> Response {
    let status = status_for(&error);
    let payload = match &error {
        // Itemized blockers so clients can render actionable messages.
        WorkflowError::Precondition(failed) => json!({
            "error": error.to_string(),
            "blockers": failed.blockers,
        }),
        _ => json!({ "error": error.to_string() }),
    };
    (status, axum::Json(payload)).into_response()
}

#[derive(Debug, Deserialize)]
struct RevisionRequest {
    note: String,
}

#[derive(Debug, Deserialize)]
struct ResubmitRequest {
    /// Replacement file content; upload mechanics live outside this crate.
    content: String,
}

#[derive(Debug, Deserialize)]
struct AgencyDecisionRequest {
    decision: AgencyDecision,
    #[serde(default)]
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BeritaAcaraRequest {
    author_id: String,
}

#[derive(Debug, Deserialize)]
struct SuratPengantarRequest {
    nomor_surat: String,
}

#[derive(Debug, Deserialize)]
struct YearQuery {
    year: u16,
}

#[derive(Debug, Deserialize)]
struct ForwardRequest {
    year: u16,
}

#[derive(Debug, Deserialize)]
struct LetterReviewRequest {
    year: u16,
    kind: LetterKind,
    decision: LetterDecision,
    #[serde(default)]
    note: Option<String>,
}

async fn approve_handler<S, F, D>(
    State(state): State<WorkflowRouterState<S, F, D>>,
    Path(proposal_id): Path<String>,
) -> Response
where
    S: ProposalStore + 'static,
    F: FileStore + 'static,
    D: DocumentRenderer + 'static,
{
    match state.service.approve_district(&ProposalId(proposal_id)) {
        Ok(proposal) => {
            let view = ProposalStatusView::from_proposal(&proposal);
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

async fn request_revision_handler<S, F, D>(
    State(state): State<WorkflowRouterState<S, F, D>>,
    Path(proposal_id): Path<String>,
    axum::Json(payload): axum::Json<RevisionRequest>,
) -> Response
where
    S: ProposalStore + 'static,
    F: FileStore + 'static,
    D: DocumentRenderer + 'static,
{
    match state
        .service
        .request_revision(&ProposalId(proposal_id), &payload.note)
    {
        Ok(proposal) => {
            let view = ProposalStatusView::from_proposal(&proposal);
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

async fn resubmit_handler<S, F, D>(
    State(state): State<WorkflowRouterState<S, F, D>>,
    Path(proposal_id): Path<String>,
    axum::Json(payload): axum::Json<ResubmitRequest>,
) -> Response
where
    S: ProposalStore + 'static,
    F: FileStore + 'static,
    D: DocumentRenderer + 'static,
{
    match state
        .service
        .resubmit(&ProposalId(proposal_id), payload.content.as_bytes())
    {
        Ok(proposal) => {
            let view = ProposalStatusView::from_proposal(&proposal);
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

async fn agency_decision_handler<S, F, D>(
    State(state): State<WorkflowRouterState<S, F, D>>,
    Path(proposal_id): Path<String>,
    axum::Json(payload): axum::Json<AgencyDecisionRequest>,
) -> Response
where
    S: ProposalStore + 'static,
    F: FileStore + 'static,
    D: DocumentRenderer + 'static,
{
    match state.service.record_agency_decision(
        &ProposalId(proposal_id),
        payload.decision,
        payload.note.as_deref(),
    ) {
        Ok(proposal) => {
            let view = ProposalStatusView::from_proposal(&proposal);
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

async fn team_status_handler<S, F, D>(
    State(state): State<WorkflowRouterState<S, F, D>>,
    Path(proposal_id): Path<String>,
) -> Response
where
    S: ProposalStore + 'static,
    F: FileStore + 'static,
    D: DocumentRenderer + 'static,
{
    match state.service.team_status(&ProposalId(proposal_id)) {
        Ok(status) => (StatusCode::OK, axum::Json(status)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn berita_acara_handler<S, F, D>(
    State(state): State<WorkflowRouterState<S, F, D>>,
    Path(proposal_id): Path<String>,
    axum::Json(payload): axum::Json<BeritaAcaraRequest>,
) -> Response
where
    S: ProposalStore + 'static,
    F: FileStore + 'static,
    D: DocumentRenderer + 'static,
{
    match state
        .service
        .generate_berita_acara(&ProposalId(proposal_id), &payload.author_id)
    {
        Ok(artifact) => (StatusCode::CREATED, axum::Json(artifact)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn surat_pengantar_handler<S, F, D>(
    State(state): State<WorkflowRouterState<S, F, D>>,
    Path(proposal_id): Path<String>,
    axum::Json(payload): axum::Json<SuratPengantarRequest>,
) -> Response
where
    S: ProposalStore + 'static,
    F: FileStore + 'static,
    D: DocumentRenderer + 'static,
{
    match state
        .service
        .generate_surat_pengantar(&ProposalId(proposal_id), &payload.nomor_surat)
    {
        Ok(artifact) => (StatusCode::CREATED, axum::Json(artifact)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn comparison_handler<S, F, D>(
    State(state): State<WorkflowRouterState<S, F, D>>,
    Path(proposal_id): Path<String>,
) -> Response
where
    S: ProposalStore + 'static,
    F: FileStore + 'static,
    D: DocumentRenderer + 'static,
{
    match state.service.comparison(&ProposalId(proposal_id)) {
        Ok(Some(view)) => (
            StatusCode::OK,
            axum::Json(json!({ "available": true, "comparison": view })),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::OK,
            axum::Json(json!({ "available": false })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

async fn summary_handler<S, F, D>(
    State(state): State<WorkflowRouterState<S, F, D>>,
    Path(village_id): Path<String>,
    Query(query): Query<YearQuery>,
) -> Response
where
    S: ProposalStore + 'static,
    F: FileStore + 'static,
    D: DocumentRenderer + 'static,
{
    match state
        .service
        .village_summary(&VillageId(village_id), query.year)
    {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn forward_handler<S, F, D>(
    State(state): State<WorkflowRouterState<S, F, D>>,
    Path(village_id): Path<String>,
    axum::Json(payload): axum::Json<ForwardRequest>,
) -> Response
where
    S: ProposalStore + 'static,
    F: FileStore + 'static,
    D: DocumentRenderer + 'static,
{
    let gateway = state.gateway.current();
    match state
        .service
        .forward_batch(&VillageId(village_id), payload.year, gateway)
    {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn letter_review_handler<S, F, D>(
    State(state): State<WorkflowRouterState<S, F, D>>,
    Path(village_id): Path<String>,
    axum::Json(payload): axum::Json<LetterReviewRequest>,
) -> Response
where
    S: ProposalStore + 'static,
    F: FileStore + 'static,
    D: DocumentRenderer + 'static,
{
    match state.service.review_letter(
        &VillageId(village_id),
        payload.year,
        payload.kind,
        payload.decision,
        payload.note.as_deref(),
    ) {
        Ok(bundle) => (StatusCode::OK, axum::Json(bundle)).into_response(),
        Err(error) => error_response(error),
    }
}
