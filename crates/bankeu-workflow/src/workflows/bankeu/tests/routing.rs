use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::util::ServiceExt;

use super::common::*;
use crate::workflows::bankeu::gateway::{StaticGateway, WorkflowGateway};
use crate::workflows::bankeu::router::proposal_router;

fn router_with_gateway(
    gateway: WorkflowGateway,
) -> (axum::Router, Arc<MemoryStore>, Arc<MemoryFiles>) {
    let (service, store, files) = build_service();
    let router = proposal_router(service, Arc::new(StaticGateway(gateway)));
    (router, store, files)
}

fn json_request(method: Method, uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request builds")
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

#[tokio::test]
async fn approve_returns_the_updated_status_view() {
    let (router, store, files) = router_with_gateway(WorkflowGateway::open());
    seed_uploaded(&store, &files, "p-1", "desa-a");

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/bankeu/proposals/p-1/approve",
            json!({}),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["district_status"], "verified");
}

#[tokio::test]
async fn approve_unknown_proposal_is_404() {
    let (router, _store, _files) = router_with_gateway(WorkflowGateway::open());

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/bankeu/proposals/ghost/approve",
            json!({}),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_revision_note_is_unprocessable() {
    let (router, store, files) = router_with_gateway(WorkflowGateway::open());
    seed_uploaded(&store, &files, "p-1", "desa-a");

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/bankeu/proposals/p-1/request-revision",
            json!({ "note": "  " }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert!(body["error"].as_str().expect("message").contains("note"));
}

#[tokio::test]
async fn double_approve_is_a_conflict() {
    let (router, store, files) = router_with_gateway(WorkflowGateway::open());
    seed_uploaded(&store, &files, "p-1", "desa-a");

    let first = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/bankeu/proposals/p-1/approve",
            json!({}),
        ))
        .await
        .expect("router responds");
    assert_eq!(first.status(), StatusCode::OK);

    let second = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/bankeu/proposals/p-1/approve",
            json!({}),
        ))
        .await
        .expect("router responds");
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn berita_acara_gate_failure_names_the_condition() {
    let (router, store, files) = router_with_gateway(WorkflowGateway::open());
    seed_uploaded(&store, &files, "p-1", "desa-a");

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/bankeu/proposals/p-1/berita-acara",
            json!({ "author_id": "reviewer-1" }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json_body(response).await;
    assert!(body["error"]
        .as_str()
        .expect("message")
        .contains("must be verified"));
}

#[tokio::test]
async fn forward_blocked_by_closed_gateway_returns_412_with_blockers() {
    let (router, store, files) = router_with_gateway(WorkflowGateway::closed());
    let proposal = seed_uploaded(&store, &files, "p-1", "desa-a");
    store.seed_member(member("m-1", &proposal.id, true));
    store.seed_letters(letters("desa-a", 2025));

    // Verify and generate both artifacts through the HTTP surface.
    for (uri, payload) in [
        (
            "/api/v1/bankeu/proposals/p-1/approve".to_string(),
            json!({}),
        ),
        (
            "/api/v1/bankeu/proposals/p-1/berita-acara".to_string(),
            json!({ "author_id": "reviewer-1" }),
        ),
        (
            "/api/v1/bankeu/proposals/p-1/surat-pengantar".to_string(),
            json!({ "nomor_surat": "005/PEM/2025" }),
        ),
    ] {
        let response = router
            .clone()
            .oneshot(json_request(Method::POST, &uri, payload))
            .await
            .expect("router responds");
        assert!(
            response.status().is_success(),
            "setup call {uri} failed: {}",
            response.status()
        );
    }

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/bankeu/villages/desa-a/forward",
            json!({ "year": 2025 }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
    let body = read_json_body(response).await;
    assert_eq!(body["blockers"][0]["reason"], "gateway_closed");
}

#[tokio::test]
async fn summary_reports_village_counts() {
    let (router, store, files) = router_with_gateway(WorkflowGateway::open());
    seed_uploaded(&store, &files, "p-1", "desa-a");
    seed_uploaded(&store, &files, "p-2", "desa-a");

    let response = router
        .oneshot(get_request("/api/v1/bankeu/villages/desa-a/summary?year=2025"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["total_uploaded"], 2);
    assert_eq!(body["total_pending"], 2);
    assert_eq!(body["all_reviewed"], false);
}

#[tokio::test]
async fn comparison_endpoint_reports_availability() {
    let (router, store, files) = router_with_gateway(WorkflowGateway::open());
    seed_uploaded(&store, &files, "p-1", "desa-a");

    let response = router
        .oneshot(get_request("/api/v1/bankeu/proposals/p-1/comparison"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["available"], false);
}

#[tokio::test]
async fn letter_review_round_trips() {
    let (router, store, _files) = router_with_gateway(WorkflowGateway::open());
    store.seed_letters(letters("desa-a", 2025));

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/bankeu/letters/desa-a/review",
            json!({
                "year": 2025,
                "kind": "surat_pengantar",
                "decision": "rejected",
                "note": "format lama"
            }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["surat_pengantar"]["review_status"], "rejected");
    assert_eq!(body["surat_pengantar"]["rejection_note"], "format lama");
}
