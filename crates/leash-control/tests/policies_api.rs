//! Integration tests driving the router end-to-end with `tower::ServiceExt`
//! (spec.md §4.9), the way `leash-proxy`'s own tests drive a raw socket.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use leash_bootstrap::PolicyReadiness;
use leash_control::{build_router, AppState, EventsHub};
use leash_kernel::NullShim;
use leash_log::Logger;
use leash_policy::PolicyManager;
use leash_secrets::SecretVault;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_state() -> (Arc<AppState>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let (logger, _task) = Logger::spawn(dir.path().join("events.log"), 64).await.unwrap();
    let (policy, _rx) = PolicyManager::new(Arc::new(NullShim::new()), logger.clone(), dir.path().join("policy.cedar"));
    let readiness = Arc::new(PolicyReadiness::new());
    readiness.set_file_compiled(true);
    readiness.set_bootstrap_ready(true);
    let state = Arc::new(AppState {
        policy: Arc::new(policy),
        secrets: Arc::new(SecretVault::new()),
        logger,
        readiness,
        hub: EventsHub::new(),
    });
    (state, dir)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_and_health_policy_report_ready() {
    let (state, _dir) = test_state().await;
    let router = build_router(state);

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(Request::builder().uri("/health/policy").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_policy_reports_503_when_not_ready() {
    let (state, _dir) = test_state().await;
    state.readiness.set_bootstrap_ready(false);
    let router = build_router(state);

    let response = router
        .oneshot(Request::builder().uri("/health/policy").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn posting_a_runtime_overlay_makes_health_policy_ready_without_a_file_layer() {
    let (state, _dir) = test_state().await;
    state.readiness.set_file_compiled(false);
    let router = build_router(state.clone());

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/health/policy").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let cedar = leash_test::sample_policy();
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/policies")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "cedar": cedar }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(Request::builder().uri("/health/policy").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK, "a non-empty runtime overlay alone must satisfy policy_ready");
}

#[tokio::test]
async fn post_then_get_policies_round_trips_runtime_overlay() {
    let (state, _dir) = test_state().await;
    let router = build_router(state);

    let cedar = leash_test::sample_policy();
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/policies")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "cedar": cedar }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(Request::builder().uri("/api/policies").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["cedarRuntime"], cedar);
}

#[tokio::test]
async fn post_policies_rejects_removing_all_connect_allows() {
    let (state, _dir) = test_state().await;
    let router = build_router(state);

    let cedar = r#"forbid (principal, action == Action::"NetConnect", resource);"#;
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/policies")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "cedar": cedar }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn patch_add_then_add_again_is_idempotent() {
    let (state, _dir) = test_state().await;
    let router = build_router(state);

    let addition = r#"permit (principal, action == Action::"NetConnect", resource) when { resource in [ Host::"api.anthropic.com" ] };"#;
    let patch_body = json!({ "add": [addition] }).to_string();

    let first = router
        .clone()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri("/api/policies")
                .header("content-type", "application/json")
                .body(Body::from(patch_body.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first_body = body_json(first).await;

    let second = router
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri("/api/policies")
                .header("content-type", "application/json")
                .body(Body::from(patch_body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let second_body = body_json(second).await;

    assert_eq!(first_body["cedarRuntime"], second_body["cedarRuntime"]);
}

#[tokio::test]
async fn validate_reports_issues_without_mutating_state() {
    let (state, _dir) = test_state().await;
    let router = build_router(state.clone());

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/policies/validate")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "cedar": "" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["issues"].as_array().unwrap().iter().any(|issue| issue["code"] == "empty-program"));

    let snapshot = state.policy.snapshot().await;
    assert!(snapshot.cedar_runtime.is_empty());
}

#[tokio::test]
async fn secrets_round_trip_creates_and_lists_redacted() {
    let (state, _dir) = test_state().await;
    let router = build_router(state);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/secrets/API_TOKEN")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "value": "12345678901234567890" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created = body_json(response).await;
    assert!(created["placeholder"].as_str().unwrap().starts_with(leash_secrets::PLACEHOLDER_PREFIX));

    let response = router
        .oneshot(Request::builder().uri("/api/secrets").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = body_json(response).await;
    assert!(listed["API_TOKEN"]["value"].is_null());
}
