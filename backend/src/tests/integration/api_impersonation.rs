// Integration tests for the impersonation endpoint

use axum::http::{Method, StatusCode};
use chrono::Duration;
use serde_json::json;
use tower::ServiceExt;

use crate::tests::helpers::{create_test_jwt, json_body, request, test_app, test_user};

const IMPERSONATE: &str = "/api/v1/admin/impersonate";

#[tokio::test]
async fn test_impersonate_without_bearer_is_unauthorized() {
    let response = test_app()
        .oneshot(request(
            Method::POST,
            IMPERSONATE,
            None,
            Some(json!({ "targetUserId": uuid::Uuid::new_v4().to_string() })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert_eq!(body["error"], "Missing authorization header");
}

#[tokio::test]
async fn test_impersonate_with_garbage_token_is_unauthorized() {
    let response = test_app()
        .oneshot(request(
            Method::POST,
            IMPERSONATE,
            Some("not-a-jwt"),
            Some(json!({ "targetUserId": uuid::Uuid::new_v4().to_string() })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_impersonate_with_expired_token_reports_expiry() {
    let admin = test_user("admin");
    let token = create_test_jwt(&admin, Duration::hours(-2), "test_secret_key_for_testing_only");

    let response = test_app()
        .oneshot(request(
            Method::POST,
            IMPERSONATE,
            Some(&token),
            Some(json!({ "targetUserId": uuid::Uuid::new_v4().to_string() })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["code"], "TOKEN_EXPIRED");
}

#[tokio::test]
async fn test_impersonate_with_foreign_signature_is_unauthorized() {
    let admin = test_user("admin");
    let token = create_test_jwt(&admin, Duration::hours(1), "some-other-deployment");

    let response = test_app()
        .oneshot(request(
            Method::POST,
            IMPERSONATE,
            Some(&token),
            Some(json!({ "targetUserId": uuid::Uuid::new_v4().to_string() })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_list_users_requires_bearer() {
    let response = test_app()
        .oneshot(request(Method::GET, "/api/v1/users", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
