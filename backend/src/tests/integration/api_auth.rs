// Integration tests for the auth endpoints that answer before touching the database

use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::tests::helpers::{json_body, request, test_app};

#[tokio::test]
async fn test_login_rejects_malformed_input() {
    let response = test_app()
        .oneshot(request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "not-an-email", "password": "" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["details"]["email"].is_array());
    assert!(body["details"]["password"].is_array());
}

#[tokio::test]
async fn test_malformed_magic_link_is_unauthorized() {
    let response = test_app()
        .oneshot(request(
            Method::POST,
            "/api/v1/auth/magic-link/verify",
            None,
            Some(json!({ "token": "definitely not a token" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await["error"],
        "Magic link is invalid or has expired"
    );
}

#[tokio::test]
async fn test_me_and_logout_require_bearer() {
    for (method, uri) in [
        (Method::GET, "/api/v1/auth/me"),
        (Method::POST, "/api/v1/auth/logout"),
    ] {
        let response = test_app()
            .oneshot(request(method, uri, None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn test_health_reports_unreachable_database() {
    let response = test_app()
        .oneshot(request(Method::GET, "/health", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], false);
}
