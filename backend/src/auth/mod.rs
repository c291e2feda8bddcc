pub mod jwt;
pub mod magic_link;
pub mod middleware;
pub mod rbac;
pub mod sessions;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Duration;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::error::{ApiResult, AppError, ValidationBuilder};
use crate::services::{AuditAction, AuditEntryBuilder, AuditService};
use crate::AppState;
use garageinn_shared::{CurrentUserResponse, LoginRequest, LoginResponse, MagicLinkExchange, User};
use middleware::AuthUser;

pub fn auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/magic-link/verify", post(verify_magic_link))
}

/// Creates a session row and signs a token for it.
pub(crate) async fn open_session(
    state: &AppState,
    user: &User,
    impersonator_id: Option<Uuid>,
) -> ApiResult<(LoginResponse, Uuid)> {
    let ttl = Duration::hours(state.config.session_ttl_hours);
    let session = sessions::create(&state.db_pool, user.id, impersonator_id, ttl).await?;
    let issued = jwt::create_jwt(user, session.id, impersonator_id, ttl, &state.config.jwt_secret)?;

    Ok((
        LoginResponse {
            token: issued.token,
            user: user.summary(),
            expires_at: issued.expires_at,
        },
        session.id,
    ))
}

pub(crate) fn verify_password(password: &str, password_hash: &str) -> ApiResult<bool> {
    let parsed = PasswordHash::new(password_hash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn validate_login(req: &LoginRequest) -> ApiResult<()> {
    ValidationBuilder::new()
        .error_if(req.email.trim().is_empty(), "email", "Email is required")
        .error_if(
            !req.email.trim().is_empty() && !req.email.trim().validate_email(),
            "email",
            "Invalid email format",
        )
        .error_if(req.password.is_empty(), "password", "Password is required")
        .finish()
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    validate_login(&req)?;

    let user = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE LOWER(email) = LOWER($1) AND is_active = true",
    )
    .bind(req.email.trim())
    .fetch_optional(&state.db_pool)
    .await?
    .ok_or(AppError::InvalidCredentials)?;

    let Some(password_hash) = user.password_hash.as_deref() else {
        return Err(AppError::InvalidCredentials);
    };
    if !verify_password(&req.password, password_hash)? {
        tracing::info!(user_id = %user.id, "password login rejected");
        return Err(AppError::InvalidCredentials);
    }

    sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
        .bind(user.id)
        .execute(&state.db_pool)
        .await?;

    let (response, session_id) = open_session(&state, &user, None).await?;

    AuditService::new(state.db_pool.clone())
        .record(
            AuditEntryBuilder::new(AuditAction::Login)
                .actor(user.id, Some(user.email.clone()))
                .session(session_id),
        )
        .await;

    tracing::info!(user_id = %user.id, "user signed in");
    Ok(Json(response))
}

async fn logout(State(state): State<Arc<AppState>>, auth: AuthUser) -> ApiResult<StatusCode> {
    sessions::revoke(&state.db_pool, auth.session.id).await?;

    let entry = match auth.session.impersonator_id {
        Some(admin_id) => AuditEntryBuilder::new(AuditAction::ImpersonationEnded)
            .actor(admin_id, None)
            .target(auth.user.id),
        None => AuditEntryBuilder::new(AuditAction::Logout)
            .actor(auth.user.id, Some(auth.user.email.clone())),
    };
    AuditService::new(state.db_pool.clone())
        .record(entry.session(auth.session.id))
        .await;

    Ok(StatusCode::NO_CONTENT)
}

async fn me(auth: AuthUser) -> Json<CurrentUserResponse> {
    Json(CurrentUserResponse {
        user: auth.user.summary(),
        impersonated_by: auth.session.impersonator_id,
    })
}

/// Exchanges a magic link token for a session of the link's user.
async fn verify_magic_link(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MagicLinkExchange>,
) -> ApiResult<Json<LoginResponse>> {
    let link = magic_link::consume(&state.db_pool, req.token.trim())
        .await?
        .ok_or_else(|| AppError::Unauthorized("Magic link is invalid or has expired".to_string()))?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND is_active = true")
        .bind(link.user_id)
        .fetch_optional(&state.db_pool)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found or inactive".to_string()))?;

    let (response, session_id) = open_session(&state, &user, Some(link.issued_by)).await?;

    AuditService::new(state.db_pool.clone())
        .record(
            AuditEntryBuilder::new(AuditAction::ImpersonationSessionOpened)
                .actor(link.issued_by, None)
                .target(user.id)
                .session(session_id)
                .metadata_json(json!({ "magic_link_id": link.id })),
        )
        .await;

    tracing::info!(
        admin_id = %link.issued_by,
        user_id = %user.id,
        "impersonated session opened"
    );
    Ok(Json(response))
}
