//! Admin impersonation: mints a magic link that signs the caller in as
//! another user.

use axum::{extract::State, response::Json, routing::post, Router};
use chrono::Duration;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::magic_link;
use crate::auth::middleware::AuthUser;
use crate::auth::rbac::ImpersonationPolicy;
use crate::error::{ApiResult, AppError};
use crate::services::{AuditAction, AuditEntryBuilder, AuditService};
use crate::AppState;
use garageinn_shared::{ImpersonateRequest, ImpersonateResponse, TargetUser, User};

pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new().route("/impersonate", post(impersonate))
}

pub(crate) fn parse_target_id(raw: &str) -> ApiResult<Uuid> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::BadRequest("targetUserId is required".to_string()));
    }
    Uuid::parse_str(raw)
        .map_err(|_| AppError::BadRequest("targetUserId must be a UUID".to_string()))
}

async fn impersonate(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<ImpersonateRequest>,
) -> ApiResult<Json<ImpersonateResponse>> {
    let target_id = parse_target_id(&req.target_user_id)?;

    let target = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(target_id)
        .fetch_optional(&state.db_pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

    if let Err(denied) = ImpersonationPolicy.check(&auth.actor(), &target) {
        tracing::warn!(
            admin_id = %auth.user.id,
            target_id = %target.id,
            reason = ?denied,
            "impersonation refused"
        );
        return Err(denied.into());
    }

    let ttl = Duration::minutes(state.config.magic_link_ttl_minutes);
    let (token, link) = magic_link::issue(&state.db_pool, target.id, auth.user.id, ttl).await?;
    let url = state.config.magic_link_url(&token)?;

    AuditService::new(state.db_pool.clone())
        .record(
            AuditEntryBuilder::new(AuditAction::ImpersonationStarted)
                .actor(auth.user.id, Some(auth.user.email.clone()))
                .target(target.id)
                .session(auth.session.id)
                .metadata_json(json!({
                    "magic_link_id": link.id,
                    "expires_at": link.expires_at,
                })),
        )
        .await;

    tracing::info!(admin_id = %auth.user.id, target_id = %target.id, "impersonation link issued");

    Ok(Json(ImpersonateResponse {
        link: url.to_string(),
        target_user: TargetUser {
            id: target.id.to_string(),
            name: target.full_name(),
            email: target.email.clone(),
        },
    }))
}
