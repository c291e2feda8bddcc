use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::jwt;
use super::rbac::{self, Action, Actor, Resource};
use super::sessions::{self, AuthSession};
use crate::error::{ApiResult, AppError};
use crate::AppState;
use garageinn_shared::{User, UserRole};

/// Authenticated user extractor
///
/// Accepts `Authorization: Bearer <jwt>` only when the token verifies, its
/// session row is neither revoked nor expired, and the user is still active.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub session: AuthSession,
}

impl AuthUser {
    pub fn role(&self) -> UserRole {
        self.user.user_role()
    }

    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user.id,
            role: self.role(),
            impersonated_by: self.session.impersonator_id,
        }
    }

    pub fn require(&self, resource: Resource, action: Action) -> ApiResult<()> {
        rbac::require(self.role(), resource, action)
    }
}

pub(crate) fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get("authorization")
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization format".to_string()))
}

async fn authenticate(parts: &Parts, state: &AppState) -> Result<AuthUser, AppError> {
    let token = bearer_token(parts)?;
    let claims = jwt::verify_jwt(token, &state.config.jwt_secret)?.claims;

    let session = sessions::find(&state.db_pool, claims.sid)
        .await?
        .filter(|s| s.user_id == claims.sub)
        .ok_or_else(|| AppError::Unauthorized("Session not found".to_string()))?;

    if session.impersonator_id != claims.imp {
        return Err(AppError::Unauthorized("Session does not match token".to_string()));
    }
    if session.revoked_at.is_some() {
        return Err(AppError::Unauthorized("Session has been revoked".to_string()));
    }
    if !session.is_live(chrono::Utc::now()) {
        return Err(AppError::TokenExpired);
    }

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND is_active = true")
        .bind(claims.sub)
        .fetch_optional(&state.db_pool)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found or inactive".to_string()))?;

    Ok(AuthUser { user, session })
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).await.map_err(|e| {
            tracing::debug!(code = e.error_code(), "rejected bearer credentials");
            e.into_response()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/v1/auth/me");
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc.def"))).unwrap(), "abc.def");
        assert!(matches!(
            bearer_token(&parts(None)),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            bearer_token(&parts(Some("Basic dXNlcjpwYXNz"))),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            bearer_token(&parts(Some("Bearer   "))),
            Err(AppError::Unauthorized(_))
        ));
    }
}
