use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde_json::json;
use std::sync::Arc;

use crate::auth::middleware::AuthUser;
use crate::auth::rbac::{Action, Resource};
use crate::error::ApiResult;
use crate::{database, AppState};
use garageinn_shared::{User, UserSummary};

pub mod impersonation;

pub use impersonation::admin_routes;

pub fn user_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_users))
}

pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let database_ok = database::health_check(&state.db_pool).await;
    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if database_ok { "healthy" } else { "degraded" },
            "service": "garageinn-api",
            "database": database_ok,
        })),
    )
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<UserSummary>>> {
    auth.require(Resource::Users, Action::Read)?;

    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY first_name, last_name")
        .fetch_all(&state.db_pool)
        .await?;

    Ok(Json(users.iter().map(User::summary).collect()))
}
