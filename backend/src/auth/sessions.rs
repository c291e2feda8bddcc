//! Server-side sign-in sessions.
//!
//! Every issued token references one row here, so a logout can revoke it
//! before the JWT itself expires.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuthSession {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Admin behind an impersonated session
    pub impersonator_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

pub async fn create(
    pool: &PgPool,
    user_id: Uuid,
    impersonator_id: Option<Uuid>,
    ttl: Duration,
) -> Result<AuthSession, sqlx::Error> {
    sqlx::query_as::<_, AuthSession>(
        r#"
        INSERT INTO auth_sessions (id, user_id, impersonator_id, expires_at)
        VALUES ($1, $2, $3, $4)
        RETURNING id, user_id, impersonator_id, created_at, expires_at, revoked_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(impersonator_id)
    .bind(Utc::now() + ttl)
    .fetch_one(pool)
    .await
}

pub async fn find(pool: &PgPool, session_id: Uuid) -> Result<Option<AuthSession>, sqlx::Error> {
    sqlx::query_as::<_, AuthSession>(
        "SELECT id, user_id, impersonator_id, created_at, expires_at, revoked_at
         FROM auth_sessions WHERE id = $1",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await
}

/// Marks the session revoked. Returns false if it was already revoked.
pub async fn revoke(pool: &PgPool, session_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE auth_sessions SET revoked_at = NOW() WHERE id = $1 AND revoked_at IS NULL",
    )
    .bind(session_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_in: Duration, revoked: bool) -> AuthSession {
        let now = Utc::now();
        AuthSession {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            impersonator_id: None,
            created_at: now,
            expires_at: now + expires_in,
            revoked_at: revoked.then_some(now),
        }
    }

    #[test]
    fn test_session_liveness() {
        let now = Utc::now();
        assert!(session(Duration::hours(1), false).is_live(now));
        assert!(!session(Duration::hours(1), true).is_live(now));
        assert!(!session(Duration::seconds(-1), false).is_live(now));
    }
}
