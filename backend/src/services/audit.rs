use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type AuditResult<T> = Result<T, AuditError>;

/// Writes the `audit_logs` trail for sign-ins and impersonation.
#[derive(Clone)]
pub struct AuditService {
    pool: PgPool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Login,
    Logout,
    /// Admin was issued a magic link for another user
    ImpersonationStarted,
    /// That magic link was exchanged for a session
    ImpersonationSessionOpened,
    /// The impersonated session signed out
    ImpersonationEnded,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::ImpersonationStarted => "impersonation_started",
            Self::ImpersonationSessionOpened => "impersonation_session_opened",
            Self::ImpersonationEnded => "impersonation_ended",
        }
    }

    pub fn is_sensitive(&self) -> bool {
        matches!(
            self,
            Self::ImpersonationStarted | Self::ImpersonationSessionOpened | Self::ImpersonationEnded
        )
    }
}

/// Builder for creating audit log entries
#[derive(Debug)]
pub struct AuditEntryBuilder {
    action: AuditAction,
    actor_id: Option<Uuid>,
    actor_email: Option<String>,
    target_user_id: Option<Uuid>,
    session_id: Option<Uuid>,
    metadata: Option<JsonValue>,
}

impl AuditEntryBuilder {
    pub fn new(action: AuditAction) -> Self {
        Self {
            action,
            actor_id: None,
            actor_email: None,
            target_user_id: None,
            session_id: None,
            metadata: None,
        }
    }

    pub fn actor(mut self, id: Uuid, email: Option<String>) -> Self {
        self.actor_id = Some(id);
        self.actor_email = email;
        self
    }

    pub fn target(mut self, user_id: Uuid) -> Self {
        self.target_user_id = Some(user_id);
        self
    }

    pub fn session(mut self, id: Uuid) -> Self {
        self.session_id = Some(id);
        self
    }

    pub fn metadata_json(mut self, metadata: JsonValue) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

impl AuditService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Log an audit entry using the builder
    pub async fn log(&self, entry: AuditEntryBuilder) -> AuditResult<Uuid> {
        let id: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO audit_logs (
                id, action, actor_id, actor_email, target_user_id,
                session_id, metadata, is_sensitive
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.action.as_str())
        .bind(entry.actor_id)
        .bind(&entry.actor_email)
        .bind(entry.target_user_id)
        .bind(entry.session_id)
        .bind(&entry.metadata)
        .bind(entry.action.is_sensitive())
        .fetch_one(&self.pool)
        .await?;

        Ok(id.0)
    }

    /// Like [`AuditService::log`], but a failed write is only logged.
    pub async fn record(&self, entry: AuditEntryBuilder) {
        let action = entry.action;
        if let Err(e) = self.log(entry).await {
            tracing::error!(action = action.as_str(), error = %e, "failed to write audit entry");
        }
    }
}
