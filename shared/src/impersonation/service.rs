//! Starting an impersonation.

use async_trait::async_trait;

use super::error::ImpersonationError;
use super::store::{KeyValueStore, SessionStateStore};
use crate::api::{ImpersonateRequest, ImpersonateResponse, IMPERSONATE_PATH};

/// Message used when the API refuses without saying why.
pub const REJECTED_FALLBACK_MESSAGE: &str = "Failed to impersonate user";

/// The caller's live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub user_id: String,
    pub access_token: String,
}

/// Source of the currently authenticated session.
#[async_trait(?Send)]
pub trait SessionSource {
    async fn active_session(&self) -> Option<ActiveSession>;
}

/// Why the impersonation endpoint did not produce a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiFailure {
    /// Non-2xx response, with the body's `error` message if any
    Rejected { status: u16, message: Option<String> },
    /// No usable response at all
    Transport(String),
}

/// Transport to the impersonation endpoint.
#[async_trait(?Send)]
pub trait ImpersonationApi {
    async fn request_link(
        &self,
        url: &str,
        access_token: &str,
        request: &ImpersonateRequest,
    ) -> Result<ImpersonateResponse, ApiFailure>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceConfig {
    /// API origin, e.g. `https://ops.garageinn.com.br`
    pub api_base_url: Option<String>,
}

impl ServiceConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: Some(api_base_url.into()),
        }
    }

    /// Full endpoint URL, or `None` when no usable base URL is configured.
    pub fn endpoint(&self) -> Option<String> {
        let base = self.api_base_url.as_deref()?.trim().trim_end_matches('/');
        if base.is_empty() {
            return None;
        }
        Some(format!("{}{}", base, IMPERSONATE_PATH))
    }
}

pub struct ImpersonationService<S, Src, Api> {
    store: SessionStateStore<S>,
    sessions: Src,
    api: Api,
    config: ServiceConfig,
}

impl<S, Src, Api> ImpersonationService<S, Src, Api>
where
    S: KeyValueStore,
    Src: SessionSource,
    Api: ImpersonationApi,
{
    pub fn new(
        store: SessionStateStore<S>,
        sessions: Src,
        api: Api,
        config: ServiceConfig,
    ) -> Self {
        Self {
            store,
            sessions,
            api,
            config,
        }
    }

    pub fn store(&self) -> &SessionStateStore<S> {
        &self.store
    }

    /// Asks the API for a one-time sign-in link for `target_user_id` and, on
    /// success, records `current_user_id` as the original identity.
    ///
    /// All precondition failures return before any request is made. Refusals
    /// are never retried and leave the store untouched. The caller is expected
    /// to follow the returned link.
    pub async fn impersonate_user(
        &self,
        target_user_id: &str,
        current_user_id: &str,
    ) -> Result<ImpersonateResponse, ImpersonationError> {
        if target_user_id == current_user_id {
            return Err(ImpersonationError::SelfImpersonation);
        }

        let session = self
            .sessions
            .active_session()
            .await
            .ok_or(ImpersonationError::Unauthenticated)?;

        let url = self
            .config
            .endpoint()
            .ok_or(ImpersonationError::MisconfiguredEndpoint)?;

        let request = ImpersonateRequest {
            target_user_id: target_user_id.to_string(),
        };

        let response = match self
            .api
            .request_link(&url, &session.access_token, &request)
            .await
        {
            Ok(response) => response,
            Err(ApiFailure::Rejected { status, message }) => {
                let message = message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| REJECTED_FALLBACK_MESSAGE.to_string());
                tracing::warn!(status, target_user_id, %message, "impersonation rejected");
                return Err(ImpersonationError::Rejected(message));
            }
            Err(ApiFailure::Transport(reason)) => {
                tracing::warn!(target_user_id, %reason, "impersonation request failed");
                return Err(ImpersonationError::Transport(reason));
            }
        };

        self.store.commit_impersonation(
            current_user_id,
            &response.target_user.id,
            &response.target_user.name,
        )?;

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TargetUser;
    use crate::impersonation::error::StoreError;
    use crate::impersonation::store::{IMPERSONATION_DATA_KEY, MemoryStore, ORIGINAL_SESSION_KEY};
    use std::cell::{Cell, RefCell};

    struct FixedSession(Option<ActiveSession>);

    #[async_trait(?Send)]
    impl SessionSource for FixedSession {
        async fn active_session(&self) -> Option<ActiveSession> {
            self.0.clone()
        }
    }

    struct ScriptedApi {
        reply: Result<ImpersonateResponse, ApiFailure>,
        calls: Cell<usize>,
        seen: RefCell<Option<(String, String, ImpersonateRequest)>>,
    }

    impl ScriptedApi {
        fn replying(reply: Result<ImpersonateResponse, ApiFailure>) -> Self {
            Self {
                reply,
                calls: Cell::new(0),
                seen: RefCell::new(None),
            }
        }
    }

    #[async_trait(?Send)]
    impl<'a> ImpersonationApi for &'a ScriptedApi {
        async fn request_link(
            &self,
            url: &str,
            access_token: &str,
            request: &ImpersonateRequest,
        ) -> Result<ImpersonateResponse, ApiFailure> {
            self.calls.set(self.calls.get() + 1);
            *self.seen.borrow_mut() =
                Some((url.to_string(), access_token.to_string(), request.clone()));
            self.reply.clone()
        }
    }

    fn admin_session() -> FixedSession {
        FixedSession(Some(ActiveSession {
            user_id: "admin-1".to_string(),
            access_token: "tok-admin".to_string(),
        }))
    }

    fn granted() -> ImpersonateResponse {
        ImpersonateResponse {
            link: "https://ops.garageinn.test/auth/magic-link?token=xyz".to_string(),
            target_user: TargetUser {
                id: "user-7".to_string(),
                name: "Carla Dias".to_string(),
                email: "carla@garageinn.test".to_string(),
            },
        }
    }

    fn service<'a>(
        medium: &MemoryStore,
        session: FixedSession,
        api: &'a ScriptedApi,
        config: ServiceConfig,
    ) -> ImpersonationService<MemoryStore, FixedSession, &'a ScriptedApi> {
        ImpersonationService::new(SessionStateStore::new(medium.clone()), session, api, config)
    }

    /// Accepts the admin key, refuses the payload key.
    #[derive(Clone)]
    struct PayloadRefusingStore(MemoryStore);

    impl KeyValueStore for PayloadRefusingStore {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            if key == IMPERSONATION_DATA_KEY {
                return Err(StoreError::Write {
                    key: key.to_string(),
                    reason: "quota exceeded".to_string(),
                });
            }
            self.0.set(key, value)
        }

        fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.0.delete(key)
        }
    }

    #[test]
    fn test_endpoint_resolution() {
        assert_eq!(
            ServiceConfig::new("https://ops.garageinn.test/").endpoint().as_deref(),
            Some("https://ops.garageinn.test/api/v1/admin/impersonate")
        );
        assert_eq!(ServiceConfig::new("   ").endpoint(), None);
        assert_eq!(ServiceConfig::default().endpoint(), None);
    }

    #[tokio::test]
    async fn test_self_impersonation_makes_no_request() {
        let medium = MemoryStore::new();
        let api = ScriptedApi::replying(Ok(granted()));
        let svc = service(&medium, admin_session(), &api, ServiceConfig::new("http://api"));

        let err = svc.impersonate_user("admin-1", "admin-1").await.unwrap_err();
        assert_eq!(err, ImpersonationError::SelfImpersonation);
        assert_eq!(api.calls.get(), 0);

        // Self checks come first, even without a session.
        let svc = service(&medium, FixedSession(None), &api, ServiceConfig::default());
        let err = svc.impersonate_user("x", "x").await.unwrap_err();
        assert_eq!(err, ImpersonationError::SelfImpersonation);
        assert_eq!(api.calls.get(), 0);
    }

    #[tokio::test]
    async fn test_missing_session_is_unauthenticated() {
        let medium = MemoryStore::new();
        let api = ScriptedApi::replying(Ok(granted()));
        let svc = service(&medium, FixedSession(None), &api, ServiceConfig::new("http://api"));

        let err = svc.impersonate_user("user-7", "admin-1").await.unwrap_err();
        assert_eq!(err, ImpersonationError::Unauthenticated);
        assert_eq!(api.calls.get(), 0);
        assert!(medium.is_empty());
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_misconfigured() {
        let medium = MemoryStore::new();
        let api = ScriptedApi::replying(Ok(granted()));
        let svc = service(&medium, admin_session(), &api, ServiceConfig::default());

        let err = svc.impersonate_user("user-7", "admin-1").await.unwrap_err();
        assert_eq!(err, ImpersonationError::MisconfiguredEndpoint);
        assert_eq!(api.calls.get(), 0);
    }

    #[tokio::test]
    async fn test_rejection_carries_backend_message_and_leaves_store_alone() {
        let medium = MemoryStore::new();
        let api = ScriptedApi::replying(Err(ApiFailure::Rejected {
            status: 403,
            message: Some("Cannot impersonate a user with an equal or higher role".to_string()),
        }));
        let svc = service(&medium, admin_session(), &api, ServiceConfig::new("http://api"));

        let err = svc.impersonate_user("user-7", "admin-1").await.unwrap_err();
        assert_eq!(
            err,
            ImpersonationError::Rejected(
                "Cannot impersonate a user with an equal or higher role".to_string()
            )
        );
        assert_eq!(api.calls.get(), 1);
        assert!(medium.is_empty());
    }

    #[tokio::test]
    async fn test_rejection_without_message_uses_fallback() {
        let medium = MemoryStore::new();
        let api = ScriptedApi::replying(Err(ApiFailure::Rejected {
            status: 500,
            message: None,
        }));
        let svc = service(&medium, admin_session(), &api, ServiceConfig::new("http://api"));

        let err = svc.impersonate_user("user-7", "admin-1").await.unwrap_err();
        assert_eq!(
            err,
            ImpersonationError::Rejected(REJECTED_FALLBACK_MESSAGE.to_string())
        );
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_store_alone() {
        let medium = MemoryStore::new();
        let api = ScriptedApi::replying(Err(ApiFailure::Transport("offline".to_string())));
        let svc = service(&medium, admin_session(), &api, ServiceConfig::new("http://api"));

        let err = svc.impersonate_user("user-7", "admin-1").await.unwrap_err();
        assert_eq!(err, ImpersonationError::Transport("offline".to_string()));
        assert!(medium.is_empty());
    }

    #[tokio::test]
    async fn test_success_commits_record_and_returns_link() {
        let medium = MemoryStore::new();
        let api = ScriptedApi::replying(Ok(granted()));
        let svc = service(&medium, admin_session(), &api, ServiceConfig::new("http://api/"));

        let response = svc.impersonate_user("user-7", "admin-1").await.unwrap();
        assert_eq!(response, granted());

        let (url, token, body) = api.seen.borrow().clone().unwrap();
        assert_eq!(url, "http://api/api/v1/admin/impersonate");
        assert_eq!(token, "tok-admin");
        assert_eq!(body.target_user_id, "user-7");

        let state = svc.store().impersonation_state();
        assert!(state.is_impersonating);
        assert_eq!(state.original_user_id.as_deref(), Some("admin-1"));
        assert_eq!(state.impersonated_user_id.as_deref(), Some("user-7"));
        assert_eq!(state.impersonated_user_name.as_deref(), Some("Carla Dias"));
    }

    #[tokio::test]
    async fn test_failed_commit_surfaces_storage_error_without_partial_record() {
        let medium = MemoryStore::new();
        let api = ScriptedApi::replying(Ok(granted()));
        let svc = ImpersonationService::new(
            SessionStateStore::new(PayloadRefusingStore(medium.clone())),
            admin_session(),
            &api,
            ServiceConfig::new("http://api/"),
        );

        let err = svc.impersonate_user("user-7", "admin-1").await.unwrap_err();
        assert!(matches!(err, ImpersonationError::Storage(StoreError::Write { .. })));
        assert_eq!(api.calls.get(), 1);
        assert_eq!(medium.get(ORIGINAL_SESSION_KEY), None);
        assert_eq!(medium.get(IMPERSONATION_DATA_KEY), None);
        assert!(!svc.store().is_impersonating());
    }
}
