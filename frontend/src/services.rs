// API service layer for communicating with backend
use gloo_net::http::{Request, RequestBuilder, Response};
use gloo_storage::{LocalStorage, Storage};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;

use garageinn_shared::ErrorResponse;

const API_PREFIX: &str = "/api/v1";
const AUTH_TOKEN_KEY: &str = "garageinn_auth_token";

// ============================================
// ERROR HANDLING
// ============================================

#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: Option<u16>,
    pub message: String,
    pub code: Option<String>,
}

impl ApiError {
    fn network(e: impl fmt::Display) -> Self {
        Self {
            status: None,
            message: e.to_string(),
            code: Some("NETWORK_ERROR".to_string()),
        }
    }

    fn parse(e: impl fmt::Display) -> Self {
        Self {
            status: None,
            message: e.to_string(),
            code: Some("PARSE_ERROR".to_string()),
        }
    }

    async fn from_response(response: Response) -> Self {
        let status = response.status();
        let body = response.json::<ErrorResponse>().await.ok();
        Self::from_body(status, body)
    }

    fn from_body(status: u16, body: Option<ErrorResponse>) -> Self {
        let (message, code) = match body {
            Some(body) => (body.error, body.code),
            None => (None, None),
        };
        Self {
            status: Some(status),
            message: message.unwrap_or_else(|| format!("HTTP Error: {}", status)),
            code: code.or_else(|| Some(format!("HTTP_{}", status))),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

// ============================================
// HTTP CLIENT
// ============================================

/// Picks the API origin: a build-time override, else the page's own origin.
pub fn resolve_api_origin(configured: Option<&str>, page_origin: Option<String>) -> Option<String> {
    configured
        .map(|origin| origin.trim().trim_end_matches('/').to_string())
        .filter(|origin| !origin.is_empty())
        .or(page_origin)
}

pub struct ApiClient;

impl ApiClient {
    pub fn get_auth_token() -> Option<String> {
        LocalStorage::get::<String>(AUTH_TOKEN_KEY).ok()
    }

    pub fn set_auth_token(token: &str) {
        if let Err(e) = LocalStorage::set(AUTH_TOKEN_KEY, token) {
            tracing::error!(error = %e, "could not store auth token");
        }
    }

    pub fn clear_auth_token() {
        LocalStorage::delete(AUTH_TOKEN_KEY);
    }

    pub fn api_origin() -> Option<String> {
        let page_origin = web_sys::window().and_then(|w| w.location().origin().ok());
        resolve_api_origin(option_env!("GARAGEINN_API_URL"), page_origin)
    }

    fn url(endpoint: &str) -> String {
        format!("{}{}{}", Self::api_origin().unwrap_or_default(), API_PREFIX, endpoint)
    }

    fn authorized(mut req: RequestBuilder) -> RequestBuilder {
        if let Some(token) = Self::get_auth_token() {
            req = req.header("Authorization", &format!("Bearer {}", token));
        }
        req
    }

    async fn read<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
        if response.ok() {
            response.json::<T>().await.map_err(ApiError::parse)
        } else {
            Err(ApiError::from_response(response).await)
        }
    }

    pub async fn get<T: DeserializeOwned>(endpoint: &str) -> ApiResult<T> {
        let response = Self::authorized(Request::get(&Self::url(endpoint)))
            .send()
            .await
            .map_err(ApiError::network)?;
        Self::read(response).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(endpoint: &str, body: &B) -> ApiResult<T> {
        let response = Self::authorized(Request::post(&Self::url(endpoint)))
            .json(body)
            .map_err(ApiError::parse)?
            .send()
            .await
            .map_err(ApiError::network)?;
        Self::read(response).await
    }

    /// POST without a body, expecting no content back.
    pub async fn post_empty(endpoint: &str) -> ApiResult<()> {
        let response = Self::authorized(Request::post(&Self::url(endpoint)))
            .send()
            .await
            .map_err(ApiError::network)?;

        if response.ok() {
            Ok(())
        } else {
            Err(ApiError::from_response(response).await)
        }
    }
}

// ============================================
// AUTH SERVICE
// ============================================

pub mod auth {
    use super::*;
    use garageinn_shared::{CurrentUserResponse, LoginRequest, LoginResponse, MagicLinkExchange};

    pub async fn login(email: String, password: String) -> ApiResult<LoginResponse> {
        ApiClient::post("/auth/login", &LoginRequest { email, password }).await
    }

    pub async fn me() -> ApiResult<CurrentUserResponse> {
        ApiClient::get("/auth/me").await
    }

    pub async fn logout() -> ApiResult<()> {
        ApiClient::post_empty("/auth/logout").await
    }

    pub async fn exchange_magic_link(token: String) -> ApiResult<LoginResponse> {
        ApiClient::post("/auth/magic-link/verify", &MagicLinkExchange { token }).await
    }
}

// ============================================
// USERS SERVICE
// ============================================

pub mod users {
    use super::*;
    use garageinn_shared::UserSummary;

    pub async fn list() -> ApiResult<Vec<UserSummary>> {
        ApiClient::get("/users").await
    }
}

// ============================================
// IMPERSONATION
// ============================================

pub mod impersonation {
    use super::*;
    use async_trait::async_trait;
    use garageinn_shared::impersonation::{
        ActiveSession, ApiFailure, ImpersonationApi, ImpersonationService, KeyValueStore,
        ServiceConfig, SessionSource, SessionStateStore, SignOut, SignOutError, StoreError,
    };
    use garageinn_shared::{ImpersonateRequest, ImpersonateResponse};
    use yew::Callback;

    /// `localStorage` as a [`KeyValueStore`].
    #[derive(Clone)]
    pub struct BrowserStorage {
        storage: web_sys::Storage,
    }

    impl BrowserStorage {
        /// `None` outside a browser or when storage is disabled.
        pub fn detect() -> Option<Self> {
            let storage = web_sys::window()?.local_storage().ok()??;
            Some(Self { storage })
        }
    }

    impl KeyValueStore for BrowserStorage {
        fn get(&self, key: &str) -> Option<String> {
            self.storage.get_item(key).ok().flatten()
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.storage
                .set_item(key, value)
                .map_err(|e| StoreError::Write {
                    key: key.to_string(),
                    reason: format!("{:?}", e),
                })
        }

        fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.storage.remove_item(key).map_err(|e| StoreError::Delete {
                key: key.to_string(),
                reason: format!("{:?}", e),
            })
        }
    }

    pub fn session_store() -> SessionStateStore<BrowserStorage> {
        match BrowserStorage::detect() {
            Some(storage) => SessionStateStore::new(storage),
            None => SessionStateStore::detached(),
        }
    }

    /// The signed-in user plus the bearer token kept by [`ApiClient`].
    pub struct StoredSession {
        pub user_id: Option<String>,
    }

    #[async_trait(?Send)]
    impl SessionSource for StoredSession {
        async fn active_session(&self) -> Option<ActiveSession> {
            Some(ActiveSession {
                user_id: self.user_id.clone()?,
                access_token: ApiClient::get_auth_token()?,
            })
        }
    }

    pub struct HttpImpersonationApi;

    #[async_trait(?Send)]
    impl ImpersonationApi for HttpImpersonationApi {
        async fn request_link(
            &self,
            url: &str,
            access_token: &str,
            request: &ImpersonateRequest,
        ) -> Result<ImpersonateResponse, ApiFailure> {
            let response = Request::post(url)
                .header("Authorization", &format!("Bearer {}", access_token))
                .json(request)
                .map_err(|e| ApiFailure::Transport(e.to_string()))?
                .send()
                .await
                .map_err(|e| ApiFailure::Transport(e.to_string()))?;

            if !response.ok() {
                let status = response.status();
                let message = response
                    .json::<ErrorResponse>()
                    .await
                    .ok()
                    .and_then(|body| body.error);
                return Err(ApiFailure::Rejected { status, message });
            }

            response
                .json::<ImpersonateResponse>()
                .await
                .map_err(|e| ApiFailure::Transport(format!("invalid response: {}", e)))
        }
    }

    pub type BrowserImpersonationService =
        ImpersonationService<BrowserStorage, StoredSession, HttpImpersonationApi>;

    pub fn service(current_user_id: Option<String>) -> BrowserImpersonationService {
        let config = ApiClient::api_origin()
            .map(ServiceConfig::new)
            .unwrap_or_default();

        ImpersonationService::new(
            session_store(),
            StoredSession {
                user_id: current_user_id,
            },
            HttpImpersonationApi,
            config,
        )
    }

    /// Ends the server session, then drops the local credential whatever the
    /// server said.
    pub struct BrowserSignOut {
        on_signed_out: Callback<()>,
    }

    impl BrowserSignOut {
        pub fn new(on_signed_out: Callback<()>) -> Self {
            Self { on_signed_out }
        }
    }

    #[async_trait(?Send)]
    impl SignOut for BrowserSignOut {
        async fn sign_out(&self) -> Result<(), SignOutError> {
            let result = super::auth::logout().await;
            ApiClient::clear_auth_token();
            self.on_signed_out.emit(());
            result.map_err(|e| SignOutError(e.message))
        }
    }

}
