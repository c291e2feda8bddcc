pub mod api_auth;
pub mod api_impersonation;
