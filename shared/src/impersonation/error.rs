use thiserror::Error;

/// Failure writing to or deleting from the storage medium.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("failed to write '{key}': {reason}")]
    Write { key: String, reason: String },
    #[error("failed to delete '{key}': {reason}")]
    Delete { key: String, reason: String },
}

/// Errors surfaced by [`ImpersonationService::impersonate_user`].
///
/// [`ImpersonationService::impersonate_user`]: super::ImpersonationService::impersonate_user
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImpersonationError {
    #[error("You must be signed in to impersonate a user")]
    Unauthenticated,
    #[error("You cannot impersonate yourself")]
    SelfImpersonation,
    #[error("Impersonation endpoint is not configured")]
    MisconfiguredEndpoint,
    #[error("{0}")]
    Rejected(String),
    #[error("Impersonation request failed: {0}")]
    Transport(String),
    #[error("Could not save impersonation state: {0}")]
    Storage(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("sign-out failed: {0}")]
pub struct SignOutError(pub String);
