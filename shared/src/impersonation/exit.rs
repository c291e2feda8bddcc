use async_trait::async_trait;

use super::error::SignOutError;
use super::store::{KeyValueStore, SessionStateStore};

/// Terminates the active session.
#[async_trait(?Send)]
pub trait SignOut {
    async fn sign_out(&self) -> Result<(), SignOutError>;
}

/// Routes to the unauthenticated entry point.
pub trait Navigator {
    fn to_login(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    SignedOut,
    /// Navigation still happened; the message is for the user.
    SignOutFailed(String),
}

/// Ends an impersonation: clear the record, end the impersonated session,
/// go to login.
///
/// Navigation happens even when sign-out fails.
pub async fn exit_impersonation<S, O, N>(
    store: &SessionStateStore<S>,
    sign_out: &O,
    navigator: &N,
) -> ExitOutcome
where
    S: KeyValueStore,
    O: SignOut + ?Sized,
    N: Navigator + ?Sized,
{
    store.clear_impersonation_state();

    let outcome = match sign_out.sign_out().await {
        Ok(()) => ExitOutcome::SignedOut,
        Err(e) => {
            tracing::warn!(error = %e, "sign-out failed while exiting impersonation");
            ExitOutcome::SignOutFailed(e.to_string())
        }
    };

    navigator.to_login();
    outcome
}
