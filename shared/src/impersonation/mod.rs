//! Admin "view as user" session state.
//!
//! The pieces, leaves first:
//! - [`store`]: persists who is really signed in vs. who is being viewed as
//! - [`service`]: asks the API for a one-time sign-in link and commits the record
//! - [`reconcile`]: re-derives the in-memory state on every auth change and drops
//!   orphaned records
//! - [`exit`]: clears the record, signs out, and returns to the login page
//!
//! Everything here is host-agnostic. Storage, HTTP, sign-out and navigation are
//! traits so the web client can plug in the browser and tests can plug in fakes.

pub mod error;
pub mod exit;
pub mod reconcile;
pub mod service;
pub mod state;
pub mod store;

pub use error::{ImpersonationError, SignOutError, StoreError};
pub use exit::{exit_impersonation, ExitOutcome, Navigator, SignOut};
pub use reconcile::{
    attach_reconciler, reconcile, AuthBroadcast, AuthObserver, AuthSnapshot, Reconciler,
    Reconciliation, Subscription,
};
pub use service::{
    ActiveSession, ApiFailure, ImpersonationApi, ImpersonationService, ServiceConfig,
    SessionSource,
};
pub use state::{ImpersonationState, ImpersonationTarget};
pub use store::{KeyValueStore, MemoryStore, SessionStateStore};
