//! Keeping the in-memory impersonation state honest.
//!
//! Every time the auth observer reports a change, the persisted record is
//! compared against the identity that is actually signed in. Records that
//! mention neither the signed-in user nor the admin behind them are orphaned
//! (e.g. after an unrelated logout/login) and get deleted.

use std::cell::RefCell;
use std::rc::Rc;

use super::state::ImpersonationState;
use super::store::{KeyValueStore, SessionStateStore};

/// What the auth observer currently knows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSnapshot {
    /// Signed-in user id, if any
    pub user_id: Option<String>,
    pub is_loading: bool,
}

impl AuthSnapshot {
    pub fn loading() -> Self {
        Self {
            user_id: None,
            is_loading: true,
        }
    }

    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            is_loading: false,
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Identity not known yet; keep whatever state is current.
    Deferred,
    Adopt(ImpersonationState),
    /// Record is unrelated to the signed-in identity; delete it.
    Orphaned,
}

/// Decides what the current state should be. Pure; touches no storage.
pub fn reconcile(
    saved: ImpersonationState,
    identity: Option<&str>,
    is_loading: bool,
) -> Reconciliation {
    if is_loading {
        return Reconciliation::Deferred;
    }

    if !saved.is_impersonating {
        return Reconciliation::Adopt(saved);
    }

    // No user after loading: keep the record rather than risk dropping it
    // during session hydration.
    let Some(user_id) = identity else {
        return Reconciliation::Adopt(saved);
    };

    let is_target = saved.impersonated_user_id.as_deref() == Some(user_id);
    let is_original = saved.original_user_id.as_deref() == Some(user_id);

    if !is_target && !is_original {
        return Reconciliation::Orphaned;
    }

    Reconciliation::Adopt(saved.with_active(is_target))
}

/// Owns the in-memory projection and applies [`reconcile`] against a store.
pub struct Reconciler<S> {
    store: SessionStateStore<S>,
    current: ImpersonationState,
}

impl<S: KeyValueStore> Reconciler<S> {
    pub fn new(store: SessionStateStore<S>) -> Self {
        Self {
            store,
            current: ImpersonationState::inactive(),
        }
    }

    pub fn state(&self) -> &ImpersonationState {
        &self.current
    }

    pub fn store(&self) -> &SessionStateStore<S> {
        &self.store
    }

    /// Re-reads the store and recomputes the state in full.
    pub fn observe(&mut self, snapshot: &AuthSnapshot) -> &ImpersonationState {
        let saved = self.store.impersonation_state();

        match reconcile(saved, snapshot.user_id.as_deref(), snapshot.is_loading) {
            Reconciliation::Deferred => {}
            Reconciliation::Adopt(state) => self.current = state,
            Reconciliation::Orphaned => {
                tracing::info!(
                    user_id = snapshot.user_id.as_deref().unwrap_or_default(),
                    "discarding orphaned impersonation state"
                );
                self.store.clear_impersonation_state();
                self.current = ImpersonationState::inactive();
            }
        }

        &self.current
    }
}

pub type Listener = Rc<dyn Fn(&AuthSnapshot)>;

/// Handle returned by [`AuthObserver::subscribe`]. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// Something that reports authentication changes.
pub trait AuthObserver {
    fn snapshot(&self) -> AuthSnapshot;
    fn subscribe(&self, listener: Listener) -> Subscription;
}

#[derive(Default)]
struct BroadcastInner {
    current: AuthSnapshot,
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// In-process [`AuthObserver`]: whoever owns the session calls
/// [`AuthBroadcast::publish`]. Clones share listeners.
#[derive(Clone, Default)]
pub struct AuthBroadcast {
    inner: Rc<RefCell<BroadcastInner>>,
}

impl AuthBroadcast {
    pub fn new(initial: AuthSnapshot) -> Self {
        let broadcast = Self::default();
        broadcast.inner.borrow_mut().current = initial;
        broadcast
    }

    pub fn publish(&self, snapshot: AuthSnapshot) {
        // Listeners may subscribe or unsubscribe while being notified.
        let listeners: Vec<Listener> = {
            let mut inner = self.inner.borrow_mut();
            inner.current = snapshot.clone();
            inner.listeners.iter().map(|(_, l)| l.clone()).collect()
        };

        for listener in listeners {
            listener(&snapshot);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }
}

impl AuthObserver for AuthBroadcast {
    fn snapshot(&self) -> AuthSnapshot {
        self.inner.borrow().current.clone()
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push((id, listener));
            id
        };

        let inner = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.borrow_mut().listeners.retain(|(lid, _)| *lid != id);
            }
        })
    }
}

/// Runs `reconciler` now (initial load) and on every change `observer`
/// reports, handing each resulting state to `on_change`.
pub fn attach_reconciler<O, S>(
    observer: &O,
    reconciler: Rc<RefCell<Reconciler<S>>>,
    on_change: impl Fn(&ImpersonationState) + 'static,
) -> Subscription
where
    O: AuthObserver,
    S: KeyValueStore + 'static,
{
    let run = move |snapshot: &AuthSnapshot| {
        let state = reconciler.borrow_mut().observe(snapshot).clone();
        on_change(&state);
    };

    run(&observer.snapshot());
    observer.subscribe(Rc::new(run))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impersonation::store::MemoryStore;
    use std::cell::Cell;

    fn a_viewing_b() -> ImpersonationState {
        ImpersonationState {
            is_impersonating: true,
            original_user_id: Some("A".to_string()),
            impersonated_user_id: Some("B".to_string()),
            impersonated_user_name: Some("Bruno".to_string()),
        }
    }

    fn seeded_store() -> (MemoryStore, SessionStateStore<MemoryStore>) {
        let medium = MemoryStore::new();
        let store = SessionStateStore::new(medium.clone());
        store.commit_impersonation("A", "B", "Bruno").unwrap();
        (medium, store)
    }

    #[test]
    fn test_reconcile_target_identity_is_impersonating() {
        assert_eq!(
            reconcile(a_viewing_b(), Some("B"), false),
            Reconciliation::Adopt(a_viewing_b())
        );
    }

    #[test]
    fn test_reconcile_admin_identity_keeps_record_inactive() {
        assert_eq!(
            reconcile(a_viewing_b(), Some("A"), false),
            Reconciliation::Adopt(a_viewing_b().with_active(false))
        );
    }

    #[test]
    fn test_reconcile_unrelated_identity_is_orphaned() {
        assert_eq!(
            reconcile(a_viewing_b(), Some("C"), false),
            Reconciliation::Orphaned
        );
    }

    #[test]
    fn test_reconcile_waits_for_loading() {
        assert_eq!(reconcile(a_viewing_b(), None, true), Reconciliation::Deferred);
        assert_eq!(reconcile(a_viewing_b(), Some("C"), true), Reconciliation::Deferred);
    }

    #[test]
    fn test_reconcile_without_identity_keeps_saved_state() {
        assert_eq!(
            reconcile(a_viewing_b(), None, false),
            Reconciliation::Adopt(a_viewing_b())
        );
    }

    #[test]
    fn test_reconcile_inactive_saved_state_is_adopted() {
        assert_eq!(
            reconcile(ImpersonationState::inactive(), Some("C"), false),
            Reconciliation::Adopt(ImpersonationState::inactive())
        );
    }

    #[test]
    fn test_reconciler_clears_orphaned_record() {
        let (medium, store) = seeded_store();
        let mut reconciler = Reconciler::new(store);

        let state = reconciler.observe(&AuthSnapshot::signed_in("C")).clone();
        assert_eq!(state, ImpersonationState::inactive());
        assert!(medium.is_empty());
    }

    #[test]
    fn test_reconciler_retains_record_for_admin() {
        let (medium, store) = seeded_store();
        let mut reconciler = Reconciler::new(store);

        let state = reconciler.observe(&AuthSnapshot::signed_in("A")).clone();
        assert!(!state.is_impersonating);
        assert_eq!(state.impersonated_user_id.as_deref(), Some("B"));
        assert!(!medium.is_empty());

        // Idempotent on repeat.
        let again = reconciler.observe(&AuthSnapshot::signed_in("A")).clone();
        assert_eq!(state, again);
    }

    #[test]
    fn test_reconciler_deferred_keeps_previous_state_and_storage() {
        let (medium, store) = seeded_store();
        let mut reconciler = Reconciler::new(store);

        reconciler.observe(&AuthSnapshot::signed_in("B"));
        assert!(reconciler.state().is_impersonating);

        let state = reconciler.observe(&AuthSnapshot::loading()).clone();
        assert!(state.is_impersonating);
        assert!(!medium.is_empty());
    }

    #[test]
    fn test_broadcast_drives_reconciler() {
        let (medium, store) = seeded_store();
        let broadcast = AuthBroadcast::new(AuthSnapshot::loading());
        let reconciler = Rc::new(RefCell::new(Reconciler::new(store)));

        let seen = Rc::new(RefCell::new(Vec::<bool>::new()));
        let subscription = {
            let seen = seen.clone();
            attach_reconciler(&broadcast, reconciler.clone(), move |state| {
                seen.borrow_mut().push(state.is_impersonating)
            })
        };

        // Initial run while loading: nothing adopted yet.
        assert_eq!(*seen.borrow(), vec![false]);

        broadcast.publish(AuthSnapshot::signed_in("B"));
        assert_eq!(*seen.borrow(), vec![false, true]);

        broadcast.publish(AuthSnapshot::signed_in("C"));
        assert_eq!(*seen.borrow(), vec![false, true, false]);
        assert!(medium.is_empty());

        assert_eq!(broadcast.listener_count(), 1);
        drop(subscription);
        assert_eq!(broadcast.listener_count(), 0);

        broadcast.publish(AuthSnapshot::signed_in("B"));
        assert_eq!(seen.borrow().len(), 3);
    }

    #[test]
    fn test_listener_may_unsubscribe_during_publish() {
        let broadcast = AuthBroadcast::default();
        let calls = Rc::new(Cell::new(0));
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let subscription = {
            let calls = calls.clone();
            let slot = slot.clone();
            broadcast.subscribe(Rc::new(move |_| {
                calls.set(calls.get() + 1);
                if let Some(sub) = slot.borrow_mut().take() {
                    sub.unsubscribe();
                }
            }))
        };
        *slot.borrow_mut() = Some(subscription);

        broadcast.publish(AuthSnapshot::signed_out());
        broadcast.publish(AuthSnapshot::signed_out());
        assert_eq!(calls.get(), 1);
        assert_eq!(broadcast.listener_count(), 0);
    }
}
