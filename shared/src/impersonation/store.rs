//! Durable storage of the impersonation record.
//!
//! Two fixed keys: one holds the admin's user id as a plain string, the other a
//! JSON [`ImpersonationTarget`]. Readers only see a record when both are present
//! and well formed.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::error::StoreError;
use super::state::{ImpersonationState, ImpersonationTarget};

pub const ORIGINAL_SESSION_KEY: &str = "garageinn.original_session";
pub const IMPERSONATION_DATA_KEY: &str = "garageinn.impersonation_data";

/// String key-value storage medium.
///
/// Reads never fail: an unreadable value is reported as absent.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// In-process storage. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.values.borrow_mut().remove(key);
        Ok(())
    }
}

/// Owner of the persisted impersonation record.
///
/// A store built with [`SessionStateStore::detached`] has no medium (for
/// example when running outside a browser): reads are empty and writes are
/// silently dropped.
#[derive(Debug, Clone)]
pub struct SessionStateStore<S> {
    medium: Option<S>,
}

impl<S: KeyValueStore> SessionStateStore<S> {
    pub fn new(medium: S) -> Self {
        Self {
            medium: Some(medium),
        }
    }

    pub fn detached() -> Self {
        Self { medium: None }
    }

    pub fn is_attached(&self) -> bool {
        self.medium.is_some()
    }

    pub fn store_original_session(&self, user_id: &str) -> Result<(), StoreError> {
        match &self.medium {
            Some(medium) => medium.set(ORIGINAL_SESSION_KEY, user_id),
            None => Ok(()),
        }
    }

    pub fn original_session(&self) -> Option<String> {
        self.medium.as_ref()?.get(ORIGINAL_SESSION_KEY)
    }

    pub fn set_impersonation_state(
        &self,
        user_id: &str,
        user_name: &str,
    ) -> Result<(), StoreError> {
        let Some(medium) = &self.medium else {
            return Ok(());
        };

        let payload = ImpersonationTarget {
            impersonated_user_id: user_id.to_string(),
            impersonated_user_name: user_name.to_string(),
        };
        let encoded = serde_json::to_string(&payload).map_err(|e| StoreError::Write {
            key: IMPERSONATION_DATA_KEY.to_string(),
            reason: e.to_string(),
        })?;

        medium.set(IMPERSONATION_DATA_KEY, &encoded)
    }

    pub fn impersonation_state(&self) -> ImpersonationState {
        let Some(medium) = &self.medium else {
            return ImpersonationState::inactive();
        };

        let (Some(original), Some(raw)) = (
            medium.get(ORIGINAL_SESSION_KEY),
            medium.get(IMPERSONATION_DATA_KEY),
        ) else {
            return ImpersonationState::inactive();
        };

        match serde_json::from_str::<ImpersonationTarget>(&raw) {
            Ok(target) => ImpersonationState::from_record(original, target),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring malformed impersonation data");
                ImpersonationState::inactive()
            }
        }
    }

    pub fn is_impersonating(&self) -> bool {
        self.impersonation_state().is_impersonating
    }

    /// Removes both keys. Safe to call repeatedly.
    pub fn clear_impersonation_state(&self) {
        let Some(medium) = &self.medium else {
            return;
        };

        for key in [ORIGINAL_SESSION_KEY, IMPERSONATION_DATA_KEY] {
            if let Err(e) = medium.delete(key) {
                tracing::warn!(error = %e, "failed to clear impersonation key");
            }
        }
    }

    /// Writes the admin id and the target pair as one unit.
    ///
    /// If the target write fails the admin key is put back the way it was, so
    /// readers never observe a half-written record.
    pub fn commit_impersonation(
        &self,
        original_user_id: &str,
        target_user_id: &str,
        target_user_name: &str,
    ) -> Result<(), StoreError> {
        let Some(medium) = &self.medium else {
            return Ok(());
        };

        let previous = medium.get(ORIGINAL_SESSION_KEY);
        self.store_original_session(original_user_id)?;

        if let Err(e) = self.set_impersonation_state(target_user_id, target_user_name) {
            let restored = match &previous {
                Some(value) => medium.set(ORIGINAL_SESSION_KEY, value),
                None => medium.delete(ORIGINAL_SESSION_KEY),
            };
            if let Err(rollback) = restored {
                tracing::error!(error = %rollback, "failed to roll back original session key");
            }
            return Err(e);
        }

        tracing::info!(
            original_user_id,
            target_user_id,
            "impersonation state committed"
        );
        Ok(())
    }
}
