use serde::{Deserialize, Serialize};

/// Payload stored under the impersonation-data key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpersonationTarget {
    pub impersonated_user_id: String,
    /// Display label only
    pub impersonated_user_name: String,
}

/// In-memory projection of the persisted record.
///
/// `is_impersonating` is only true when a full record exists and, after
/// reconciliation, the signed-in identity is the impersonated user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpersonationState {
    pub is_impersonating: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impersonated_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impersonated_user_name: Option<String>,
}

impl ImpersonationState {
    pub fn inactive() -> Self {
        Self::default()
    }

    pub fn from_record(original_user_id: String, target: ImpersonationTarget) -> Self {
        Self {
            is_impersonating: true,
            original_user_id: Some(original_user_id),
            impersonated_user_id: Some(target.impersonated_user_id),
            impersonated_user_name: Some(target.impersonated_user_name),
        }
    }

    /// Same record, different flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.is_impersonating = active;
        self
    }
}
