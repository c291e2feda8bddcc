//! Role-Based Access Control (RBAC)
//!
//! Built-in roles map to resource/action grants:
//! - Admin: everything, including impersonation
//! - Manager: users (read), audit logs (read), sessions
//! - Supervisor / Operator: own profile only
//!
//! Impersonation has its own policy on top of the grants, see
//! [`ImpersonationPolicy`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiResult, AppError};
use garageinn_shared::{User, UserRole};

/// Resources in the system
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Users,
    Sessions,
    AuditLogs,
    /// All resources (admin)
    All,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Sessions => "sessions",
            Self::AuditLogs => "audit_logs",
            Self::All => "*",
        }
    }
}

/// Actions that can be performed on resources
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    /// Act as another user
    Impersonate,
    All,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Impersonate => "impersonate",
            Self::All => "*",
        }
    }
}

/// Permission definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Permission {
    pub resource: Resource,
    pub actions: Vec<Action>,
}

impl Permission {
    fn grants(&self, resource: Resource, action: Action) -> bool {
        let resource_matches = self.resource == Resource::All || self.resource == resource;
        let action_matches = self
            .actions
            .iter()
            .any(|a| *a == Action::All || *a == action);
        resource_matches && action_matches
    }
}

/// Grants for a built-in role.
pub fn role_permissions(role: UserRole) -> Vec<Permission> {
    match role {
        UserRole::Admin => vec![Permission {
            resource: Resource::All,
            actions: vec![Action::All],
        }],
        UserRole::Manager => vec![
            Permission {
                resource: Resource::Users,
                actions: vec![Action::Read],
            },
            Permission {
                resource: Resource::AuditLogs,
                actions: vec![Action::Read],
            },
            Permission {
                resource: Resource::Sessions,
                actions: vec![Action::Read, Action::Delete],
            },
        ],
        UserRole::Supervisor | UserRole::Operator => vec![],
    }
}

pub fn role_can(role: UserRole, resource: Resource, action: Action) -> bool {
    role_permissions(role)
        .iter()
        .any(|p| p.grants(resource, action))
}

/// `Err(InsufficientPermissions)` unless `role` holds `resource:action`.
pub fn require(role: UserRole, resource: Resource, action: Action) -> ApiResult<()> {
    if role_can(role, resource, action) {
        Ok(())
    } else {
        Err(AppError::InsufficientPermissions {
            required: format!("{}:{}", resource.as_str(), action.as_str()),
        })
    }
}

/// The caller asking to impersonate.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: UserRole,
    /// Set when the caller's own session is already an impersonation
    pub impersonated_by: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpersonationDenied {
    SelfTarget,
    Nested,
    NotPermitted,
    InactiveTarget,
    InsufficientRank,
}

impl ImpersonationDenied {
    pub fn message(&self) -> &'static str {
        match self {
            Self::SelfTarget => "You cannot impersonate yourself",
            Self::Nested => "Cannot start an impersonation from an impersonated session",
            Self::NotPermitted => "You do not have permission to impersonate users",
            Self::InactiveTarget => "Cannot impersonate an inactive user",
            Self::InsufficientRank => "Cannot impersonate a user with an equal or higher role",
        }
    }
}

impl From<ImpersonationDenied> for AppError {
    fn from(denied: ImpersonationDenied) -> Self {
        match denied {
            ImpersonationDenied::SelfTarget => AppError::BadRequest(denied.message().to_string()),
            _ => AppError::Forbidden(denied.message().to_string()),
        }
    }
}

/// Who may act as whom.
#[derive(Debug, Clone, Default)]
pub struct ImpersonationPolicy;

impl ImpersonationPolicy {
    pub fn check(&self, actor: &Actor, target: &User) -> Result<(), ImpersonationDenied> {
        if actor.user_id == target.id {
            return Err(ImpersonationDenied::SelfTarget);
        }
        if actor.impersonated_by.is_some() {
            return Err(ImpersonationDenied::Nested);
        }
        if !role_can(actor.role, Resource::Users, Action::Impersonate) {
            return Err(ImpersonationDenied::NotPermitted);
        }
        if !target.is_active {
            return Err(ImpersonationDenied::InactiveTarget);
        }
        if !actor.role.outranks(&target.user_role()) {
            return Err(ImpersonationDenied::InsufficientRank);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            email: format!("{}@garageinn.test", role.as_str()),
            first_name: role.display_name().to_string(),
            last_name: "Test".to_string(),
            password_hash: None,
            role: role.as_str().to_string(),
            department: None,
            is_active: true,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn actor(user: &User) -> Actor {
        Actor {
            user_id: user.id,
            role: user.user_role(),
            impersonated_by: None,
        }
    }

    #[test]
    fn test_admin_has_all_permissions() {
        assert!(role_can(UserRole::Admin, Resource::Users, Action::Impersonate));
        assert!(role_can(UserRole::Admin, Resource::Sessions, Action::Delete));
        assert!(require(UserRole::Admin, Resource::AuditLogs, Action::Read).is_ok());
    }

    #[test]
    fn test_manager_limited_permissions() {
        assert!(role_can(UserRole::Manager, Resource::Users, Action::Read));
        assert!(!role_can(UserRole::Manager, Resource::Users, Action::Impersonate));
        assert!(!role_can(UserRole::Manager, Resource::Users, Action::Delete));

        match require(UserRole::Operator, Resource::Users, Action::Read) {
            Err(AppError::InsufficientPermissions { required }) => {
                assert_eq!(required, "users:read")
            }
            other => panic!("expected InsufficientPermissions, got {:?}", other),
        }
    }

    #[test]
    fn test_admin_may_impersonate_lower_roles() {
        let admin = user(UserRole::Admin);
        let policy = ImpersonationPolicy;
        for role in [UserRole::Manager, UserRole::Supervisor, UserRole::Operator] {
            assert_eq!(policy.check(&actor(&admin), &user(role)), Ok(()));
        }
    }

    #[test]
    fn test_self_impersonation_refused() {
        let admin = user(UserRole::Admin);
        assert_eq!(
            ImpersonationPolicy.check(&actor(&admin), &admin),
            Err(ImpersonationDenied::SelfTarget)
        );
    }

    #[test]
    fn test_nested_impersonation_refused() {
        let admin = user(UserRole::Admin);
        let mut caller = actor(&admin);
        caller.impersonated_by = Some(Uuid::new_v4());
        assert_eq!(
            ImpersonationPolicy.check(&caller, &user(UserRole::Operator)),
            Err(ImpersonationDenied::Nested)
        );
    }

    #[test]
    fn test_equal_role_refused() {
        let admin = user(UserRole::Admin);
        assert_eq!(
            ImpersonationPolicy.check(&actor(&admin), &user(UserRole::Admin)),
            Err(ImpersonationDenied::InsufficientRank)
        );
    }

    #[test]
    fn test_inactive_target_refused() {
        let admin = user(UserRole::Admin);
        let mut target = user(UserRole::Operator);
        target.is_active = false;
        assert_eq!(
            ImpersonationPolicy.check(&actor(&admin), &target),
            Err(ImpersonationDenied::InactiveTarget)
        );
    }

    #[test]
    fn test_manager_cannot_impersonate() {
        let manager = user(UserRole::Manager);
        assert_eq!(
            ImpersonationPolicy.check(&actor(&manager), &user(UserRole::Operator)),
            Err(ImpersonationDenied::NotPermitted)
        );
    }

    #[test]
    fn test_denials_map_to_http_errors() {
        let err: AppError = ImpersonationDenied::InsufficientRank.into();
        assert_eq!(err.error_code(), "FORBIDDEN");
        let err: AppError = ImpersonationDenied::SelfTarget.into();
        assert_eq!(err.error_code(), "BAD_REQUEST");
    }
}
