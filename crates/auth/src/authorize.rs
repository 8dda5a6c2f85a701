use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{Permission, Role};

/// Roles and permissions granted to the current user, as last cached.
///
/// Every query is a pure set operation:
/// - No IO
/// - No panics
/// - Never "loading": a stale answer is the caller's problem to refresh
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grants {
    roles: HashSet<Role>,
    permissions: HashSet<Permission>,
}

impl Grants {
    pub fn new(
        roles: impl IntoIterator<Item = Role>,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        Self {
            roles: roles.into_iter().collect(),
            permissions: permissions.into_iter().collect(),
        }
    }

    pub fn roles(&self) -> &HashSet<Role> {
        &self.roles
    }

    pub fn permissions(&self) -> &HashSet<Permission> {
        &self.permissions
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty() && self.permissions.is_empty()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// True iff at least one of `roles` is held.
    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|r| self.roles.contains(*r))
    }

    /// True iff every one of `roles` is held (vacuously true for none).
    pub fn has_all_roles(&self, roles: &[&str]) -> bool {
        roles.iter().all(|r| self.roles.contains(*r))
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Subset check; an empty request is trivially satisfied.
    pub fn has_all_permissions(&self, permissions: &[&str]) -> bool {
        permissions.iter().all(|p| self.permissions.contains(*p))
    }

    /// Intersection check; an empty request never matches.
    pub fn has_any_permission(&self, permissions: &[&str]) -> bool {
        permissions.iter().any(|p| self.permissions.contains(*p))
    }
}

/// Authorization queries answered by whoever owns the current session.
///
/// Guards and visibility bindings only ever see this trait, so they never
/// reach into credential storage themselves.
pub trait Authorizer {
    fn is_authenticated(&self) -> bool;
    fn has_role(&self, role: &str) -> bool;
    fn has_any_role(&self, roles: &[&str]) -> bool;
    fn has_permission(&self, permission: &str) -> bool;
    fn has_all_permissions(&self, permissions: &[&str]) -> bool;
    fn has_any_permission(&self, permissions: &[&str]) -> bool;
}

/// A detached view of a session: authentication status plus grants.
///
/// Handy when a decision must be made against a frozen snapshot rather than
/// live session state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    pub authenticated: bool,
    pub grants: Grants,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(grants: Grants) -> Self {
        Self {
            authenticated: true,
            grants,
        }
    }
}

impl Authorizer for AuthContext {
    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    fn has_role(&self, role: &str) -> bool {
        self.grants.has_role(role)
    }

    fn has_any_role(&self, roles: &[&str]) -> bool {
        self.grants.has_any_role(roles)
    }

    fn has_permission(&self, permission: &str) -> bool {
        self.grants.has_permission(permission)
    }

    fn has_all_permissions(&self, permissions: &[&str]) -> bool {
        self.grants.has_all_permissions(permissions)
    }

    fn has_any_permission(&self, permissions: &[&str]) -> bool {
        self.grants.has_any_permission(permissions)
    }
}
