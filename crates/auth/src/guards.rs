//! Navigation guards run before every route transition.
//!
//! Guards are evaluated in a fixed order. Each one either lets the
//! transition continue or replaces it with a redirect; the first redirect
//! ends the pipeline.

use std::collections::BTreeMap;

use crate::route::{Location, full_path};
use crate::{Authorizer, Requirement};

/// Path of the login page.
pub const LOGIN_PATH: &str = "/auth/login";

/// Route name of the access-denied page.
pub const ACCESS_DENIED_ROUTE: &str = "accessDenied";

/// Query parameter carrying the originally requested path to the login page.
pub const REDIRECT_QUERY_KEY: &str = "redirect";

/// Where a redirect points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationTarget {
    Path {
        path: String,
        query: BTreeMap<String, String>,
    },
    Named(String),
}

impl NavigationTarget {
    pub fn path(path: impl Into<String>) -> Self {
        Self::Path {
            path: path.into(),
            query: BTreeMap::new(),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

impl core::fmt::Display for NavigationTarget {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            NavigationTarget::Path { path, query } => f.write_str(&full_path(path, query)),
            NavigationTarget::Named(name) => write!(f, "{{name: {name}}}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Proceed,
    Redirect(NavigationTarget),
}

pub trait NavigationGuard: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(&self, from: Option<&Location>, to: &Location, session: &dyn Authorizer) -> GuardOutcome;
}

/// Sends anonymous users to the login page, remembering where they wanted to go.
#[derive(Debug, Clone)]
pub struct AuthGuard {
    login_path: String,
}

impl AuthGuard {
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
        }
    }
}

impl Default for AuthGuard {
    fn default() -> Self {
        Self::new(LOGIN_PATH)
    }
}

impl NavigationGuard for AuthGuard {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn check(&self, _from: Option<&Location>, to: &Location, session: &dyn Authorizer) -> GuardOutcome {
        if !to.requires_auth() || session.is_authenticated() {
            return GuardOutcome::Proceed;
        }

        let mut query = BTreeMap::new();
        query.insert(REDIRECT_QUERY_KEY.to_string(), to.full_path.clone());
        GuardOutcome::Redirect(NavigationTarget::Path {
            path: self.login_path.clone(),
            query,
        })
    }
}

/// Enforces `requiresPermissions` and `requiresRoles` of the target route.
///
/// Several permissions must *all* be held; several roles need only *one*.
#[derive(Debug, Clone)]
pub struct PermissionGuard {
    access_denied: String,
}

impl PermissionGuard {
    pub fn new(access_denied_route: impl Into<String>) -> Self {
        Self {
            access_denied: access_denied_route.into(),
        }
    }

    fn permissions_ok(required: &Requirement, session: &dyn Authorizer) -> bool {
        match required {
            Requirement::One(p) => session.has_permission(p),
            Requirement::Many(_) => session.has_all_permissions(&required.values()),
        }
    }

    fn roles_ok(required: &Requirement, session: &dyn Authorizer) -> bool {
        match required {
            Requirement::One(r) => session.has_role(r),
            Requirement::Many(_) => session.has_any_role(&required.values()),
        }
    }
}

impl Default for PermissionGuard {
    fn default() -> Self {
        Self::new(ACCESS_DENIED_ROUTE)
    }
}

impl NavigationGuard for PermissionGuard {
    fn name(&self) -> &'static str {
        "permission"
    }

    fn check(&self, _from: Option<&Location>, to: &Location, session: &dyn Authorizer) -> GuardOutcome {
        let Some(meta) = to.meta() else {
            return GuardOutcome::Proceed;
        };

        let denied = meta
            .requires_permissions
            .as_ref()
            .filter(|p| !p.is_blank())
            .is_some_and(|p| !Self::permissions_ok(p, session))
            || meta
                .requires_roles
                .as_ref()
                .filter(|r| !r.is_blank())
                .is_some_and(|r| !Self::roles_ok(r, session));

        if denied {
            GuardOutcome::Redirect(NavigationTarget::named(self.access_denied.clone()))
        } else {
            GuardOutcome::Proceed
        }
    }
}

/// Ordered list of guards.
pub struct GuardPipeline {
    guards: Vec<Box<dyn NavigationGuard>>,
}

impl GuardPipeline {
    pub fn empty() -> Self {
        Self { guards: Vec::new() }
    }

    /// Auth guard first, then the permission guard.
    pub fn standard(login_path: impl Into<String>, access_denied_route: impl Into<String>) -> Self {
        Self::empty()
            .with(AuthGuard::new(login_path))
            .with(PermissionGuard::new(access_denied_route))
    }

    pub fn with(mut self, guard: impl NavigationGuard + 'static) -> Self {
        self.guards.push(Box::new(guard));
        self
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    pub fn run(&self, from: Option<&Location>, to: &Location, session: &dyn Authorizer) -> GuardOutcome {
        for guard in &self.guards {
            if let GuardOutcome::Redirect(target) = guard.check(from, to, session) {
                tracing::debug!(guard = guard.name(), to = %to.full_path, target = %target, "navigation redirected");
                return GuardOutcome::Redirect(target);
            }
        }
        GuardOutcome::Proceed
    }
}

impl Default for GuardPipeline {
    fn default() -> Self {
        Self::standard(LOGIN_PATH, ACCESS_DENIED_ROUTE)
    }
}
