//! `assursuite-auth`: pure authorization boundary for the admin client.
//!
//! Nothing here performs IO: token claims are decoded, grants are queried,
//! routes are resolved and guarded, and visibility bindings are evaluated
//! against whatever session the caller hands in.

pub mod authorize;
pub mod claims;
pub mod guards;
pub mod navigator;
pub mod permissions;
pub mod requirement;
pub mod roles;
pub mod route;
pub mod visibility;

pub use authorize::{AuthContext, Authorizer, Grants};
pub use claims::{TokenClaims, TokenDecodeError, decode_claims, is_token_expired};
pub use guards::{
    ACCESS_DENIED_ROUTE, AuthGuard, GuardOutcome, GuardPipeline, LOGIN_PATH, NavigationGuard,
    NavigationTarget, PermissionGuard, REDIRECT_QUERY_KEY,
};
pub use navigator::{NavigationError, Navigator};
pub use permissions::Permission;
pub use requirement::Requirement;
pub use roles::Role;
pub use route::{Location, MatchedRoute, RouteMeta, RouteRecord, RouteTable};
pub use visibility::{BindingError, BindingKind, Detachable, MatchMode, Mounted, VisibilityBinding};
