//! Observable session state.
//!
//! One `SessionState` is built at the application root and shared as a
//! [`SessionContext`]. Consumers read snapshots or subscribe to changes; the
//! record moves through login, logout, refresh and profile fetches, and
//! follows the client when it refreshes or expires the session mid-request.

use std::sync::{Arc, Weak};

use assursuite_auth::{Authorizer, Grants, Permission, Role, is_token_expired};
use chrono::Utc;
use tokio::sync::watch;

use crate::client::{ApiError, CredentialListener, SessionClient};
use crate::credentials::CredentialStore;
use crate::types::{LoginResponse, ProfileData, UserProfile};

pub const LOGIN_FAILED: &str = "Failed to login";
pub const LOGOUT_FAILED: &str = "Failed to logout";
pub const REFRESH_FAILED: &str = "Failed to refresh token";
pub const FETCH_USER_FAILED: &str = "Failed to fetch user profile";

pub type SessionContext = Arc<SessionState>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub token: Option<String>,
    pub user: Option<UserProfile>,
    pub grants: Grants,
    pub loading: bool,
    pub error: Option<String>,
}

impl SessionSnapshot {
    fn from_store(store: &CredentialStore) -> Self {
        Self {
            token: store.get_token(),
            user: store.get_user(),
            grants: store.grants(),
            loading: false,
            error: None,
        }
    }

    /// A token is held and has not expired.
    pub fn is_authenticated(&self) -> bool {
        self.token
            .as_deref()
            .is_some_and(|token| !is_token_expired(token, Utc::now()))
    }

    /// Display name of the signed-in user, empty when nobody is.
    pub fn user_full_name(&self) -> &str {
        self.user.as_ref().map(|u| u.name.as_str()).unwrap_or_default()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.grants.roles().iter()
    }

    pub fn permissions(&self) -> impl Iterator<Item = &Permission> {
        self.grants.permissions().iter()
    }

    fn clear_credentials(&mut self) {
        self.token = None;
        self.user = None;
        self.grants = Grants::default();
    }
}

pub struct SessionState {
    client: Arc<SessionClient>,
    state: watch::Sender<SessionSnapshot>,
}

impl SessionState {
    /// Build the shared session and register it with `client`.
    pub fn new(client: Arc<SessionClient>) -> SessionContext {
        let (state, _) = watch::channel(SessionSnapshot::from_store(client.credentials()));
        let session = Arc::new(Self { client, state });
        let listener: Weak<dyn CredentialListener> = Arc::downgrade(&session) as Weak<SessionState>;
        session.client.add_listener(listener);
        session
    }

    pub fn client(&self) -> &Arc<SessionClient> {
        &self.client
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn user_full_name(&self) -> String {
        self.state.borrow().user_full_name().to_string()
    }

    pub fn has_error(&self) -> bool {
        self.state.borrow().has_error()
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn clear_error(&self) {
        self.state.send_if_modified(|s| s.error.take().is_some());
    }

    /// Re-read token, profile and grants from the credential store.
    pub fn reload(&self) {
        let fresh = SessionSnapshot::from_store(self.client.credentials());
        self.state.send_modify(|s| {
            s.token = fresh.token;
            s.user = fresh.user;
            s.grants = fresh.grants;
        });
    }

    pub async fn login(&self, email: &str, password: &str, remember: bool) -> Result<LoginResponse, ApiError> {
        self.begin();
        let result = self.client.login(email, password, remember).await;
        self.state.send_modify(|s| {
            match &result {
                Ok(login) => {
                    s.token = Some(login.access_token.clone());
                    s.user = login.profile.clone();
                    s.grants = Grants::new(
                        login.roles.iter().flatten().cloned(),
                        login.permissions.iter().flatten().cloned(),
                    );
                }
                Err(err) => s.error = Some(failure_message(err, LOGIN_FAILED)),
            }
            s.loading = false;
        });
        result
    }

    /// Local state is cleared even when the server call fails.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.begin();
        let result = self.client.logout().await;
        self.state.send_modify(|s| {
            s.clear_credentials();
            if let Err(err) = &result {
                s.error = Some(failure_message(err, LOGOUT_FAILED));
            }
            s.loading = false;
        });
        result
    }

    pub async fn refresh_token(&self) -> Result<String, ApiError> {
        self.begin();
        let result = self.client.refresh_token().await;
        if result.is_err() {
            self.client.credentials().clear_auth();
        }
        self.state.send_modify(|s| {
            match &result {
                Ok(token) => s.token = Some(token.clone()),
                Err(err) => {
                    s.error = Some(failure_message(err, REFRESH_FAILED));
                    s.clear_credentials();
                }
            }
            s.loading = false;
        });
        result
    }

    /// Re-sync profile and grants. On failure the previous values stay.
    pub async fn fetch_user(&self) -> Result<ProfileData, ApiError> {
        self.begin();
        let result = self.client.get_profile().await;
        self.state.send_modify(|s| {
            match &result {
                Ok(profile) => {
                    s.user = profile.user.clone();
                    s.grants = Grants::new(profile.roles.iter().cloned(), profile.permissions.iter().cloned());
                }
                Err(err) => s.error = Some(failure_message(err, FETCH_USER_FAILED)),
            }
            s.loading = false;
        });
        result
    }

    fn begin(&self) {
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });
    }
}

impl CredentialListener for SessionState {
    fn token_refreshed(&self, token: &str) {
        self.state.send_modify(|s| s.token = Some(token.to_string()));
    }

    fn session_expired(&self) {
        self.state.send_modify(SessionSnapshot::clear_credentials);
    }
}

impl Authorizer for SessionState {
    fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    fn has_role(&self, role: &str) -> bool {
        self.state.borrow().grants.has_role(role)
    }

    fn has_any_role(&self, roles: &[&str]) -> bool {
        self.state.borrow().grants.has_any_role(roles)
    }

    fn has_permission(&self, permission: &str) -> bool {
        self.state.borrow().grants.has_permission(permission)
    }

    fn has_all_permissions(&self, permissions: &[&str]) -> bool {
        self.state.borrow().grants.has_all_permissions(permissions)
    }

    fn has_any_permission(&self, permissions: &[&str]) -> bool {
        self.state.borrow().grants.has_any_permission(permissions)
    }
}

fn failure_message(err: &ApiError, fallback: &str) -> String {
    err.message().unwrap_or(fallback).to_string()
}
