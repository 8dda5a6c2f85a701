//! Credential persistence across the session and durable tiers.
//!
//! Reads look in the session tier first and fall back to the durable tier.
//! Writes go to exactly one tier, picked by the remember-me flag (durable when
//! set). `clear_auth` wipes both tiers.

use std::collections::HashSet;
use std::sync::Arc;

use assursuite_auth::{Grants, Permission, Role, is_token_expired};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::storage::{KeyValueStore, MemoryStore};
use crate::types::UserProfile;

pub const AUTH_TOKEN_KEY: &str = "auth_token";
pub const USER_KEY: &str = "user";
pub const ROLES_KEY: &str = "user_roles";
pub const PERMISSIONS_KEY: &str = "user_permissions";
pub const REMEMBER_KEY: &str = "remember_me";

const CREDENTIAL_KEYS: [&str; 4] = [AUTH_TOKEN_KEY, USER_KEY, ROLES_KEY, PERMISSIONS_KEY];

pub struct CredentialStore {
    session: Arc<dyn KeyValueStore>,
    durable: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(session: Arc<dyn KeyValueStore>, durable: Arc<dyn KeyValueStore>) -> Self {
        Self { session, durable }
    }

    /// Both tiers in memory; nothing outlives the process.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    pub fn session_tier(&self) -> &dyn KeyValueStore {
        self.session.as_ref()
    }

    pub fn durable_tier(&self) -> &dyn KeyValueStore {
        self.durable.as_ref()
    }

    fn tier(&self, remember: bool) -> &dyn KeyValueStore {
        if remember { self.durable_tier() } else { self.session_tier() }
    }

    fn active_tier(&self) -> &dyn KeyValueStore {
        self.tier(self.is_remember_me_active())
    }

    fn read(&self, key: &str) -> Option<String> {
        self.session
            .get(key)
            .filter(|v| !v.is_empty())
            .or_else(|| self.durable.get(key).filter(|v| !v.is_empty()))
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key, error = %err, "ignoring unreadable stored credential");
                None
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.active_tier().set(key, &raw),
            Err(err) => tracing::error!(key, error = %err, "failed to serialize credential"),
        }
    }

    pub fn set_token(&self, token: &str, remember: bool) {
        self.tier(remember).set(AUTH_TOKEN_KEY, token);
    }

    /// Current token, or `None` if absent or expired.
    ///
    /// Finding an expired token clears every stored credential.
    pub fn get_token(&self) -> Option<String> {
        self.get_token_at(Utc::now())
    }

    pub fn get_token_at(&self, now: DateTime<Utc>) -> Option<String> {
        let token = self.read(AUTH_TOKEN_KEY)?;
        if is_token_expired(&token, now) {
            tracing::debug!("stored session token expired; clearing credentials");
            self.clear_auth();
            return None;
        }
        Some(token)
    }

    pub fn is_authenticated(&self) -> bool {
        self.get_token().is_some()
    }

    pub fn set_user(&self, user: &UserProfile) {
        self.write_json(USER_KEY, user);
    }

    pub fn get_user(&self) -> Option<UserProfile> {
        self.read_json(USER_KEY)
    }

    pub fn set_roles(&self, roles: &[Role]) {
        self.write_json(ROLES_KEY, roles);
    }

    pub fn get_roles(&self) -> HashSet<Role> {
        self.read_json::<Vec<Role>>(ROLES_KEY)
            .map(|roles| roles.into_iter().collect())
            .unwrap_or_default()
    }

    pub fn set_permissions(&self, permissions: &[Permission]) {
        self.write_json(PERMISSIONS_KEY, permissions);
    }

    pub fn get_permissions(&self) -> HashSet<Permission> {
        self.read_json::<Vec<Permission>>(PERMISSIONS_KEY)
            .map(|perms| perms.into_iter().collect())
            .unwrap_or_default()
    }

    /// Roles and permissions as an evaluator.
    pub fn grants(&self) -> Grants {
        Grants::new(self.get_roles(), self.get_permissions())
    }

    /// Always stored in the durable tier, whatever its value.
    pub fn set_remember_me(&self, remember: bool) {
        self.durable.set(REMEMBER_KEY, if remember { "true" } else { "false" });
    }

    pub fn is_remember_me_active(&self) -> bool {
        self.durable.get(REMEMBER_KEY).as_deref() == Some("true")
    }

    /// Remove token, profile, roles and permissions from both tiers.
    pub fn clear_auth(&self) {
        for key in CREDENTIAL_KEYS {
            self.durable.remove(key);
            self.session.remove(key);
        }
    }
}
