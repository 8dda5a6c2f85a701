//! Wire shapes of the authentication endpoints.

use assursuite_auth::{Permission, Role};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The signed-in user's profile.
///
/// Only `name` is interpreted; every other field the backend sends is kept
/// as-is so the profile can be stored and handed back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: Map::new(),
        }
    }
}

/// `POST /auth/login`
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub profile: Option<UserProfile>,
    #[serde(default)]
    pub roles: Option<Vec<Role>>,
    #[serde(default)]
    pub permissions: Option<Vec<Permission>>,
}

/// `GET /auth/users/refresh`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RefreshResponse {
    #[serde(default)]
    pub access_token: Option<String>,
}

/// `GET /auth/users/profile/get`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProfileEnvelope {
    pub data: ProfileData,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProfileData {
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}
