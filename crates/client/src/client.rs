//! HTTP session client.
//!
//! Every request carries the stored bearer token and a strictly increasing
//! `_ts` query parameter. A 401 triggers at most one refresh-and-retry per
//! request; when that does not recover the session, credentials are cleared
//! and the login redirect hook fires.

use std::sync::atomic::{AtomicI64, Ordering};

use std::sync::{Arc, Weak};

use chrono::Utc;
use parking_lot::Mutex;
use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::redirect::LoginRedirect;
use crate::types::{LoginRequest, LoginResponse, ProfileData, ProfileEnvelope, RefreshResponse};

pub const LOGIN_ENDPOINT: &str = "/auth/login";
pub const REFRESH_ENDPOINT: &str = "/auth/users/refresh";
pub const LOGOUT_ENDPOINT: &str = "/auth/users/logout";
pub const PROFILE_ENDPOINT: &str = "/auth/users/profile/get";

pub const TIMESTAMP_QUERY_KEY: &str = "_ts";

const MAX_REFRESH_RETRIES: u32 = 1;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("unauthorized")]
    Unauthorized { message: Option<String> },

    #[error("request failed with status {status}")]
    Status { status: u16, message: Option<String> },

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("no session token available")]
    MissingToken,
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// The `message` field of the error response body, when there was one.
    pub fn message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { message } | ApiError::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED.as_u16()),
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// A request description that can be dispatched more than once.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Told when the client replaces or wipes the stored session on its own,
/// outside any explicit login or logout.
pub trait CredentialListener: Send + Sync {
    fn token_refreshed(&self, token: &str);
    fn session_expired(&self);
}

pub struct SessionClient {
    http: reqwest::Client,
    config: ClientConfig,
    credentials: Arc<CredentialStore>,
    redirect: Arc<dyn LoginRedirect>,
    listeners: Mutex<Vec<Weak<dyn CredentialListener>>>,
    last_ts: AtomicI64,
}

impl SessionClient {
    pub fn new(config: ClientConfig, credentials: Arc<CredentialStore>, redirect: Arc<dyn LoginRedirect>) -> Self {
        Self::with_http(reqwest::Client::new(), config, credentials, redirect)
    }

    pub fn with_http(
        http: reqwest::Client,
        config: ClientConfig,
        credentials: Arc<CredentialStore>,
        redirect: Arc<dyn LoginRedirect>,
    ) -> Self {
        Self {
            http,
            config,
            credentials,
            redirect,
            listeners: Mutex::new(Vec::new()),
            last_ts: AtomicI64::new(0),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Register a listener. It is dropped from the list once the last strong
    /// reference to it goes away.
    pub fn add_listener(&self, listener: Weak<dyn CredentialListener>) {
        self.listeners.lock().push(listener);
    }

    fn notify(&self, event: impl Fn(&dyn CredentialListener)) {
        let live: Vec<Arc<dyn CredentialListener>> = {
            let mut listeners = self.listeners.lock();
            listeners.retain(|l| l.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in live {
            event(listener.as_ref());
        }
    }

    /// Dispatch through the refresh-and-retry cycle.
    pub async fn send(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        let mut bearer = self.credentials.get_token();
        let mut retries = 0;

        loop {
            let err = match self.dispatch(request, bearer.as_deref()).await {
                Err(err) if err.is_unauthorized() => err,
                other => return other,
            };

            if retries >= MAX_REFRESH_RETRIES {
                tracing::warn!(path = request.path(), "request rejected again after token refresh");
                self.expire_session();
                return Err(err);
            }
            retries += 1;

            match self.refresh_token().await {
                Ok(token) => bearer = Some(token),
                Err(refresh_err) => {
                    tracing::warn!(path = request.path(), error = %refresh_err, "token refresh failed");
                    self.expire_session();
                    return Err(err);
                }
            }
        }
    }

    pub async fn request_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        decode(response).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request_json(&ApiRequest::get(path)).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request_json(&ApiRequest::post(path).json(to_body(body)?)).await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request_json(&ApiRequest::put(path).json(to_body(body)?)).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(&ApiRequest::delete(path)).await.map(drop)
    }

    /// Authenticate and persist the session.
    ///
    /// The remember flag is stored first so that everything written after it
    /// lands in the matching tier. A 401 here is returned as-is; there is no
    /// session to refresh yet.
    pub async fn login(&self, email: &str, password: &str, remember: bool) -> Result<LoginResponse, ApiError> {
        let request = ApiRequest::post(LOGIN_ENDPOINT).json(to_body(&LoginRequest { email, password })?);
        let bearer = self.credentials.get_token();
        let response = self.dispatch(&request, bearer.as_deref()).await?;
        let login: LoginResponse = decode(response).await?;
        if login.access_token.is_empty() {
            return Err(ApiError::Decode("login response carried an empty access_token".into()));
        }

        self.credentials.set_remember_me(remember);
        self.credentials.set_token(&login.access_token, remember);
        if let Some(profile) = &login.profile {
            self.credentials.set_user(profile);
        }
        if let Some(roles) = &login.roles {
            self.credentials.set_roles(roles);
        }
        if let Some(permissions) = &login.permissions {
            self.credentials.set_permissions(permissions);
        }

        tracing::info!(remember, "logged in");
        Ok(login)
    }

    /// End the session remotely. Local credentials are cleared whatever the
    /// server answers.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result = self.send(&ApiRequest::post(LOGOUT_ENDPOINT)).await.map(drop);
        self.credentials.clear_auth();
        match &result {
            Ok(()) => tracing::info!("logged out"),
            Err(err) => tracing::warn!(error = %err, "remote logout failed; local credentials cleared"),
        }
        result
    }

    /// Exchange the current token for a fresh one.
    ///
    /// Sent outside the retry cycle. The new token goes to the tier selected
    /// by the remember flag.
    pub async fn refresh_token(&self) -> Result<String, ApiError> {
        let current = self.credentials.get_token().ok_or(ApiError::MissingToken)?;
        let response = self.dispatch(&ApiRequest::get(REFRESH_ENDPOINT), Some(current.as_str())).await?;
        let refreshed: RefreshResponse = decode(response).await?;
        let token = refreshed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Decode("refresh response carried no access_token".into()))?;

        self.credentials.set_token(&token, self.credentials.is_remember_me_active());
        self.notify(|l| l.token_refreshed(&token));
        tracing::info!("session token refreshed");
        Ok(token)
    }

    /// Fetch the profile and write it through to the credential store.
    pub async fn get_profile(&self) -> Result<ProfileData, ApiError> {
        let envelope: ProfileEnvelope = self.get_json(PROFILE_ENDPOINT).await?;
        let data = envelope.data;
        if let Some(user) = &data.user {
            self.credentials.set_user(user);
        }
        self.credentials.set_roles(&data.roles);
        self.credentials.set_permissions(&data.permissions);
        Ok(data)
    }

    async fn dispatch(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<Response, ApiError> {
        let url = self.config.endpoint(request.path());
        let ts = self.next_timestamp().to_string();

        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .query(&request.query)
            .query(&[(TIMESTAMP_QUERY_KEY, ts.as_str())]);
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        check_status(response).await
    }

    fn expire_session(&self) {
        self.credentials.clear_auth();
        self.notify(|l| l.session_expired());
        tracing::warn!(login_path = %self.config.login_path, "session expired; redirecting to login");
        self.redirect.redirect_to_login(&self.config.login_path);
    }

    /// Milliseconds since the epoch, bumped past the previous value when the
    /// clock has not advanced.
    fn next_timestamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let bump = |prev: i64| now.max(prev + 1);
        match self
            .last_ts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| Some(bump(prev)))
        {
            Ok(prev) | Err(prev) => bump(prev),
        }
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| body.get("message").and_then(Value::as_str).map(str::to_owned));

    if status == StatusCode::UNAUTHORIZED {
        Err(ApiError::Unauthorized { message })
    } else {
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode(err.to_string()))
}

fn to_body<B: Serialize + ?Sized>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|err| ApiError::Decode(err.to_string()))
}
