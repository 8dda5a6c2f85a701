#![allow(dead_code)]

use std::sync::Arc;

use assursuite_client::{ClientConfig, CredentialStore, SessionClient};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use wiremock::MockServer;

const TEST_SECRET: &str = "test-secret";

#[derive(Serialize)]
struct Claims<'a> {
    sub: &'a str,
    exp: i64,
}

pub fn mint_jwt(sub: &str, ttl: Duration) -> String {
    let claims = Claims {
        sub,
        exp: (Utc::now() + ttl).timestamp(),
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

pub fn live_jwt(sub: &str) -> String {
    mint_jwt(sub, Duration::minutes(10))
}

pub struct Harness {
    pub server: MockServer,
    pub client: Arc<SessionClient>,
    pub redirects: UnboundedReceiver<String>,
}

impl Harness {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let config = ClientConfig::new(&format!("{}/api", server.uri())).expect("mock server uri");
        let (tx, redirects) = unbounded_channel();
        let client = SessionClient::new(config, Arc::new(CredentialStore::in_memory()), Arc::new(tx));
        Self {
            server,
            client: Arc::new(client),
            redirects,
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        self.client.credentials()
    }

    /// Login redirects fired so far.
    pub fn drain_redirects(&mut self) -> Vec<String> {
        let mut seen = Vec::new();
        while let Ok(path) = self.redirects.try_recv() {
            seen.push(path);
        }
        seen
    }
}
