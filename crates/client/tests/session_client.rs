mod common;

use assursuite_client::ApiError;
use assursuite_client::credentials::{AUTH_TOKEN_KEY, PERMISSIONS_KEY, REMEMBER_KEY, ROLES_KEY, USER_KEY};
use common::{Harness, live_jwt};
use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

const COUNTRIES: &str = "/api/settings/countries";
const REFRESH: &str = "/api/auth/users/refresh";

#[tokio::test]
async fn unauthorized_request_refreshes_once_and_retries_with_new_token() {
    let mut h = Harness::start().await;
    let old = live_jwt("old");
    let new = live_jwt("new");
    h.credentials().set_token(&old, false);

    Mock::given(method("GET"))
        .and(path(COUNTRIES))
        .and(header("authorization", format!("Bearer {old}").as_str()))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(REFRESH))
        .and(header("authorization", format!("Bearer {old}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": new })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(COUNTRIES))
        .and(header("authorization", format!("Bearer {new}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "code": "SN" }])))
        .expect(1)
        .mount(&h.server)
        .await;

    let countries: Value = h.client.get_json("/settings/countries").await.unwrap();

    assert_eq!(countries, json!([{ "code": "SN" }]));
    assert_eq!(h.credentials().get_token().as_deref(), Some(new.as_str()));
    assert!(h.drain_redirects().is_empty());
}

#[tokio::test]
async fn failed_refresh_clears_credentials_and_redirects_once() {
    let mut h = Harness::start().await;
    h.credentials().set_token(&live_jwt("old"), true);
    h.credentials().set_roles(&["admin".into()]);

    Mock::given(method("GET"))
        .and(path(COUNTRIES))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Token expired" })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Refresh denied" })))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h.client.get_json::<Value>("/settings/countries").await.unwrap_err();

    // The caller sees the original failure, not the refresh failure.
    assert!(err.is_unauthorized());
    assert_eq!(err.message(), Some("Token expired"));
    assert_eq!(h.credentials().get_token(), None);
    assert!(h.credentials().get_roles().is_empty());
    assert_eq!(h.drain_redirects(), vec!["/auth/login".to_string()]);
}

#[tokio::test]
async fn second_rejection_after_refresh_expires_session() {
    let mut h = Harness::start().await;
    h.credentials().set_token(&live_jwt("old"), false);

    Mock::given(method("GET"))
        .and(path(COUNTRIES))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": live_jwt("new") })))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h.client.get_json::<Value>("/settings/countries").await.unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(h.credentials().get_token(), None);
    assert_eq!(h.drain_redirects().len(), 1);
}

#[tokio::test]
async fn refresh_without_token_in_body_counts_as_failure() {
    let mut h = Harness::start().await;
    h.credentials().set_token(&live_jwt("old"), false);

    Mock::given(method("GET"))
        .and(path(COUNTRIES))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&h.server)
        .await;

    assert!(h.client.get_json::<Value>("/settings/countries").await.is_err());
    assert_eq!(h.credentials().get_token(), None);
    assert_eq!(h.drain_redirects().len(), 1);
}

#[tokio::test]
async fn every_request_carries_an_increasing_timestamp() {
    let h = Harness::start().await;

    Mock::given(method("GET"))
        .and(path(COUNTRIES))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(3)
        .mount(&h.server)
        .await;

    for _ in 0..3 {
        let _: Value = h.client.get_json("/settings/countries").await.unwrap();
    }

    let requests = h.server.received_requests().await.unwrap();
    let stamps: Vec<i64> = requests
        .iter()
        .map(|req| {
            assert!(req.headers.get("authorization").is_none(), "no token, no bearer");
            req.url
                .query_pairs()
                .find(|(k, _)| k == "_ts")
                .and_then(|(_, v)| v.parse().ok())
                .expect("_ts query parameter")
        })
        .collect();
    assert_eq!(stamps.len(), 3);
    assert!(stamps.windows(2).all(|w| w[0] < w[1]), "timestamps not increasing: {stamps:?}");
}

#[tokio::test]
async fn login_writes_into_tier_chosen_by_remember_flag() {
    for remember in [false, true] {
        let h = Harness::start().await;
        let token = live_jwt("awa");

        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_json(json!({ "email": "awa@example.com", "password": "s3cret" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": token,
                "profile": { "name": "Awa Diop", "id": 7 },
                "roles": ["admin"],
                "permissions": ["contracts.read", "contracts.edit"],
            })))
            .expect(1)
            .mount(&h.server)
            .await;

        let login = h.client.login("awa@example.com", "s3cret", remember).await.unwrap();
        assert_eq!(login.access_token, token);

        let creds = h.credentials();
        let (written, untouched) = if remember {
            (creds.durable_tier(), creds.session_tier())
        } else {
            (creds.session_tier(), creds.durable_tier())
        };
        for key in [AUTH_TOKEN_KEY, USER_KEY, ROLES_KEY, PERMISSIONS_KEY] {
            assert!(written.get(key).is_some(), "{key} missing (remember={remember})");
            assert!(untouched.get(key).is_none(), "{key} leaked (remember={remember})");
        }
        assert_eq!(creds.durable_tier().get(REMEMBER_KEY).as_deref(), Some(if remember { "true" } else { "false" }));
        assert_eq!(creds.get_user().map(|u| u.name).as_deref(), Some("Awa Diop"));
        assert!(creds.grants().has_all_permissions(&["contracts.read", "contracts.edit"]));
    }
}

#[tokio::test]
async fn rejected_login_is_not_refreshed() {
    let mut h = Harness::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Invalid credentials" })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let err = h.client.login("awa@example.com", "wrong", false).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized { .. }));
    assert_eq!(err.message(), Some("Invalid credentials"));
    assert!(h.drain_redirects().is_empty());
}

#[tokio::test]
async fn logout_clears_credentials_even_when_server_fails() {
    let h = Harness::start().await;
    h.credentials().set_remember_me(true);
    h.credentials().set_token(&live_jwt("awa"), true);
    h.credentials().set_permissions(&["quotes.read".into()]);

    Mock::given(method("POST"))
        .and(path("/api/auth/users/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h.client.logout().await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(h.credentials().get_token(), None);
    assert!(h.credentials().get_permissions().is_empty());
}

#[tokio::test]
async fn profile_fetch_writes_through() {
    let h = Harness::start().await;
    let token = live_jwt("awa");
    h.credentials().set_token(&token, false);

    Mock::given(method("GET"))
        .and(path("/api/auth/users/profile/get"))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "user": { "name": "Awa Diop" },
                "roles": ["broker"],
                "permissions": ["quotes.read"],
            }
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let profile = h.client.get_profile().await.unwrap();
    assert_eq!(profile.user.map(|u| u.name).as_deref(), Some("Awa Diop"));
    assert!(h.credentials().grants().has_role("broker"));
    assert!(h.credentials().grants().has_permission("quotes.read"));
}

#[tokio::test]
async fn non_auth_errors_pass_through_untouched() {
    let mut h = Harness::start().await;
    h.credentials().set_token(&live_jwt("awa"), false);

    Mock::given(method("PUT"))
        .and(path("/api/settings/countries/SN"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({ "message": "Code already used" })))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h
        .client
        .put_json::<_, Value>("/settings/countries/SN", &json!({ "code": "SN" }))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(422));
    assert_eq!(err.message(), Some("Code already used"));
    assert!(h.credentials().get_token().is_some());
    assert!(h.drain_redirects().is_empty());
}
