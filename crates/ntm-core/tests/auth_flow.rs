//! Integration tests for the login-code flow, validation and logout.

mod common;

use std::sync::Arc;

use common::{app_with_store, can_bind_localhost, user_json};
use ntm_core::app::App;
use ntm_core::config::Config;
use ntm_core::session::AuthState;
use ntm_core::storage::{MemoryTokenStore, TokenStore};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ok_message(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "message": message, "success": true }))
}

#[tokio::test]
async fn test_login_flow_persists_token_and_loads_profile() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());
    let app = app_with_store(&server, store.clone());

    Mock::given(method("POST"))
        .and(path("/auth/send-code"))
        .and(body_json(json!({ "email": "a@b.com" })))
        .respond_with(ok_message("Verification code sent to your email"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/verify-code"))
        .and(body_json(json!({ "email": "a@b.com", "code": "123456" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "T1", "token_type": "bearer" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("a@b.com")))
        .expect(1)
        .mount(&server)
        .await;

    let sent = app.auth().send_code("a@b.com").await.unwrap();
    assert_eq!(sent.message, "Verification code sent to your email");
    assert_eq!(
        app.auth().state(),
        AuthState::Authenticating {
            email: "a@b.com".to_string()
        }
    );

    let token = app.auth().verify_code("a@b.com", "123456").await.unwrap();
    assert_eq!(token.access_token, "T1");
    assert_eq!(store.load().unwrap().as_deref(), Some("T1"));
    assert_eq!(app.auth().token().as_deref(), Some("T1"));

    let user = app.auth().user().expect("profile loaded");
    assert_eq!(user.email, "a@b.com");
    assert!(user.last_login.is_some());
}

#[tokio::test]
async fn test_verify_code_rejected_keeps_session_anonymous() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());
    let app = app_with_store(&server, store.clone());

    Mock::given(method("POST"))
        .and(path("/auth/verify-code"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "detail": "Invalid or expired code" })),
        )
        .mount(&server)
        .await;

    let err = app.auth().verify_code("a@b.com", "000000").await.unwrap_err();
    assert!(err.to_string().contains("Invalid or expired code"));
    assert!(!app.auth().is_authenticated());
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn test_profile_failure_after_verify_logs_out_and_raises() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());
    let app = app_with_store(&server, store.clone());

    Mock::given(method("POST"))
        .and(path("/auth/verify-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "T1" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ok_message("Successfully logged out"))
        .expect(1)
        .mount(&server)
        .await;

    let err = app.auth().verify_code("a@b.com", "123456").await.unwrap_err();
    assert!(err.to_string().contains("HTTP 500"));
    assert!(!app.auth().is_authenticated());
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn test_validate_token_without_token_skips_server() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    let app = app_with_store(&server, Arc::new(MemoryTokenStore::new()));

    Mock::given(method("POST"))
        .and(path("/auth/validate-token"))
        .respond_with(ok_message("Token is valid"))
        .expect(0)
        .mount(&server)
        .await;

    assert!(!app.auth().validate_token().await);
}

#[tokio::test]
async fn test_validate_token_success_refreshes_profile() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    let app = app_with_store(&server, Arc::new(MemoryTokenStore::with_token("T0")));

    Mock::given(method("POST"))
        .and(path("/auth/validate-token"))
        .and(header("authorization", "Bearer T0"))
        .respond_with(ok_message("Token is valid"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("a@b.com")))
        .mount(&server)
        .await;

    assert!(app.auth().validate_token().await);
    assert_eq!(app.auth().user().map(|u| u.email).as_deref(), Some("a@b.com"));
}

#[tokio::test]
async fn test_validate_token_failure_returns_false_and_logs_out() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::with_token("T0"));
    let app = app_with_store(&server, store.clone());

    Mock::given(method("POST"))
        .and(path("/auth/validate-token"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert!(!app.auth().validate_token().await);
    assert!(!app.auth().is_authenticated());
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn test_logout_clears_session_when_server_fails() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::with_token("T0"));
    let app = app_with_store(&server, store.clone());

    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .expect(1)
        .mount(&server)
        .await;

    app.auth().logout().await;
    assert_eq!(app.auth().state(), AuthState::Anonymous);
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn test_logout_when_anonymous_does_not_call_server() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    let app = app_with_store(&server, Arc::new(MemoryTokenStore::new()));

    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ok_message("Successfully logged out"))
        .expect(0)
        .mount(&server)
        .await;

    app.auth().logout().await;
    assert!(!app.auth().is_authenticated());
}

#[tokio::test]
async fn test_logout_with_unreachable_server_still_clears() {
    let store = Arc::new(MemoryTokenStore::with_token("T0"));
    let token_store: Arc<dyn TokenStore> = store.clone();
    // Port 1 is reserved and refuses connections.
    let app = App::with_base_url(Config::default(), token_store, "http://127.0.0.1:1").unwrap();

    app.auth().logout().await;
    assert!(!app.auth().is_authenticated());
    assert_eq!(store.load().unwrap(), None);
}
