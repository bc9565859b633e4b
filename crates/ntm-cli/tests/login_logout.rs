//! End-to-end tests for login, whoami and logout against a mock backend.


use fixtures::{can_bind_localhost, ntm, read_token, temp_ntm_home, user_json, write_token};
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_login_with_code_stores_token() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_ntm_home();
    let server = MockServer::start().await;

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
    Mock::given(method("POST"))
        .and(path("/auth/send-code"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    ntm(home.path(), &server.uri())
        .args(["login", "--email", "a@b.com", "--code", "123456"])
        .assert()
        .success()
        .stderr(predicate::str::contains("✓ Logged in as a@b.com"));

    assert_eq!(read_token(home.path()).as_deref(), Some("T1"));
}

#[tokio::test]
async fn test_login_prompts_for_code() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_ntm_home();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/send-code"))
        .and(body_json(json!({ "email": "a@b.com" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Verification code sent to your email",
            "success": true
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/verify-code"))
        .and(body_json(json!({ "email": "a@b.com", "code": "654321" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "T2" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("a@b.com")))
        .mount(&server)
        .await;

    ntm(home.path(), &server.uri())
        .args(["login", "--email", "a@b.com"])
        .write_stdin("654321\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("✓ Verification code sent to your email"))
        .stderr(predicate::str::contains("Enter the code sent to a@b.com"));

    assert_eq!(read_token(home.path()).as_deref(), Some("T2"));
}

#[tokio::test]
async fn test_login_with_wrong_code_fails_without_token() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_ntm_home();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/verify-code"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "detail": "Invalid or expired code" })),
        )
        .mount(&server)
        .await;

    ntm(home.path(), &server.uri())
        .args(["login", "--email", "a@b.com", "--code", "000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Login failed"))
        .stderr(predicate::str::contains("Invalid or expired code"));

    assert_eq!(read_token(home.path()), None);
}

#[tokio::test]
async fn test_whoami_shows_user() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_ntm_home();
    write_token(home.path(), "T1abcdefgh");
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/validate-token"))
        .and(header("authorization", "Bearer T1abcdefgh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "message": "Token is valid", "success": true })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("a@b.com")))
        .mount(&server)
        .await;

    ntm(home.path(), &server.uri())
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("a@b.com (id 7)"))
        .stdout(predicate::str::contains("token: T1abcd…"))
        .stdout(predicate::str::contains("T1abcdefgh").not());
}

#[tokio::test]
async fn test_whoami_with_rejected_token_logs_out() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_ntm_home();
    write_token(home.path(), "T1");
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/validate-token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "detail": "Invalid token" })))
        .mount(&server)
        .await;

    ntm(home.path(), &server.uri())
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not logged in."))
        .stderr(predicate::str::contains("Session expired. Please log in again."));

    assert_eq!(read_token(home.path()), None);
}

#[tokio::test]
async fn test_logout_clears_token_even_when_server_fails() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_ntm_home();
    write_token(home.path(), "T1");
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .expect(1)
        .mount(&server)
        .await;

    ntm(home.path(), &server.uri())
        .arg("logout")
        .assert()
        .success()
        .stderr(predicate::str::contains("✓ Logged out"));

    assert!(!home.path().join("credentials.json").exists());
}

#[test]
fn test_logout_when_not_logged_in() {
    let home = temp_ntm_home();

    // Nothing listens on port 1; no request is expected.
    ntm(home.path(), "http://127.0.0.1:1")
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not logged in."));
}
