//! Login integration tests.
//!
//! Tests for SP-initiated login and the assertion consumer service across
//! the strict and reduced-trust validation tiers.

use axum::http::StatusCode;

use crate::common::{attribute, encode, response_with_status, saml_response, TestEnv};

/// Tests that `/login` redirects to the IdP with an `AuthnRequest`.
#[tokio::test]
async fn test_login_redirects_to_idp() -> anyhow::Result<()> {
    let env = TestEnv::new();

    let response = env.get("/login", None).await?;

    assert_eq!(response.status, StatusCode::FOUND);
    let location = response.location().unwrap_or_default();
    assert!(
        location.starts_with("http://localhost:8080/realms/demo/protocol/saml?SAMLRequest="),
        "unexpected login redirect: {location}"
    );
    assert!(location.contains("RelayState=http%3A%2F%2Flocalhost%3A8000%2F"));

    Ok(())
}

/// Tests that `/login` renders an error page when no SSO endpoint is known.
#[tokio::test]
async fn test_login_without_sso_url() -> anyhow::Result<()> {
    let mut config = sp_server::ServerConfig::for_testing();
    config.saml.idp.sso_url = String::new();
    let env = TestEnv::with_config(config, true);

    let response = env.get("/login", None).await?;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.body.contains("SAML Login Error"));

    Ok(())
}

/// Tests a strictly validated login and the resulting home page.
#[tokio::test]
async fn test_strict_login_creates_session() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let attributes = [
        attribute("email", &["alice@example.com"]),
        attribute("givenName", &["Alice"]),
        attribute("Role", &["admin", "user"]),
        attribute("Permission.reports", &["true"]),
    ]
    .concat();

    let (response, cookie) = env.login(&saml_response("alice", &attributes, true)).await?;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("User authenticated successfully"));
    assert!(response.body.contains("alice@example.com"));
    assert!(response.body.contains("admin, user"));
    assert!(response.body.contains("reports"));

    let cookie = cookie.expect("login should set a session cookie");
    assert!(cookie.starts_with("sp_session="));
    let set_cookie = response.headers["set-cookie"].to_str()?;
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));

    let home = env.get("/", Some(&cookie)).await?;
    assert_eq!(home.status, StatusCode::OK);
    assert!(home.body.contains("Welcome, alice"));
    assert!(home.body.contains("strict"));

    Ok(())
}

/// Tests that the same response validates the same way twice.
#[tokio::test]
async fn test_validation_is_repeatable() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let xml = saml_response("alice", &attribute("email", &["a@example.com"]), true);

    let (first, _) = env.login(&xml).await?;
    let (second, _) = env.login(&xml).await?;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(second.status, StatusCode::OK);
    assert!(second.body.contains("User authenticated successfully"));

    Ok(())
}

/// Tests that each accepted login issues a new session scope.
#[tokio::test]
async fn test_login_rotates_session_scope() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let xml = saml_response("alice", &attribute("email", &["a@example.com"]), true);

    let (_, first) = env.login(&xml).await?;
    let first = first.expect("login should set a session cookie");

    let response = env
        .post_form("/callback", &[("SAMLResponse", &encode(&xml))], Some(&first))
        .await?;
    assert_eq!(response.status, StatusCode::OK);
    let second = response
        .session_cookie()
        .expect("login should set a session cookie");
    assert_ne!(first, second);

    let stale = env.get("/", Some(&first)).await?;
    assert!(stale.body.contains("not signed in"));
    let current = env.get("/", Some(&second)).await?;
    assert!(current.body.contains("Welcome, alice"));

    Ok(())
}

/// Tests that a missing `SAMLResponse` yields a JSON error.
#[tokio::test]
async fn test_callback_without_response() -> anyhow::Result<()> {
    let env = TestEnv::new();

    let response = env.post_form("/callback", &[("RelayState", "x")], None).await?;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let body = response.json()?;
    assert_eq!(body["error"], "SAML Response missing");
    assert_eq!(body["details"], "No SAMLResponse found in POST data");

    Ok(())
}

/// Tests that garbage input is rejected as a processing error.
#[tokio::test]
async fn test_callback_with_garbage() -> anyhow::Result<()> {
    let env = TestEnv::new();

    let response = env
        .post_form("/callback", &[("SAMLResponse", "%%%not-base64%%%")], None)
        .await?;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()?["error"], "SAML Processing Error");
    assert!(response.session_cookie().is_none());

    Ok(())
}

/// Tests that production rejects unsigned assertions.
#[tokio::test]
async fn test_unsigned_response_rejected_in_production() -> anyhow::Result<()> {
    let env = TestEnv::new();

    let (response, cookie) = env.login(&saml_response("mallory", "", false)).await?;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let body = response.json()?;
    assert_eq!(body["error"], "SAML Processing Error");
    assert_eq!(body["kind"], "signature_missing");
    assert!(cookie.is_none());

    Ok(())
}

/// Tests that production rejects repeated attribute names.
#[tokio::test]
async fn test_duplicate_attributes_rejected_in_production() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let attributes = [attribute("role", &["admin"]), attribute("role", &["user"])].concat();

    let (response, _) = env.login(&saml_response("alice", &attributes, true)).await?;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()?["kind"], "duplicate_attribute_name");

    Ok(())
}

/// Tests the lenient duplicate tier in development.
#[tokio::test]
async fn test_duplicate_attributes_accepted_in_development() -> anyhow::Result<()> {
    let env = TestEnv::development(true);
    let attributes = [attribute("role", &["admin"]), attribute("role", &["user"])].concat();

    let (response, cookie) = env.login(&saml_response("alice", &attributes, true)).await?;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("authenticated_user"));
    assert!(response.body.contains("attributes skipped due to duplicate names"));

    let cookie = cookie.expect("login should set a session cookie");
    let home = env.get("/", Some(&cookie)).await?;
    assert!(home.body.contains("Attributes skipped due to duplicate names"));
    assert!(home.body.contains("lenient_duplicate"));
    assert!(home.body.contains("keycloak"));

    Ok(())
}

/// Tests the signature bypass tier in development.
#[tokio::test]
async fn test_unsigned_response_accepted_in_development() -> anyhow::Result<()> {
    let env = TestEnv::development(false);
    let attributes = [
        attribute("email", &["bob@example.com"]),
        attribute("role", &["admin"]),
        attribute("role", &["auditor"]),
    ]
    .concat();

    let (response, _) = env.login(&saml_response("bob", &attributes, false)).await?;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response
        .body
        .contains("development mode - signature validation bypassed"));
    assert!(response.body.contains("bob@example.com"));
    assert!(response.body.contains("admin, auditor"));

    Ok(())
}

/// Tests that development can still opt out of the signature bypass.
#[tokio::test]
async fn test_signature_bypass_can_be_disabled() -> anyhow::Result<()> {
    let mut config = sp_server::ServerConfig::for_testing();
    config.environment = sp_server::Environment::Development;
    config.allow_unsigned_assertions = Some(false);
    let env = TestEnv::with_config(config, false);

    let (response, _) = env.login(&saml_response("bob", "", false)).await?;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    Ok(())
}

/// Tests that an unsuccessful IdP status renders the error page.
#[tokio::test]
async fn test_authentication_denied() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let xml = response_with_status("Responder", "alice", "", true);

    let response = env
        .post_form("/callback", &[("SAMLResponse", &encode(&xml))], None)
        .await?;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(response.content_type().starts_with("text/html"));
    assert!(response.body.contains("Authentication Failed"));
    assert!(response.session_cookie().is_none());

    Ok(())
}

/// Tests that a response naming no one is refused.
#[tokio::test]
async fn test_response_without_identity() -> anyhow::Result<()> {
    let env = TestEnv::new();

    let (response, _) = env.login(&saml_response("", "", true)).await?;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(response.body.contains("Authentication Failed"));

    Ok(())
}
