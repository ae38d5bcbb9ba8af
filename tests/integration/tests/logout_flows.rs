//! Logout integration tests.
//!
//! Every logout variant must end the local session, whatever the IdP does.

use axum::http::StatusCode;
use sp_protocol_saml::bindings::HttpRedirectBinding;

use crate::common::{attribute, encode, logout_response, saml_response, TestEnv};

async fn signed_in(env: &TestEnv) -> anyhow::Result<String> {
    let xml = saml_response("alice", &attribute("email", &["alice@example.com"]), true);
    let (response, cookie) = env.login(&xml).await?;
    assert_eq!(response.status, StatusCode::OK);
    Ok(cookie.expect("login should set a session cookie"))
}

/// Tests SP-initiated logout with an active session.
#[tokio::test]
async fn test_logout_redirects_to_idp_and_ends_session() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let cookie = signed_in(&env).await?;

    let response = env.get("/logout", Some(&cookie)).await?;

    assert_eq!(response.status, StatusCode::FOUND);
    let location = response.location().unwrap_or_default();
    assert!(
        location.starts_with("http://localhost:8080/realms/demo/protocol/saml?SAMLRequest="),
        "unexpected logout redirect: {location}"
    );

    let home = env.get("/", Some(&cookie)).await?;
    assert!(home.body.contains("not signed in"));

    Ok(())
}

/// Tests that logout falls back to a local result when the IdP has no SLO
/// endpoint.
#[tokio::test]
async fn test_logout_without_idp_slo() -> anyhow::Result<()> {
    let mut config = sp_server::ServerConfig::for_testing();
    config.saml.idp.slo_url = None;
    let env = TestEnv::with_config(config, true);
    let cookie = signed_in(&env).await?;

    let response = env.post_form("/logout", &[], Some(&cookie)).await?;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response
        .body
        .contains("Logged out successfully (local session cleared)"));
    assert!(response.body.contains("but local logout completed"));

    let home = env.get("/", Some(&cookie)).await?;
    assert!(home.body.contains("not signed in"));

    Ok(())
}

/// Tests `/logout` without a session, as after logging out of another SP.
#[tokio::test]
async fn test_logout_without_session() -> anyhow::Result<()> {
    let env = TestEnv::new();

    let response = env.get("/logout", None).await?;

    assert_eq!(response.status, StatusCode::FOUND);
    assert!(response.location().is_some());

    let mut config = sp_server::ServerConfig::for_testing();
    config.saml.idp.slo_url = None;
    config.idp_global_logout_url = "http://idp.example.com/logout?GLO=true".to_string();
    let env = TestEnv::with_config(config, true);

    let response = env.get("/logout", None).await?;

    assert_eq!(response.status, StatusCode::FOUND);
    assert_eq!(
        response.location(),
        Some("http://idp.example.com/logout?GLO=true")
    );

    Ok(())
}

/// Tests local-only logout.
#[tokio::test]
async fn test_simple_logout() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let cookie = signed_in(&env).await?;

    let response = env.get("/simple-logout", Some(&cookie)).await?;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response
        .body
        .contains("Simple logout - You may still be logged into the identity provider"));

    let again = env.get("/simple-logout", Some(&cookie)).await?;
    assert_eq!(again.status, StatusCode::OK);

    let home = env.get("/", Some(&cookie)).await?;
    assert!(home.body.contains("not signed in"));

    Ok(())
}

/// Tests global logout through the IdP.
#[tokio::test]
async fn test_cross_sp_logout() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let cookie = signed_in(&env).await?;

    let response = env.get("/cross-sp-logout", Some(&cookie)).await?;

    assert_eq!(response.status, StatusCode::FOUND);
    assert_eq!(
        response.location(),
        Some("http://localhost:8080/realms/demo/protocol/saml?GLO=true&redirect_uri=http%3A%2F%2Flocalhost%3A8000%2F")
    );

    let home = env.get("/", Some(&cookie)).await?;
    assert!(home.body.contains("not signed in"));

    Ok(())
}

/// Tests the SLS without a logout message.
#[tokio::test]
async fn test_sls_without_message() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let cookie = signed_in(&env).await?;

    let response = env.get("/sls", Some(&cookie)).await?;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("Logged out successfully (session cleared)"));
    assert!(response
        .body
        .contains("No response to process (likely cross-SP logout)"));

    let home = env.get("/", Some(&cookie)).await?;
    assert!(home.body.contains("not signed in"));

    Ok(())
}

/// Tests a logout response delivered to the SLS over HTTP-Redirect.
#[tokio::test]
async fn test_sls_with_redirect_binding() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let cookie = signed_in(&env).await?;

    let uri = HttpRedirectBinding::encode_request(&logout_response("Success"), "/sls", None)?
        .replacen("SAMLRequest=", "SAMLResponse=", 1);
    let response = env.get(&uri, Some(&cookie)).await?;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains(
        "Successfully logged out from both the application and the identity provider"
    ));

    let home = env.get("/", Some(&cookie)).await?;
    assert!(home.body.contains("not signed in"));

    Ok(())
}

/// Tests that an unreadable SLS query still ends the session.
#[tokio::test]
async fn test_sls_with_malformed_query() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let cookie = signed_in(&env).await?;

    let response = env
        .get("/sls?SAMLResponse=abc&SAMLResponse=def", Some(&cookie))
        .await?;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("Logged out successfully (session cleared)"));

    let home = env.get("/", Some(&cookie)).await?;
    assert!(home.body.contains("not signed in"));

    Ok(())
}

/// Tests a successful logout response posted to the SLS.
#[tokio::test]
async fn test_sls_with_successful_response() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let cookie = signed_in(&env).await?;

    let response = env
        .post_form(
            "/sls",
            &[("SAMLResponse", &encode(&logout_response("Success")))],
            Some(&cookie),
        )
        .await?;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains(
        "Successfully logged out from both the application and the identity provider"
    ));
    assert!(response.body.contains("SAML logout - Complete"));

    Ok(())
}

/// Tests that a failed or unreadable logout response still ends the session.
#[tokio::test]
async fn test_sls_with_failed_response() -> anyhow::Result<()> {
    let env = TestEnv::new();

    for message in [encode(&logout_response("Responder")), "garbage".to_string()] {
        let cookie = signed_in(&env).await?;

        let response = env
            .post_form("/sls", &[("SAMLLogoutResponse", &message)], Some(&cookie))
            .await?;

        assert_eq!(response.status, StatusCode::OK);
        assert!(response
            .body
            .contains("completed with a protocol-level warning"));

        let home = env.get("/", Some(&cookie)).await?;
        assert!(home.body.contains("not signed in"));
    }

    Ok(())
}

/// Tests that a logout response posted to the ACS is handled as logout.
#[tokio::test]
async fn test_logout_response_on_callback() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let cookie = signed_in(&env).await?;

    let response = env
        .post_form(
            "/callback",
            &[("SAMLResponse", &encode(&logout_response("Success")))],
            Some(&cookie),
        )
        .await?;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("SAML logout - Complete"));

    let home = env.get("/", Some(&cookie)).await?;
    assert!(home.body.contains("not signed in"));

    Ok(())
}

/// Tests that a logout response posted to the home page is handled as logout.
#[tokio::test]
async fn test_logout_response_on_home() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let cookie = signed_in(&env).await?;

    let response = env
        .post_form(
            "/",
            &[("SAMLLogoutResponse", &encode(&logout_response("Success")))],
            Some(&cookie),
        )
        .await?;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("SAML logout - Complete"));

    let plain = env.post_form("/", &[], None).await?;
    assert!(plain.body.contains("not signed in"));

    Ok(())
}
