//! Metadata, status and health endpoint integration tests.

use axum::http::StatusCode;

use crate::common::TestEnv;

/// Tests that the SP metadata endpoint returns valid XML.
#[tokio::test]
async fn test_metadata_endpoint() -> anyhow::Result<()> {
    let env = TestEnv::new();

    let response = env.get("/metadata", None).await?;

    assert_eq!(response.status, StatusCode::OK);
    assert!(
        response.content_type().starts_with("text/xml"),
        "Expected XML content type, got {}",
        response.content_type()
    );
    assert!(response.body.contains("EntityDescriptor"));
    assert!(response.body.contains(r#"entityID="http://localhost:8000/metadata""#));
    assert!(response.body.contains("SPSSODescriptor"));
    assert!(response.body.contains("AssertionConsumerService"));
    assert!(response.body.contains("http://localhost:8000/callback"));
    assert!(response.body.contains("SingleLogoutService"));

    Ok(())
}

/// Tests that configuration errors are reported as plain text.
#[tokio::test]
async fn test_metadata_with_invalid_configuration() -> anyhow::Result<()> {
    let mut config = sp_server::ServerConfig::for_testing();
    config.saml.sp.acs_url = "not a url".to_string();
    config.saml.sp.entity_id = String::new();
    let env = TestEnv::with_config(config, true);

    let response = env.get("/metadata", None).await?;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.content_type().starts_with("text/plain"));
    assert!(response.body.contains("sp_entityId_not_found"));
    assert!(response.body.contains("sp_acs_url_invalid"));
    assert!(response.body.contains(", "));

    Ok(())
}

/// Tests the home page without a session.
#[tokio::test]
async fn test_home_anonymous() -> anyhow::Result<()> {
    let env = TestEnv::new();

    let response = env.get("/", None).await?;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("not signed in"));
    assert!(response.body.contains(r#"href="/login""#));

    let unknown = env.get("/", Some("sp_session=unknown-scope")).await?;
    assert!(unknown.body.contains("not signed in"));

    Ok(())
}

/// Tests the health endpoint.
#[tokio::test]
async fn test_health_check() -> anyhow::Result<()> {
    let env = TestEnv::new();

    let response = env.get("/health", None).await?;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()?["status"], "healthy");

    Ok(())
}

/// Tests that unknown paths are not routed.
#[tokio::test]
async fn test_unknown_path() -> anyhow::Result<()> {
    let env = TestEnv::new();

    let response = env.get("/admin", None).await?;

    assert_eq!(response.status, StatusCode::NOT_FOUND);

    Ok(())
}
