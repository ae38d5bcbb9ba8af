//! Common test utilities and fixtures.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use base64::Engine;
use tower::ServiceExt;

use sp_protocol_saml::SignatureVerifier;
use sp_server::{create_router, AppState, Environment, ServerConfig};

/// Verifier that accepts or rejects every signature.
pub struct StubVerifier(pub bool);

impl SignatureVerifier for StubVerifier {
    fn verify(&self, _document: &str, _certificate: &[u8]) -> bool {
        self.0
    }
}

/// An in-process service provider.
pub struct TestEnv {
    /// The router under test.
    pub router: Router,
    /// The configuration it was built from.
    pub config: ServerConfig,
}

/// A buffered response.
pub struct TestResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Body as text.
    pub body: String,
}

impl TestResponse {
    /// Returns the `Location` header.
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    /// Returns the `Content-Type` header.
    pub fn content_type(&self) -> &str {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    /// Returns the `name=value` pair of the session cookie, if one was set.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string)
    }

    /// Parses the body as JSON.
    pub fn json(&self) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

impl TestEnv {
    /// Creates a production-mode SP whose signature checks pass.
    pub fn new() -> Self {
        Self::with_config(ServerConfig::for_testing(), true)
    }

    /// Creates a development-mode SP with every reduced-trust tier enabled.
    pub fn development(signatures_verify: bool) -> Self {
        let mut config = ServerConfig::for_testing();
        config.environment = Environment::Development;
        Self::with_config(config, signatures_verify)
    }

    /// Creates an SP from `config`.
    pub fn with_config(config: ServerConfig, signatures_verify: bool) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("sp_server=debug,sp_auth=debug")
            .with_test_writer()
            .try_init();

        let state =
            AppState::with_verifier(config.clone(), Arc::new(StubVerifier(signatures_verify)));
        Self {
            router: create_router(state),
            config,
        }
    }

    /// Sends a GET request.
    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> anyhow::Result<TestResponse> {
        let mut request = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::empty())?).await
    }

    /// Sends a form-encoded POST request.
    pub async fn post_form(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
        cookie: Option<&str>,
    ) -> anyhow::Result<TestResponse> {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::from(body))?).await
    }

    /// Posts `xml` to the ACS and returns the session cookie it set.
    pub async fn login(&self, xml: &str) -> anyhow::Result<(TestResponse, Option<String>)> {
        let response = self
            .post_form("/callback", &[("SAMLResponse", &encode(xml))], None)
            .await?;
        let cookie = response.session_cookie();
        Ok((response, cookie))
    }

    async fn send(&self, request: Request<Body>) -> anyhow::Result<TestResponse> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;

        Ok(TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

// ============================================================================
// SAML fixtures
// ============================================================================

/// Base64-encodes a SAML document as the POST binding does.
pub fn encode(xml: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(xml)
}

/// A `saml:Attribute` element.
pub fn attribute(name: &str, values: &[&str]) -> String {
    let values: String = values
        .iter()
        .map(|v| format!("<saml:AttributeValue>{v}</saml:AttributeValue>"))
        .collect();
    format!(r#"<saml:Attribute Name="{name}">{values}</saml:Attribute>"#)
}

/// A login response from the test IdP addressed to the test SP.
pub fn saml_response(name_id: &str, attributes: &str, signed: bool) -> String {
    response_with_status("Success", name_id, attributes, signed)
}

/// A login response with the given top-level status code.
pub fn response_with_status(status: &str, name_id: &str, attributes: &str, signed: bool) -> String {
    let signature = if signed {
        r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:SignedInfo/></ds:Signature>"#
    } else {
        ""
    };
    format!(
        r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_resp1" Version="2.0" IssueInstant="2024-01-01T00:00:00Z" Destination="http://localhost:8000/callback">
  <saml:Issuer>http://localhost:8080/realms/demo</saml:Issuer>
  <samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:{status}"/></samlp:Status>
  <saml:Assertion ID="_assert1" Version="2.0" IssueInstant="2024-01-01T00:00:00Z">
    <saml:Issuer>http://localhost:8080/realms/demo</saml:Issuer>{signature}
    <saml:Subject>
      <saml:NameID Format="urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified">{name_id}</saml:NameID>
      <saml:SubjectConfirmation Method="urn:oasis:names:tc:SAML:2.0:cm:bearer">
        <saml:SubjectConfirmationData Recipient="http://localhost:8000/callback" NotOnOrAfter="2999-01-01T00:00:00Z"/>
      </saml:SubjectConfirmation>
    </saml:Subject>
    <saml:Conditions NotBefore="2000-01-01T00:00:00Z" NotOnOrAfter="2999-01-01T00:00:00Z">
      <saml:AudienceRestriction><saml:Audience>http://localhost:8000/metadata</saml:Audience></saml:AudienceRestriction>
    </saml:Conditions>
    <saml:AuthnStatement AuthnInstant="2024-01-01T00:00:00Z" SessionIndex="session-42"/>
    <saml:AttributeStatement>{attributes}</saml:AttributeStatement>
  </saml:Assertion>
</samlp:Response>"#
    )
}

/// A logout response from the test IdP.
pub fn logout_response(status: &str) -> String {
    format!(
        r#"<samlp:LogoutResponse xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_logout1" Version="2.0" IssueInstant="2024-01-01T00:00:00Z" Destination="http://localhost:8000/sls">
  <saml:Issuer>http://localhost:8080/realms/demo</saml:Issuer>
  <samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:{status}"/></samlp:Status>
</samlp:LogoutResponse>"#
    )
}
