//! The SAML processing capability consumed by the authentication core.
//!
//! [`SamlProcessor`] is the seam between the login/logout engine and the
//! protocol details. [`ServiceProvider`] is the production implementation:
//! it validates inbound responses in a fixed order so that callers can rely
//! on which checks have already passed when a given error is returned.
//!
//! # Validation order
//!
//! 1. Base64 decode and parse (`Base64Decode`, `XmlParse`, `SchemaInvalid`)
//! 2. Version and ID (`SchemaInvalid`)
//! 3. Top-level status; a non-success status is not an error
//! 4. Signature presence and verification (`SignatureMissing`, `SignatureInvalid`)
//! 5. Strict checks: destination, issuer, recipient, audience, time window
//! 6. Attribute names must be unique (`DuplicateAttributeName`)

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::bindings::{HttpPostBinding, HttpRedirectBinding};
use crate::error::{SamlError, SamlResult};
use crate::idp::IdpResolver;
use crate::metadata::build_sp_metadata;
use crate::parser::{parse_logout_response, parse_response, root_element};
use crate::settings::{IdpSettings, SamlSettings};
use crate::signature::{has_signature, SignatureVerifier};
use crate::types::{
    Attribute, AuthnRequest, LogoutRequest, LogoutResponse, NameId, NameIdFormat, NameIdPolicy,
    Response, SamlBinding, Status,
};

/// Name ID format used to identify the IdP itself when no subject is known.
const NAMEID_ENTITY: &str = "urn:oasis:names:tc:SAML:2.0:nameid-format:entity";

/// A logout message delivered to the single logout service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SloMessage {
    /// The encoded message as received.
    pub encoded: String,
    /// The binding it arrived on.
    pub binding: SamlBinding,
}

impl SloMessage {
    /// A message posted in a form field.
    #[must_use]
    pub fn post(encoded: impl Into<String>) -> Self {
        Self {
            encoded: encoded.into(),
            binding: SamlBinding::HttpPost,
        }
    }

    /// A message carried in a redirect query string.
    #[must_use]
    pub fn redirect(encoded: impl Into<String>) -> Self {
        Self {
            encoded: encoded.into(),
            binding: SamlBinding::HttpRedirect,
        }
    }
}

/// The outcome of successful response processing.
#[derive(Debug, Clone)]
pub struct ProcessedResponse {
    /// The subject's name identifier.
    pub name_id: Option<String>,
    /// The subject's name identifier format.
    pub name_id_format: Option<String>,
    /// Session index for single logout.
    pub session_index: Option<String>,
    /// Validated attributes in document order.
    pub attributes: Vec<Attribute>,
    /// Response issuer.
    pub issuer: Option<String>,
    /// True only if the IdP reported success.
    pub authenticated: bool,
    /// The top-level status.
    pub status: Status,
}

/// SAML operations needed by the login and logout flows.
#[async_trait]
pub trait SamlProcessor: Send + Sync {
    /// Validates a base64-encoded `SAMLResponse` posted to the ACS.
    async fn process_response(&self, saml_response: &str) -> SamlResult<ProcessedResponse>;

    /// Builds the IdP redirect URL carrying a new `AuthnRequest`.
    async fn login_url(&self, relay_state: Option<&str>) -> SamlResult<String>;

    /// Builds the IdP redirect URL carrying a `LogoutRequest`.
    async fn logout_url(
        &self,
        name_id: Option<&str>,
        session_index: Option<&str>,
        return_to: Option<&str>,
    ) -> SamlResult<String>;

    /// Decodes and checks a `LogoutResponse` sent back by the IdP.
    async fn process_slo(&self, message: &SloMessage) -> SamlResult<LogoutResponse>;

    /// Generates SP metadata, or the configuration errors preventing it.
    fn metadata(&self) -> Result<String, Vec<String>>;
}

/// Returns true if `encoded` is a base64 `LogoutResponse` rather than an
/// authentication response.
#[must_use]
pub fn is_logout_response(encoded: &str) -> bool {
    HttpPostBinding::decode_payload(encoded)
        .and_then(|xml| root_element(&xml))
        .is_ok_and(|root| root == "LogoutResponse")
}

/// The service provider.
pub struct ServiceProvider {
    settings: SamlSettings,
    verifier: Arc<dyn SignatureVerifier>,
    idp: IdpResolver,
}

impl ServiceProvider {
    /// Creates a service provider using the static IdP settings.
    #[must_use]
    pub fn new(settings: SamlSettings, verifier: Arc<dyn SignatureVerifier>) -> Self {
        let idp = IdpResolver::new(settings.idp.clone(), std::time::Duration::from_secs(5));
        Self {
            settings,
            verifier,
            idp,
        }
    }

    /// Replaces the IdP resolver.
    #[must_use]
    pub fn with_idp_resolver(mut self, idp: IdpResolver) -> Self {
        self.idp = idp;
        self
    }

    /// Returns the configured settings.
    #[must_use]
    pub const fn settings(&self) -> &SamlSettings {
        &self.settings
    }

    fn check_signature(&self, xml: &str, idp: &IdpSettings) -> SamlResult<()> {
        if !self.settings.security.requires_signature() {
            return Ok(());
        }
        if !has_signature(xml) {
            return Err(SamlError::SignatureMissing);
        }
        let certificate = idp.certificate_der().ok_or_else(|| {
            SamlError::SignatureInvalid("no IdP signing certificate configured".to_string())
        })?;
        if self.verifier.verify(xml, &certificate) {
            Ok(())
        } else {
            Err(SamlError::SignatureInvalid(
                "signature did not verify against the IdP certificate".to_string(),
            ))
        }
    }

    fn check_strict(&self, response: &Response, idp: &IdpSettings) -> SamlResult<()> {
        let acs = &self.settings.sp.acs_url;

        if let Some(destination) = &response.destination {
            if destination != acs {
                return Err(SamlError::InvalidDestination {
                    expected: acs.clone(),
                    actual: destination.clone(),
                });
            }
        }

        if let Some(issuer) = &response.issuer {
            if issuer != &idp.entity_id {
                return Err(SamlError::InvalidIssuer {
                    expected: idp.entity_id.clone(),
                    actual: issuer.clone(),
                });
            }
        }

        let skew = chrono::Duration::seconds(self.settings.security.clock_skew_secs);
        for assertion in &response.assertions {
            if !assertion.issuer.is_empty() && assertion.issuer != idp.entity_id {
                return Err(SamlError::InvalidIssuer {
                    expected: idp.entity_id.clone(),
                    actual: assertion.issuer.clone(),
                });
            }
            if let Some(subject) = &assertion.subject {
                if !subject.recipients.is_empty() && !subject.recipients.iter().any(|r| r == acs) {
                    return Err(SamlError::InvalidDestination {
                        expected: acs.clone(),
                        actual: subject.recipients.join(", "),
                    });
                }
            }
            assertion.validate_conditions(&self.settings.sp.entity_id, Utc::now(), skew)?;
        }

        Ok(())
    }
}

fn check_unique_attribute_names(response: &Response) -> SamlResult<()> {
    for assertion in &response.assertions {
        let mut seen = HashSet::new();
        for attribute in assertion.attributes() {
            if !seen.insert(attribute.name.as_str()) {
                return Err(SamlError::DuplicateAttributeName(attribute.name.clone()));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl SamlProcessor for ServiceProvider {
    async fn process_response(&self, saml_response: &str) -> SamlResult<ProcessedResponse> {
        let xml = HttpPostBinding::decode_payload(saml_response)?;
        let response = parse_response(&xml)?;
        response.validate().map_err(SamlError::SchemaInvalid)?;

        if !response.is_success() {
            debug!(
                status = %response.status.describe(),
                "IdP reported unsuccessful authentication"
            );
            return Ok(ProcessedResponse {
                name_id: None,
                name_id_format: None,
                session_index: None,
                attributes: Vec::new(),
                issuer: response.issuer.clone(),
                authenticated: false,
                status: response.status,
            });
        }

        let Some(assertion) = response.first_assertion() else {
            let reason = if response.encrypted_assertions > 0 {
                "encrypted assertions are not supported"
            } else {
                "response contains no assertion"
            };
            return Err(SamlError::SchemaInvalid(reason.to_string()));
        };

        let idp = self.idp.resolve().await?;
        self.check_signature(&xml, &idp)?;
        if self.settings.strict {
            self.check_strict(&response, &idp)?;
        }
        check_unique_attribute_names(&response)?;

        let name_id = assertion.name_id();
        Ok(ProcessedResponse {
            name_id: name_id
                .map(|n| n.value.clone())
                .filter(|v| !v.is_empty()),
            name_id_format: name_id.and_then(|n| n.format.clone()),
            session_index: assertion.session_index().map(str::to_string),
            attributes: assertion.attributes().cloned().collect(),
            issuer: response.issuer.clone(),
            authenticated: true,
            status: response.status.clone(),
        })
    }

    async fn login_url(&self, relay_state: Option<&str>) -> SamlResult<String> {
        let idp = self.idp.resolve().await?;
        if idp.sso_url.is_empty() {
            return Err(SamlError::Configuration(
                "IdP single sign-on service is not configured".to_string(),
            ));
        }

        let format = NameIdFormat::from_uri(&self.settings.sp.name_id_format).unwrap_or_default();
        let request = AuthnRequest::new(&self.settings.sp.entity_id)
            .with_acs_url(&self.settings.sp.acs_url)
            .with_destination(&idp.sso_url)
            .with_name_id_policy(NameIdPolicy::new(format));

        debug!(request_id = %request.id, destination = %idp.sso_url, "Built AuthnRequest");
        HttpRedirectBinding::encode_request(&request.to_xml(), &idp.sso_url, relay_state)
    }

    async fn logout_url(
        &self,
        name_id: Option<&str>,
        session_index: Option<&str>,
        return_to: Option<&str>,
    ) -> SamlResult<String> {
        let idp = self.idp.resolve().await?;
        let slo_url = idp.slo_url.as_deref().filter(|u| !u.is_empty()).ok_or_else(|| {
            SamlError::Configuration("IdP single logout service is not configured".to_string())
        })?;

        let subject = match name_id {
            Some(value) => NameId::new(value).with_format(&self.settings.sp.name_id_format),
            None => NameId::new(&idp.entity_id).with_format(NAMEID_ENTITY),
        };

        let mut request = LogoutRequest::new(&self.settings.sp.entity_id, subject)
            .with_destination(slo_url)
            .with_reason(LogoutRequest::REASON_USER);
        if let Some(index) = session_index {
            request = request.with_session_index(index);
        }

        debug!(request_id = %request.id, destination = %slo_url, "Built LogoutRequest");
        HttpRedirectBinding::encode_request(&request.to_xml(), slo_url, return_to)
    }

    async fn process_slo(&self, message: &SloMessage) -> SamlResult<LogoutResponse> {
        let xml = match message.binding {
            SamlBinding::HttpPost => HttpPostBinding::decode_payload(&message.encoded)?,
            SamlBinding::HttpRedirect => {
                HttpRedirectBinding::decode(None, Some(&message.encoded), None)?.xml
            }
        };
        let response = parse_logout_response(&xml)?;

        if self.settings.strict {
            let idp = self.idp.current();
            if let Some(issuer) = &response.issuer {
                if issuer != &idp.entity_id {
                    return Err(SamlError::InvalidIssuer {
                        expected: idp.entity_id,
                        actual: issuer.clone(),
                    });
                }
            }
        }

        Ok(response)
    }

    fn metadata(&self) -> Result<String, Vec<String>> {
        build_sp_metadata(&self.settings)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::settings::tests::valid_settings;
    use base64::Engine;

    /// Verifier that accepts or rejects every document.
    pub(crate) struct StubVerifier(pub bool);

    impl SignatureVerifier for StubVerifier {
        fn verify(&self, _document: &str, _certificate: &[u8]) -> bool {
            self.0
        }
    }

    fn provider(verifies: bool) -> ServiceProvider {
        ServiceProvider::new(valid_settings(), Arc::new(StubVerifier(verifies)))
    }

    fn encode(xml: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(xml)
    }

    fn response_xml(attributes: &str, signed: bool) -> String {
        let signature = if signed {
            r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:SignedInfo/></ds:Signature>"#
        } else {
            ""
        };
        format!(
            r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_r1" Version="2.0" Destination="http://localhost:8000/callback">
  <saml:Issuer>http://localhost:8080/realms/demo</saml:Issuer>
  <samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/></samlp:Status>
  <saml:Assertion ID="_a1" Version="2.0">
    <saml:Issuer>http://localhost:8080/realms/demo</saml:Issuer>{signature}
    <saml:Subject><saml:NameID Format="urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified">alice</saml:NameID></saml:Subject>
    <saml:Conditions NotBefore="2000-01-01T00:00:00Z" NotOnOrAfter="2999-01-01T00:00:00Z">
      <saml:AudienceRestriction><saml:Audience>http://localhost:8000/metadata</saml:Audience></saml:AudienceRestriction>
    </saml:Conditions>
    <saml:AuthnStatement AuthnInstant="2024-01-01T00:00:00Z" SessionIndex="idx-1"/>
    <saml:AttributeStatement>{attributes}</saml:AttributeStatement>
  </saml:Assertion>
</samlp:Response>"#
        )
    }

    const ATTRIBUTES: &str = r#"<saml:Attribute Name="email"><saml:AttributeValue>alice@example.com</saml:AttributeValue></saml:Attribute>"#;
    const DUPLICATED: &str = r#"<saml:Attribute Name="role"><saml:AttributeValue>admin</saml:AttributeValue></saml:Attribute><saml:Attribute Name="role"><saml:AttributeValue>user</saml:AttributeValue></saml:Attribute>"#;

    #[tokio::test]
    async fn signed_response_is_accepted() {
        let processed = provider(true)
            .process_response(&encode(&response_xml(ATTRIBUTES, true)))
            .await
            .unwrap();

        assert!(processed.authenticated);
        assert_eq!(processed.name_id.as_deref(), Some("alice"));
        assert_eq!(processed.session_index.as_deref(), Some("idx-1"));
        assert_eq!(processed.attributes.len(), 1);
        assert_eq!(processed.attributes[0].values, ["alice@example.com"]);
    }

    #[tokio::test]
    async fn unsigned_response_is_signature_missing() {
        let err = provider(true)
            .process_response(&encode(&response_xml(ATTRIBUTES, false)))
            .await
            .unwrap_err();
        assert!(matches!(err, SamlError::SignatureMissing));
    }

    #[tokio::test]
    async fn failed_verification_is_signature_invalid() {
        let err = provider(false)
            .process_response(&encode(&response_xml(ATTRIBUTES, true)))
            .await
            .unwrap_err();
        assert!(matches!(err, SamlError::SignatureInvalid(_)));
    }

    #[tokio::test]
    async fn duplicates_are_detected_after_signature() {
        let err = provider(true)
            .process_response(&encode(&response_xml(DUPLICATED, true)))
            .await
            .unwrap_err();
        assert!(matches!(err, SamlError::DuplicateAttributeName(ref n) if n == "role"));

        let err = provider(true)
            .process_response(&encode(&response_xml(DUPLICATED, false)))
            .await
            .unwrap_err();
        assert!(matches!(err, SamlError::SignatureMissing));
    }

    #[tokio::test]
    async fn strict_mode_checks_audience() {
        let mut settings = valid_settings();
        settings.sp.entity_id = "http://other-sp/metadata".to_string();
        let sp = ServiceProvider::new(settings, Arc::new(StubVerifier(true)));

        let err = sp
            .process_response(&encode(&response_xml(ATTRIBUTES, true)))
            .await
            .unwrap_err();
        assert!(matches!(err, SamlError::InvalidAudience { .. }));
    }

    #[tokio::test]
    async fn non_success_status_is_not_authenticated() {
        let xml = r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="_r" Version="2.0"><samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Responder"/></samlp:Status></samlp:Response>"#;
        let processed = provider(true).process_response(&encode(xml)).await.unwrap();
        assert!(!processed.authenticated);
        assert!(processed.name_id.is_none());
    }

    #[tokio::test]
    async fn garbage_is_rejected_before_signature() {
        let err = provider(true).process_response("%%%").await.unwrap_err();
        assert!(matches!(err, SamlError::Base64Decode(_)));

        let err = provider(true)
            .process_response(&encode("<samlp:Response"))
            .await
            .unwrap_err();
        assert!(matches!(err, SamlError::XmlParse(_)));
    }

    #[tokio::test]
    async fn login_url_carries_deflated_request() {
        let url = provider(true).login_url(Some("http://localhost:8000/")).await.unwrap();
        assert!(url.starts_with("http://localhost:8080/realms/demo/protocol/saml?SAMLRequest="));
        assert!(url.contains("&RelayState=http%3A%2F%2Flocalhost%3A8000%2F"));

        let decoded = HttpRedirectBinding::decode_url(&url).unwrap();
        assert!(decoded.xml.contains("AuthnRequest"));
        assert!(decoded.xml.contains(r#"AssertionConsumerServiceURL="http://localhost:8000/callback""#));
    }

    #[tokio::test]
    async fn logout_url_includes_subject_and_session_index() {
        let url = provider(true)
            .logout_url(Some("alice"), Some("idx-1"), None)
            .await
            .unwrap();
        let decoded = HttpRedirectBinding::decode_url(&url).unwrap();
        assert!(decoded.xml.contains(">alice</saml:NameID>"));
        assert!(decoded.xml.contains("<samlp:SessionIndex>idx-1</samlp:SessionIndex>"));

        let url = provider(true).logout_url(None, None, None).await.unwrap();
        let decoded = HttpRedirectBinding::decode_url(&url).unwrap();
        assert!(decoded.xml.contains(NAMEID_ENTITY));
    }

    #[tokio::test]
    async fn logout_url_requires_slo_endpoint() {
        let mut settings = valid_settings();
        settings.idp.slo_url = None;
        let sp = ServiceProvider::new(settings, Arc::new(StubVerifier(true)));
        let err = sp.logout_url(Some("alice"), None, None).await.unwrap_err();
        assert!(matches!(err, SamlError::Configuration(_)));
    }

    #[tokio::test]
    async fn process_slo_reads_status() {
        let xml = r#"<samlp:LogoutResponse xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_l" Version="2.0"><saml:Issuer>http://localhost:8080/realms/demo</saml:Issuer><samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/></samlp:Status></samlp:LogoutResponse>"#;
        let response = provider(true)
            .process_slo(&SloMessage::post(encode(xml)))
            .await
            .unwrap();
        assert!(response.is_success());
        assert!(is_logout_response(&encode(xml)));
        assert!(!is_logout_response(&encode(&response_xml("", true))));
        assert!(!is_logout_response("not base64"));
    }
}
