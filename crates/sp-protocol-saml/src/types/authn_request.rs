//! SAML AuthnRequest types.
//!
//! Authentication request message sent by this service provider to the
//! identity provider.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::{xml_escape, NameIdPolicy, SamlBinding, SAMLP_NS, SAML_NS};

/// SAML Authentication Request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthnRequest {
    /// Unique identifier for this request.
    pub id: String,

    /// Timestamp when this request was issued.
    pub issue_instant: DateTime<Utc>,

    /// The entity ID of the service provider issuing the request.
    pub issuer: String,

    /// The URL where the response should be sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_consumer_service_url: Option<String>,

    /// The IdP endpoint this request is sent to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// Binding to use for the response.
    pub protocol_binding: String,

    /// Name ID policy constraints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_id_policy: Option<NameIdPolicy>,

    /// Whether the IdP must authenticate the user directly.
    #[serde(default)]
    pub force_authn: bool,

    /// Whether the IdP must not interact with the user.
    #[serde(default)]
    pub is_passive: bool,
}

impl AuthnRequest {
    /// Creates a new authentication request.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            id: format!("_id{}", uuid::Uuid::new_v4()),
            issue_instant: Utc::now(),
            issuer: issuer.into(),
            assertion_consumer_service_url: None,
            destination: None,
            protocol_binding: SamlBinding::HttpPost.uri().to_string(),
            name_id_policy: None,
            force_authn: false,
            is_passive: false,
        }
    }

    /// Sets the assertion consumer service URL.
    #[must_use]
    pub fn with_acs_url(mut self, url: impl Into<String>) -> Self {
        self.assertion_consumer_service_url = Some(url.into());
        self
    }

    /// Sets the destination.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    /// Sets the name ID policy.
    #[must_use]
    pub fn with_name_id_policy(mut self, policy: NameIdPolicy) -> Self {
        self.name_id_policy = Some(policy);
        self
    }

    /// Requests forced re-authentication.
    #[must_use]
    pub const fn force_authn(mut self, force: bool) -> Self {
        self.force_authn = force;
        self
    }

    /// Serializes this request as a `samlp:AuthnRequest` document.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut attrs = format!(
            r#" ID="{}" Version="2.0" IssueInstant="{}" ProtocolBinding="{}""#,
            xml_escape(&self.id),
            self.issue_instant.to_rfc3339_opts(SecondsFormat::Secs, true),
            xml_escape(&self.protocol_binding),
        );
        if let Some(destination) = &self.destination {
            attrs.push_str(&format!(r#" Destination="{}""#, xml_escape(destination)));
        }
        if let Some(acs) = &self.assertion_consumer_service_url {
            attrs.push_str(&format!(
                r#" AssertionConsumerServiceURL="{}""#,
                xml_escape(acs)
            ));
        }
        if self.force_authn {
            attrs.push_str(r#" ForceAuthn="true""#);
        }
        if self.is_passive {
            attrs.push_str(r#" IsPassive="true""#);
        }

        let policy = self
            .name_id_policy
            .as_ref()
            .map(|p| {
                let format = p
                    .format
                    .as_deref()
                    .map(|f| format!(r#" Format="{}""#, xml_escape(f)))
                    .unwrap_or_default();
                format!(
                    r#"<samlp:NameIDPolicy{format} AllowCreate="{}"/>"#,
                    p.allow_create
                )
            })
            .unwrap_or_default();

        format!(
            r#"<samlp:AuthnRequest xmlns:samlp="{SAMLP_NS}" xmlns:saml="{SAML_NS}"{attrs}><saml:Issuer>{}</saml:Issuer>{policy}</samlp:AuthnRequest>"#,
            xml_escape(&self.issuer)
        )
    }
}
