//! SAML Logout types.
//!
//! Single Logout (SLO) request and response messages.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::{xml_escape, NameId, Status, SAMLP_NS, SAML_NS};

/// SAML Logout Request sent by this service provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutRequest {
    /// Unique identifier for this request.
    pub id: String,

    /// Timestamp when this request was issued.
    pub issue_instant: DateTime<Utc>,

    /// The entity ID of the requester.
    pub issuer: String,

    /// The IdP endpoint this request is sent to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// The name identifier of the principal to log out.
    pub name_id: NameId,

    /// Session indexes to terminate.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub session_indexes: Vec<String>,

    /// Reason for the logout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl LogoutRequest {
    /// User logout reason.
    pub const REASON_USER: &'static str = "urn:oasis:names:tc:SAML:2.0:logout:user";

    /// Creates a new logout request.
    #[must_use]
    pub fn new(issuer: impl Into<String>, name_id: NameId) -> Self {
        Self {
            id: format!("_id{}", uuid::Uuid::new_v4()),
            issue_instant: Utc::now(),
            issuer: issuer.into(),
            destination: None,
            name_id,
            session_indexes: Vec::new(),
            reason: None,
        }
    }

    /// Sets the destination.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    /// Adds a session index.
    #[must_use]
    pub fn with_session_index(mut self, index: impl Into<String>) -> Self {
        self.session_indexes.push(index.into());
        self
    }

    /// Sets the logout reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Serializes this request as a `samlp:LogoutRequest` document.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut attrs = format!(
            r#" ID="{}" Version="2.0" IssueInstant="{}""#,
            xml_escape(&self.id),
            self.issue_instant.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        if let Some(destination) = &self.destination {
            attrs.push_str(&format!(r#" Destination="{}""#, xml_escape(destination)));
        }
        if let Some(reason) = &self.reason {
            attrs.push_str(&format!(r#" Reason="{}""#, xml_escape(reason)));
        }

        let indexes: String = self
            .session_indexes
            .iter()
            .map(|i| format!("<samlp:SessionIndex>{}</samlp:SessionIndex>", xml_escape(i)))
            .collect();

        format!(
            r#"<samlp:LogoutRequest xmlns:samlp="{SAMLP_NS}" xmlns:saml="{SAML_NS}"{attrs}><saml:Issuer>{}</saml:Issuer>{}{indexes}</samlp:LogoutRequest>"#,
            xml_escape(&self.issuer),
            self.name_id.to_xml(),
        )
    }
}

/// SAML Logout Response received from the identity provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogoutResponse {
    /// Unique identifier for this response.
    pub id: String,

    /// The entity ID of the responder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// The ID of the request this is responding to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,

    /// The URL where this response was sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// The status of the logout operation.
    pub status: Status,
}

impl LogoutResponse {
    /// Returns true if the logout was successful.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{status_codes, NameIdFormat};

    #[test]
    fn logout_request_xml() {
        let request = LogoutRequest::new(
            "https://sp.example.com/metadata",
            NameId::new("alice").with_format(NameIdFormat::Unspecified.uri()),
        )
        .with_destination("https://idp.example.com/slo")
        .with_session_index("idx-1")
        .with_reason(LogoutRequest::REASON_USER);

        let xml = request.to_xml();
        assert!(xml.starts_with("<samlp:LogoutRequest"));
        assert!(xml.contains(r#"Destination="https://idp.example.com/slo""#));
        assert!(xml.contains(">alice</saml:NameID>"));
        assert!(xml.contains("<samlp:SessionIndex>idx-1</samlp:SessionIndex>"));
        assert!(xml.contains("logout:user"));
    }

    #[test]
    fn logout_response_status() {
        let ok = LogoutResponse::default();
        assert!(ok.is_success());

        let failed = LogoutResponse {
            status: Status::with_code(status_codes::RESPONDER),
            ..LogoutResponse::default()
        };
        assert!(!failed.is_success());
    }
}
