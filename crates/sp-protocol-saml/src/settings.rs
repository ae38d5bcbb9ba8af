//! Service provider / identity provider pairing configuration.
//!
//! One static SP is paired with one IdP. Settings are validated lazily:
//! [`SamlSettings::check_settings`] returns a list of error codes instead of
//! failing, so a misconfigured SP can still start and report its problems
//! on the metadata endpoint.

use serde::{Deserialize, Serialize};

use crate::signature::certificate_der;
use crate::types::NameIdFormat;

/// Complete SAML configuration for this service provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamlSettings {
    /// Enables destination, audience, issuer and time-window checks.
    #[serde(default = "default_true")]
    pub strict: bool,

    /// This service provider.
    pub sp: SpSettings,

    /// The paired identity provider.
    pub idp: IdpSettings,

    /// Signature and validation requirements.
    #[serde(default)]
    pub security: SecuritySettings,
}

/// Service provider endpoints and identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpSettings {
    /// SP entity ID (usually the metadata URL).
    pub entity_id: String,

    /// Assertion consumer service URL (HTTP-POST).
    pub acs_url: String,

    /// Single logout service URL (HTTP-Redirect).
    #[serde(default)]
    pub sls_url: Option<String>,

    /// Requested NameID format URI.
    #[serde(default = "default_name_id_format")]
    pub name_id_format: String,

    /// SP certificate (PEM or base64 DER), advertised in metadata.
    #[serde(default)]
    pub x509_cert: Option<String>,
}

/// Identity provider endpoints and trust anchor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdpSettings {
    /// IdP entity ID.
    pub entity_id: String,

    /// Single sign-on service URL (HTTP-Redirect).
    pub sso_url: String,

    /// Single logout service URL (HTTP-Redirect).
    #[serde(default)]
    pub slo_url: Option<String>,

    /// IdP signing certificate (PEM or base64 DER).
    #[serde(default)]
    pub x509_cert: Option<String>,
}

impl IdpSettings {
    /// Returns the signing certificate as DER, if configured and decodable.
    #[must_use]
    pub fn certificate_der(&self) -> Option<Vec<u8>> {
        self.x509_cert.as_deref().and_then(certificate_der)
    }
}

/// Signature and validation requirements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySettings {
    /// Require a signature on the assertion or the enclosing response.
    #[serde(default = "default_true")]
    pub want_assertions_signed: bool,

    /// Require a signature on the enclosing response.
    #[serde(default)]
    pub want_messages_signed: bool,

    /// Tolerated clock drift in seconds for time-window checks.
    #[serde(default = "default_clock_skew")]
    pub clock_skew_secs: i64,

    /// Accept SHA-1 signatures.
    #[serde(default)]
    pub allow_sha1: bool,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            want_assertions_signed: true,
            want_messages_signed: false,
            clock_skew_secs: default_clock_skew(),
            allow_sha1: false,
        }
    }
}

impl SecuritySettings {
    /// Returns true if inbound responses must carry a signature.
    #[must_use]
    pub const fn requires_signature(&self) -> bool {
        self.want_assertions_signed || self.want_messages_signed
    }
}

const fn default_true() -> bool {
    true
}

const fn default_clock_skew() -> i64 {
    180
}

fn default_name_id_format() -> String {
    NameIdFormat::Unspecified.uri().to_string()
}

fn is_http_url(value: &str) -> bool {
    url::Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
        .unwrap_or(false)
}

impl SamlSettings {
    /// Creates settings with strict mode and default security requirements.
    #[must_use]
    pub fn new(sp: SpSettings, idp: IdpSettings) -> Self {
        Self {
            strict: true,
            sp,
            idp,
            security: SecuritySettings::default(),
        }
    }

    /// Validates the SP half of the configuration.
    #[must_use]
    pub fn check_sp_settings(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.sp.entity_id.trim().is_empty() {
            errors.push("sp_entityId_not_found".to_string());
        }

        if self.sp.acs_url.trim().is_empty() {
            errors.push("sp_acs_not_found".to_string());
        } else if !is_http_url(&self.sp.acs_url) {
            errors.push("sp_acs_url_invalid".to_string());
        }

        if let Some(sls) = &self.sp.sls_url {
            if !is_http_url(sls) {
                errors.push("sp_sls_url_invalid".to_string());
            }
        }

        if NameIdFormat::from_uri(&self.sp.name_id_format).is_none() {
            errors.push("sp_name_id_format_invalid".to_string());
        }

        if let Some(cert) = &self.sp.x509_cert {
            if certificate_der(cert).is_none() {
                errors.push("sp_cert_invalid".to_string());
            }
        }

        errors
    }

    /// Validates the IdP half of the configuration.
    #[must_use]
    pub fn check_idp_settings(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.idp.entity_id.trim().is_empty() {
            errors.push("idp_entityId_not_found".to_string());
        }

        if self.idp.sso_url.trim().is_empty() {
            errors.push("idp_sso_not_found".to_string());
        } else if !is_http_url(&self.idp.sso_url) {
            errors.push("idp_sso_url_invalid".to_string());
        }

        if let Some(slo) = &self.idp.slo_url {
            if !is_http_url(slo) {
                errors.push("idp_slo_url_invalid".to_string());
            }
        }

        match &self.idp.x509_cert {
            None if self.security.requires_signature() => {
                errors.push("idp_cert_or_fingerprint_not_found_and_required".to_string());
            }
            Some(cert) if certificate_der(cert).is_none() => {
                errors.push("idp_cert_invalid".to_string());
            }
            _ => {}
        }

        errors
    }

    /// Validates the whole configuration, SP errors first.
    #[must_use]
    pub fn check_settings(&self) -> Vec<String> {
        let mut errors = self.check_sp_settings();
        errors.extend(self.check_idp_settings());
        errors
    }
}
