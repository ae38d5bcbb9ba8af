//! Session record model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attributes::NormalizedAttributes;

/// Which validation tier admitted the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationMode {
    /// Fully validated response.
    #[default]
    Strict,
    /// Signed response whose attributes were discarded for repeated names.
    LenientDuplicate,
    /// Attributes read from a response whose signature was not verified.
    SignatureBypassed,
}

impl ValidationMode {
    /// Returns a stable name for this mode.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::LenientDuplicate => "lenient_duplicate",
            Self::SignatureBypassed => "signature_bypassed",
        }
    }

    /// Returns true for the reduced-trust tiers.
    #[must_use]
    pub const fn is_lenient(&self) -> bool {
        !matches!(self, Self::Strict)
    }

    /// Returns the message shown to the user after login.
    #[must_use]
    pub const fn login_message(&self) -> &'static str {
        match self {
            Self::Strict => "User authenticated successfully",
            Self::LenientDuplicate => {
                "User authenticated successfully (attributes skipped due to duplicate names)"
            }
            Self::SignatureBypassed => {
                "User authenticated successfully (development mode - signature validation bypassed)"
            }
        }
    }
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw SAML kept for display on the success page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticCapture {
    /// The posted base64 payload.
    pub raw_response: String,
    /// The decoded document, if decoding succeeded.
    pub decoded_xml: Option<String>,
}

/// The session of an authenticated browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Subject name identifier.
    pub name_id: String,
    /// Canonical attributes.
    pub attributes: NormalizedAttributes,
    /// Permission names granted by the IdP.
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Whether the user is signed in.
    pub authenticated: bool,
    /// How the login response was validated.
    pub validation_mode: ValidationMode,
    /// IdP session index, used for single logout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_index: Option<String>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Raw SAML captured at login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<DiagnosticCapture>,
}

impl SessionRecord {
    /// Creates an authenticated record.
    #[must_use]
    pub fn new(
        name_id: impl Into<String>,
        attributes: NormalizedAttributes,
        validation_mode: ValidationMode,
    ) -> Self {
        Self {
            name_id: name_id.into(),
            attributes,
            permissions: Vec::new(),
            authenticated: true,
            validation_mode,
            session_index: None,
            created_at: Utc::now(),
            diagnostics: None,
        }
    }

    /// Sets the granted permissions.
    #[must_use]
    pub fn with_permissions(mut self, permissions: Vec<String>) -> Self {
        self.permissions = permissions;
        self
    }

    /// Sets the IdP session index.
    #[must_use]
    pub fn with_session_index(mut self, session_index: Option<String>) -> Self {
        self.session_index = session_index;
        self
    }

    /// Attaches captured raw SAML.
    #[must_use]
    pub fn with_diagnostics(mut self, capture: DiagnosticCapture) -> Self {
        self.diagnostics = Some(capture);
        self
    }

    /// Returns true if the record may be stored.
    ///
    /// An authenticated record must carry a subject.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        !self.authenticated || !self.name_id.trim().is_empty()
    }
}
