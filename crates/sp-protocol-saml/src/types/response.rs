//! SAML Response types.
//!
//! The protocol message an identity provider posts back to the assertion
//! consumer service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Assertion, Status};

/// SAML Response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Unique identifier for this response.
    pub id: String,

    /// Version of the SAML protocol.
    pub version: String,

    /// Timestamp when this response was issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_instant: Option<DateTime<Utc>>,

    /// The entity ID of the issuer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// The ID of the request this is responding to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,

    /// The URL where this response was sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// The status of the response.
    pub status: Status,

    /// Assertions included in this response.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<Assertion>,

    /// Number of `EncryptedAssertion` elements, which this SP does not decrypt.
    #[serde(default)]
    pub encrypted_assertions: usize,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            id: String::new(),
            version: "2.0".to_string(),
            issue_instant: None,
            issuer: None,
            in_response_to: None,
            destination: None,
            status: Status::success(),
            assertions: Vec::new(),
            encrypted_assertions: 0,
        }
    }
}

impl Response {
    /// Returns true if this response indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Validates the basic structure of this response.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("ID is required".to_string());
        }
        if self.version != "2.0" {
            return Err(format!("Unsupported SAML version: {}", self.version));
        }
        Ok(())
    }

    /// Gets the first assertion if present.
    #[must_use]
    pub fn first_assertion(&self) -> Option<&Assertion> {
        self.assertions.first()
    }
}
