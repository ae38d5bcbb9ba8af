//! SAML Assertion types.
//!
//! Assertions contain statements about a subject made by an identity provider.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::NameId;
use crate::error::{SamlError, SamlResult};

/// SAML Assertion.
///
/// A package of information that supplies statements made by a SAML authority.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Assertion {
    /// Unique identifier for this assertion.
    pub id: String,

    /// Timestamp when this assertion was issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_instant: Option<DateTime<Utc>>,

    /// The entity ID of the issuer.
    pub issuer: String,

    /// The subject of this assertion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,

    /// Conditions under which this assertion is valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Conditions>,

    /// Authentication statements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authn_statements: Vec<AuthnStatement>,

    /// Attribute statements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attribute_statements: Vec<AttributeStatement>,
}

impl Assertion {
    /// Returns the subject's name identifier, if any.
    #[must_use]
    pub fn name_id(&self) -> Option<&NameId> {
        self.subject.as_ref().and_then(|s| s.name_id.as_ref())
    }

    /// Returns the first session index carried by an authentication statement.
    #[must_use]
    pub fn session_index(&self) -> Option<&str> {
        self.authn_statements
            .iter()
            .find_map(|s| s.session_index.as_deref())
    }

    /// Iterates over every attribute in every attribute statement, in document order.
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attribute_statements
            .iter()
            .flat_map(|s| s.attributes.iter())
    }

    /// Checks the validity window and audience restriction.
    ///
    /// `clock_skew` widens the window on both ends.
    pub fn validate_conditions(
        &self,
        audience: &str,
        now: DateTime<Utc>,
        clock_skew: Duration,
    ) -> SamlResult<()> {
        let Some(conditions) = &self.conditions else {
            return Ok(());
        };

        if let Some(not_before) = conditions.not_before {
            if now + clock_skew < not_before {
                return Err(SamlError::AssertionNotYetValid);
            }
        }

        if let Some(not_on_or_after) = conditions.not_on_or_after {
            if now - clock_skew >= not_on_or_after {
                return Err(SamlError::AssertionExpired);
            }
        }

        if !conditions.audiences.is_empty() && !conditions.audiences.iter().any(|a| a == audience)
        {
            return Err(SamlError::InvalidAudience {
                expected: audience.to_string(),
                actual: conditions.audiences.join(", "),
            });
        }

        Ok(())
    }
}

/// SAML Subject.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subject {
    /// The name identifier of the subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_id: Option<NameId>,

    /// Recipient URLs named by bearer subject confirmations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipients: Vec<String>,
}

/// Conditions for assertion validity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conditions {
    /// Time before which the assertion is not valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,

    /// Time at or after which the assertion is not valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_on_or_after: Option<DateTime<Utc>>,

    /// Audiences named by audience restrictions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audiences: Vec<String>,
}

/// Authentication statement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthnStatement {
    /// When the authentication occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authn_instant: Option<DateTime<Utc>>,

    /// Session index for single logout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_index: Option<String>,
}

/// Attribute statement containing user attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeStatement {
    /// The attributes.
    pub attributes: Vec<Attribute>,
}

/// A SAML attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// The attribute name.
    pub name: String,

    /// The attribute name format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_format: Option<String>,

    /// A human-readable name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,

    /// The attribute values.
    pub values: Vec<String>,
}

impl Attribute {
    /// Creates an attribute with the given name and no values.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            name_format: None,
            friendly_name: None,
            values: Vec::new(),
        }
    }
}
