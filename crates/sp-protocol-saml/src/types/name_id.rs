//! SAML Name ID types.
//!
//! Name identifiers are used to identify subjects in SAML assertions.

use serde::{Deserialize, Serialize};

use super::{xml_escape, NameIdFormat, SAML_NS};

/// SAML Name ID.
///
/// Represents the identifier of a subject in a SAML assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameId {
    /// The actual identifier value.
    pub value: String,

    /// The format of the name identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// The service provider's entity ID that qualifies the name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sp_name_qualifier: Option<String>,
}

impl NameId {
    /// Creates a new name ID with the given value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            format: None,
            sp_name_qualifier: None,
        }
    }

    /// Sets the format for this name ID.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Returns the parsed name ID format.
    #[must_use]
    pub fn parsed_format(&self) -> NameIdFormat {
        self.format
            .as_deref()
            .and_then(NameIdFormat::from_uri)
            .unwrap_or_default()
    }

    /// Serializes this name ID as a `saml:NameID` element.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut attrs = String::new();
        if let Some(format) = &self.format {
            attrs.push_str(&format!(r#" Format="{}""#, xml_escape(format)));
        }
        if let Some(q) = &self.sp_name_qualifier {
            attrs.push_str(&format!(r#" SPNameQualifier="{}""#, xml_escape(q)));
        }
        format!(
            r#"<saml:NameID xmlns:saml="{SAML_NS}"{attrs}>{}</saml:NameID>"#,
            xml_escape(&self.value)
        )
    }
}

/// Name ID policy for authentication requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameIdPolicy {
    /// The requested name ID format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Whether the IdP may create a new identifier for the principal.
    #[serde(default)]
    pub allow_create: bool,
}

impl NameIdPolicy {
    /// Creates a policy requesting the given format.
    #[must_use]
    pub fn new(format: NameIdFormat) -> Self {
        Self {
            format: Some(format.uri().to_string()),
            allow_create: true,
        }
    }
}
