//! SAML error types.
//!
//! Provides error types for SAML operations including decoding, parsing,
//! validation, signature verification, and IdP communication.

use thiserror::Error;

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// SAML protocol errors.
#[derive(Debug, Clone, Error)]
pub enum SamlError {
    /// Two `Attribute` elements in one assertion share the same `Name`.
    #[error("found an Attribute element with duplicated Name: {0}")]
    DuplicateAttributeName(String),

    /// The response carries no XML signature.
    #[error("no signature found, SAML response rejected")]
    SignatureMissing,

    /// An XML signature is present but does not verify.
    #[error("signature validation failed: {0}")]
    SignatureInvalid(String),

    /// The document is well-formed XML but not a conformant SAML message.
    #[error("schema invalid: {0}")]
    SchemaInvalid(String),

    /// XML parsing error.
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// Assertion expired.
    #[error("assertion expired")]
    AssertionExpired,

    /// Assertion not yet valid.
    #[error("assertion not yet valid")]
    AssertionNotYetValid,

    /// Invalid audience.
    #[error("invalid audience: expected {expected}, got {actual}")]
    InvalidAudience {
        /// The expected audience URI.
        expected: String,
        /// The actual audience URI.
        actual: String,
    },

    /// Invalid issuer.
    #[error("invalid issuer: expected {expected}, got {actual}")]
    InvalidIssuer {
        /// The expected issuer.
        expected: String,
        /// The actual issuer.
        actual: String,
    },

    /// Invalid destination.
    #[error("invalid destination: expected {expected}, got {actual}")]
    InvalidDestination {
        /// The expected destination URL.
        expected: String,
        /// The actual destination URL.
        actual: String,
    },

    /// Base64 decoding error.
    #[error("base64 decode error: {0}")]
    Base64Decode(String),

    /// Deflate compression or decompression error.
    #[error("deflate error: {0}")]
    Deflate(String),

    /// The SP/IdP pairing is missing something the operation needs.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The IdP could not be reached within the configured timeout.
    #[error("identity provider unreachable: {0}")]
    IdpUnreachable(String),
}

/// Coarse classification of [`SamlError`] used when deciding how to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    /// Attribute statement contained a repeated attribute name.
    DuplicateAttributeName,
    /// Signature was absent or did not verify.
    SignatureMissing,
    /// Any other structural or semantic validation failure.
    SchemaInvalid,
    /// The IdP could not be contacted.
    Transport,
}

impl ValidationErrorKind {
    /// Returns a stable machine-readable name for this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateAttributeName => "duplicate_attribute_name",
            Self::SignatureMissing => "signature_missing",
            Self::SchemaInvalid => "schema_invalid",
            Self::Transport => "transport",
        }
    }
}

impl SamlError {
    /// Classifies this error.
    #[must_use]
    pub const fn kind(&self) -> ValidationErrorKind {
        match self {
            Self::DuplicateAttributeName(_) => ValidationErrorKind::DuplicateAttributeName,
            Self::SignatureMissing | Self::SignatureInvalid(_) => {
                ValidationErrorKind::SignatureMissing
            }
            Self::IdpUnreachable(_) => ValidationErrorKind::Transport,
            _ => ValidationErrorKind::SchemaInvalid,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Base64Decode(_)
            | Self::Deflate(_)
            | Self::XmlParse(_)
            | Self::SchemaInvalid(_)
            | Self::DuplicateAttributeName(_) => 400,
            Self::SignatureMissing
            | Self::SignatureInvalid(_)
            | Self::AssertionExpired
            | Self::AssertionNotYetValid
            | Self::InvalidAudience { .. }
            | Self::InvalidIssuer { .. }
            | Self::InvalidDestination { .. } => 401,
            Self::IdpUnreachable(_) => 502,
            Self::Configuration(_) => 500,
        }
    }
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<base64::DecodeError> for SamlError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Base64Decode(err.to_string())
    }
}

impl From<std::io::Error> for SamlError {
    fn from(err: std::io::Error) -> Self {
        Self::Deflate(err.to_string())
    }
}

impl From<reqwest::Error> for SamlError {
    fn from(err: reqwest::Error) -> Self {
        Self::IdpUnreachable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds() {
        let err = SamlError::DuplicateAttributeName("role".to_string());
        assert_eq!(err.kind(), ValidationErrorKind::DuplicateAttributeName);
        assert_eq!(err.http_status(), 400);

        assert_eq!(
            SamlError::SignatureMissing.kind(),
            ValidationErrorKind::SignatureMissing
        );
        assert_eq!(
            SamlError::SignatureInvalid("digest mismatch".to_string()).kind(),
            ValidationErrorKind::SignatureMissing
        );

        let err = SamlError::InvalidAudience {
            expected: "a".to_string(),
            actual: "b".to_string(),
        };
        assert_eq!(err.kind(), ValidationErrorKind::SchemaInvalid);
        assert_eq!(err.http_status(), 401);

        let err = SamlError::IdpUnreachable("timed out".to_string());
        assert_eq!(err.kind(), ValidationErrorKind::Transport);
        assert_eq!(err.http_status(), 502);
    }

    #[test]
    fn duplicate_message_names_attribute() {
        let err = SamlError::DuplicateAttributeName("email".to_string());
        assert!(err.to_string().contains("duplicated Name: email"));
    }
}
