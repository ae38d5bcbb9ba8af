//! XML Signature support for SAML.
//!
//! Signature verification is exposed as the [`SignatureVerifier`] capability
//! so the processor can be driven by alternative implementations (an HSM
//! backed verifier, or a stub in tests). [`XmlSignatureValidator`] is the
//! default enveloped XML-DSig implementation.
//!
//! # Signing Algorithms
//!
//! - RSA-SHA256 (recommended)
//! - RSA-SHA384
//! - RSA-SHA512
//! - ECDSA-SHA256
//!
//! Legacy SHA-1 is accepted only when explicitly enabled.

mod validator;

pub use validator::*;

use crate::parser::{walk, ElementVisitor};
use crate::types::{digest_algorithms, signature_algorithms};
use crate::SamlResult;

/// Verifies an enveloped signature over a SAML document.
pub trait SignatureVerifier: Send + Sync {
    /// Returns true when `document` carries a signature that verifies
    /// against the DER-encoded X.509 `certificate`.
    fn verify(&self, document: &str, certificate: &[u8]) -> bool;
}

/// Returns true if the response or one of its assertions carries a `Signature` element.
#[must_use]
pub fn has_signature(xml: &str) -> bool {
    struct Finder(bool);

    impl ElementVisitor for Finder {
        fn open(
            &mut self,
            name: &str,
            parent: Option<&str>,
            _attrs: &[(String, String)],
        ) -> SamlResult<()> {
            if name == "Signature"
                && matches!(parent, Some("Response" | "Assertion" | "LogoutResponse"))
            {
                self.0 = true;
            }
            Ok(())
        }

        fn close(&mut self, _name: &str, _parent: Option<&str>, _text: &str) -> SamlResult<()> {
            Ok(())
        }
    }

    let mut finder = Finder(false);
    walk(xml, &mut finder).is_ok() && finder.0
}

/// Signature algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureAlgorithm {
    /// RSA with SHA-256 (recommended).
    #[default]
    RsaSha256,
    /// RSA with SHA-384.
    RsaSha384,
    /// RSA with SHA-512.
    RsaSha512,
    /// ECDSA P-256 with SHA-256.
    EcdsaSha256,
    /// Legacy RSA with SHA-1 (not recommended).
    RsaSha1,
}

impl SignatureAlgorithm {
    /// Returns the URI for this signature algorithm.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::RsaSha256 => signature_algorithms::RSA_SHA256,
            Self::RsaSha384 => signature_algorithms::RSA_SHA384,
            Self::RsaSha512 => signature_algorithms::RSA_SHA512,
            Self::EcdsaSha256 => signature_algorithms::ECDSA_SHA256,
            Self::RsaSha1 => signature_algorithms::RSA_SHA1,
        }
    }

    /// Parses a signature algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            signature_algorithms::RSA_SHA256 => Some(Self::RsaSha256),
            signature_algorithms::RSA_SHA384 => Some(Self::RsaSha384),
            signature_algorithms::RSA_SHA512 => Some(Self::RsaSha512),
            signature_algorithms::ECDSA_SHA256 => Some(Self::EcdsaSha256),
            signature_algorithms::RSA_SHA1 => Some(Self::RsaSha1),
            _ => None,
        }
    }

    /// Returns true if this algorithm uses a deprecated hash (SHA-1).
    #[must_use]
    pub const fn is_deprecated(&self) -> bool {
        matches!(self, Self::RsaSha1)
    }
}

/// Digest algorithm named by a `ds:DigestMethod`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    /// SHA-256.
    #[default]
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
    /// Legacy SHA-1.
    Sha1,
}

impl DigestAlgorithm {
    /// Parses a digest algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            digest_algorithms::SHA256 => Some(Self::Sha256),
            digest_algorithms::SHA384 => Some(Self::Sha384),
            digest_algorithms::SHA512 => Some(Self::Sha512),
            digest_algorithms::SHA1 => Some(Self::Sha1),
            _ => None,
        }
    }
}

/// The parts of an enveloped XML signature needed for verification.
#[derive(Debug, Clone)]
pub struct XmlSignature {
    /// The signature algorithm.
    pub algorithm: SignatureAlgorithm,
    /// The digest algorithm of the single reference.
    pub digest_algorithm: DigestAlgorithm,
    /// The reference URI (e.g., "#_abc123").
    pub reference_uri: String,
    /// The base64-encoded digest value.
    pub digest_value: String,
    /// The base64-encoded signature value.
    pub signature_value: String,
    /// The `SignedInfo` element exactly as it appears in the document.
    pub signed_info: String,
}
