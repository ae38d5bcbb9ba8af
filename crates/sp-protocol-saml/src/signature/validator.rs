//! XML Signature validation.
//!
//! Validates enveloped signatures on SAML documents against the IdP's
//! signing certificate.

use aws_lc_rs::{digest, signature};
use base64::Engine;

use crate::error::{SamlError, SamlResult};

use super::{DigestAlgorithm, SignatureAlgorithm, SignatureVerifier, XmlSignature};

/// XML signature validator.
#[derive(Debug, Clone, Default)]
pub struct XmlSignatureValidator {
    /// Whether to allow SHA-1 signatures (deprecated but sometimes needed).
    allow_sha1: bool,
}

impl XmlSignatureValidator {
    /// Creates a new validator that rejects SHA-1.
    #[must_use]
    pub const fn new() -> Self {
        Self { allow_sha1: false }
    }

    /// Allows SHA-1 based signatures (not recommended).
    #[must_use]
    pub const fn allow_sha1(mut self, allow: bool) -> Self {
        self.allow_sha1 = allow;
        self
    }

    /// Validates the enveloped signature of `xml` against `cert_der`.
    pub fn validate(&self, xml: &str, cert_der: &[u8]) -> SamlResult<XmlSignature> {
        let signature = extract_signature(xml)?;

        let uses_sha1 = signature.algorithm.is_deprecated()
            || signature.digest_algorithm == DigestAlgorithm::Sha1;
        if uses_sha1 && !self.allow_sha1
        {
            return Err(SamlError::SignatureInvalid(
                "SHA-1 signatures are not allowed".to_string(),
            ));
        }

        verify_digest(xml, &signature)?;
        verify_signature_value(&signature, cert_der)?;

        Ok(signature)
    }
}

impl SignatureVerifier for XmlSignatureValidator {
    fn verify(&self, document: &str, certificate: &[u8]) -> bool {
        match self.validate(document, certificate) {
            Ok(signature) => {
                tracing::debug!(reference = %signature.reference_uri, "XML signature verified");
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "XML signature rejected");
                false
            }
        }
    }
}

/// Decodes a certificate given either as PEM or as bare base64 DER.
#[must_use]
pub fn certificate_der(text: &str) -> Option<Vec<u8>> {
    const BEGIN: &str = "-----BEGIN CERTIFICATE-----";
    const END: &str = "-----END CERTIFICATE-----";

    let body = match (text.find(BEGIN), text.find(END)) {
        (Some(start), Some(end)) if start + BEGIN.len() <= end => &text[start + BEGIN.len()..end],
        (None, None) => text,
        _ => return None,
    };

    let b64: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    if b64.is_empty() {
        return None;
    }
    base64::engine::general_purpose::STANDARD.decode(b64).ok()
}

/// Extracts signature information from an XML document.
fn extract_signature(xml: &str) -> SamlResult<XmlSignature> {
    if xml.find("<ds:Signature").or_else(|| xml.find("<Signature")).is_none() {
        return Err(SamlError::SignatureMissing);
    }

    let algorithm = extract_attribute(xml, "SignatureMethod", "Algorithm")
        .and_then(|uri| SignatureAlgorithm::from_uri(&uri))
        .ok_or_else(|| SamlError::SignatureInvalid("Invalid signature algorithm".to_string()))?;

    let digest_algorithm = extract_attribute(xml, "DigestMethod", "Algorithm")
        .and_then(|uri| DigestAlgorithm::from_uri(&uri))
        .ok_or_else(|| SamlError::SignatureInvalid("Invalid digest algorithm".to_string()))?;

    let reference_uri = extract_attribute(xml, "Reference", "URI")
        .ok_or_else(|| SamlError::SignatureInvalid("No Reference URI found".to_string()))?;

    let digest_value = extract_element_content(xml, "DigestValue")
        .ok_or_else(|| SamlError::SignatureInvalid("No DigestValue found".to_string()))?;

    let signature_value = extract_element_content(xml, "SignatureValue")
        .ok_or_else(|| SamlError::SignatureInvalid("No SignatureValue found".to_string()))?;

    let signed_info = extract_element(xml, "SignedInfo")
        .ok_or_else(|| SamlError::SignatureInvalid("No SignedInfo found".to_string()))?;

    Ok(XmlSignature {
        algorithm,
        digest_algorithm,
        reference_uri,
        digest_value: digest_value.chars().filter(|c| !c.is_whitespace()).collect(),
        signature_value: signature_value
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect(),
        signed_info,
    })
}

/// Recomputes the digest of the referenced element and compares it.
fn verify_digest(xml: &str, signature: &XmlSignature) -> SamlResult<()> {
    let reference_id = signature
        .reference_uri
        .strip_prefix('#')
        .unwrap_or(&signature.reference_uri);

    let element = extract_referenced_element(xml, reference_id)?;
    let element_without_sig = remove_signature_element(&element);

    let canonical = canonicalize(&element_without_sig);
    let calculated = calculate_digest(&canonical, signature.digest_algorithm);
    let calculated_b64 = base64::engine::general_purpose::STANDARD.encode(calculated);

    if calculated_b64 != signature.digest_value {
        return Err(SamlError::SignatureInvalid(
            "Digest value mismatch".to_string(),
        ));
    }

    Ok(())
}

/// Verifies `SignatureValue` over the canonical `SignedInfo`.
fn verify_signature_value(xml_sig: &XmlSignature, cert_der: &[u8]) -> SamlResult<()> {
    let public_key = extract_public_key_from_cert(cert_der)?;
    let signed_info = canonicalize(&xml_sig.signed_info);

    let signature_bytes = base64::engine::general_purpose::STANDARD
        .decode(&xml_sig.signature_value)
        .map_err(|e| SamlError::SignatureInvalid(format!("Invalid signature encoding: {e}")))?;

    let algorithm: &'static dyn signature::VerificationAlgorithm = match xml_sig.algorithm {
        SignatureAlgorithm::RsaSha256 => &signature::RSA_PKCS1_2048_8192_SHA256,
        SignatureAlgorithm::RsaSha384 => &signature::RSA_PKCS1_2048_8192_SHA384,
        SignatureAlgorithm::RsaSha512 => &signature::RSA_PKCS1_2048_8192_SHA512,
        SignatureAlgorithm::EcdsaSha256 => &signature::ECDSA_P256_SHA256_ASN1,
        SignatureAlgorithm::RsaSha1 => &signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
    };

    signature::UnparsedPublicKey::new(algorithm, &public_key)
        .verify(signed_info.as_bytes(), &signature_bytes)
        .map_err(|_| SamlError::SignatureInvalid("Signature verification failed".to_string()))
}

/// Extracts an attribute value from the first occurrence of an element.
fn extract_attribute(xml: &str, element: &str, attribute: &str) -> Option<String> {
    let patterns = [format!("<ds:{element}"), format!("<{element}")];

    for pattern in &patterns {
        if let Some(pos) = xml.find(pattern.as_str()) {
            let end = xml[pos..].find('>')?;
            let element_str = &xml[pos..pos + end];

            let attr_pattern = format!("{attribute}=\"");
            if let Some(attr_start) = element_str.find(&attr_pattern) {
                let value_start = attr_start + attr_pattern.len();
                let value_end = element_str[value_start..].find('"')?;
                return Some(element_str[value_start..value_start + value_end].to_string());
            }
        }
    }
    None
}

/// Extracts the text content of an XML element.
fn extract_element_content(xml: &str, element: &str) -> Option<String> {
    let patterns = [
        (format!("<ds:{element}>"), format!("</ds:{element}>")),
        (format!("<{element}>"), format!("</{element}>")),
    ];

    for (open, close) in &patterns {
        if let Some(start) = xml.find(open.as_str()) {
            let content_start = start + open.len();
            if let Some(end) = xml[content_start..].find(close.as_str()) {
                return Some(xml[content_start..content_start + end].to_string());
            }
        }
    }
    None
}

/// Extracts a whole element, tags included.
fn extract_element(xml: &str, element: &str) -> Option<String> {
    let patterns = [
        (format!("<ds:{element}"), format!("</ds:{element}>")),
        (format!("<{element}"), format!("</{element}>")),
    ];

    for (open, close) in &patterns {
        if let Some(start) = xml.find(open.as_str()) {
            if let Some(end) = xml[start..].find(close.as_str()) {
                return Some(xml[start..start + end + close.len()].to_string());
            }
        }
    }
    None
}

/// Extracts the element carrying `ID="reference_id"`.
fn extract_referenced_element(xml: &str, reference_id: &str) -> SamlResult<String> {
    let id_pattern = format!("ID=\"{reference_id}\"");

    let pos = xml.find(&id_pattern).ok_or_else(|| {
        SamlError::SignatureInvalid(format!("Referenced element '{reference_id}' not found"))
    })?;

    let start = xml[..pos].rfind('<').ok_or_else(|| {
        SamlError::SignatureInvalid("Referenced element has no opening tag".to_string())
    })?;

    let name_end = xml[start + 1..]
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .map_or(xml.len(), |i| start + 1 + i);
    let tag_name = &xml[start + 1..name_end];
    let close_tag = format!("</{tag_name}>");

    let close_pos = xml[start..].find(&close_tag).ok_or_else(|| {
        SamlError::SignatureInvalid("Referenced element is not properly closed".to_string())
    })?;

    Ok(xml[start..start + close_pos + close_tag.len()].to_string())
}

/// Removes the first `Signature` element from XML content.
fn remove_signature_element(xml: &str) -> String {
    let patterns = [
        ("<ds:Signature", "</ds:Signature>"),
        ("<Signature", "</Signature>"),
    ];

    for (open, close) in &patterns {
        if let Some(start) = xml.find(open) {
            if let Some(end_offset) = xml[start..].find(close) {
                let end = start + end_offset + close.len();
                return format!("{}{}", &xml[..start], &xml[end..]);
            }
        }
    }
    xml.to_string()
}

/// Whitespace-normalising canonicalization.
///
/// This is not full exclusive C14N: compactly serialized documents (as
/// emitted by Keycloak) verify, re-indented ones may not.
fn canonicalize(xml: &str) -> String {
    xml.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn calculate_digest(data: &str, algorithm: DigestAlgorithm) -> Vec<u8> {
    let alg = match algorithm {
        DigestAlgorithm::Sha256 => &digest::SHA256,
        DigestAlgorithm::Sha384 => &digest::SHA384,
        DigestAlgorithm::Sha512 => &digest::SHA512,
        DigestAlgorithm::Sha1 => &digest::SHA1_FOR_LEGACY_USE_ONLY,
    };
    digest::digest(alg, data.as_bytes()).as_ref().to_vec()
}

/// Extracts the raw public key bits from an X.509 certificate.
fn extract_public_key_from_cert(cert_der: &[u8]) -> SamlResult<Vec<u8>> {
    use x509_parser::prelude::*;

    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| SamlError::SignatureInvalid(format!("Failed to parse certificate: {e}")))?;

    Ok(cert.public_key().subject_public_key.data.to_vec())
}
