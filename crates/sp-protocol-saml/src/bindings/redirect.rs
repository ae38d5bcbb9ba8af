//! HTTP-Redirect Binding implementation.
//!
//! Implements the SAML 2.0 HTTP-Redirect binding for sending SAML messages
//! via URL query parameters with DEFLATE compression.

use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::error::{SamlError, SamlResult};

use super::{DecodedMessage, SamlMessageType};

/// HTTP-Redirect binding encoder/decoder.
pub struct HttpRedirectBinding;

impl HttpRedirectBinding {
    /// Encodes a SAML request for HTTP-Redirect binding.
    ///
    /// Returns a URL with the encoded message in query parameters.
    pub fn encode_request(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
    ) -> SamlResult<String> {
        let compressed = deflate_compress(xml.as_bytes())?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&compressed);

        let param_name = SamlMessageType::Request.form_param();
        let separator = if destination.contains('?') { '&' } else { '?' };

        let mut url = format!(
            "{destination}{separator}{param_name}={}",
            urlencoding::encode(&encoded)
        );

        if let Some(rs) = relay_state {
            url.push_str(&format!("&RelayState={}", urlencoding::encode(rs)));
        }

        Ok(url)
    }

    /// Decodes a SAML message from HTTP-Redirect query parameters.
    ///
    /// Values may be passed either raw from the query string or already
    /// percent-decoded by the web framework.
    pub fn decode(
        saml_request: Option<&str>,
        saml_response: Option<&str>,
        relay_state: Option<&str>,
    ) -> SamlResult<DecodedMessage> {
        let (encoded, message_type) = if let Some(req) = saml_request {
            (req, SamlMessageType::Request)
        } else if let Some(resp) = saml_response {
            (resp, SamlMessageType::Response)
        } else {
            return Err(SamlError::SchemaInvalid(
                "No SAMLRequest or SAMLResponse parameter".to_string(),
            ));
        };

        let url_decoded = urlencoding::decode(encoded)
            .map_err(|e| SamlError::SchemaInvalid(format!("URL decode error: {e}")))?;

        let b64_decoded = base64::engine::general_purpose::STANDARD.decode(url_decoded.as_ref())?;
        let xml_bytes = deflate_decompress(&b64_decoded)?;

        let xml = String::from_utf8(xml_bytes)
            .map_err(|e| SamlError::SchemaInvalid(format!("Invalid UTF-8 in message: {e}")))?;

        Ok(DecodedMessage {
            xml,
            message_type,
            relay_state: relay_state.map(String::from),
        })
    }

    /// Decodes a message from a full URL.
    pub fn decode_url(url: &str) -> SamlResult<DecodedMessage> {
        let parsed = url::Url::parse(url)
            .map_err(|e| SamlError::SchemaInvalid(format!("Invalid URL: {e}")))?;

        let mut saml_request = None;
        let mut saml_response = None;
        let mut relay_state = None;

        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "SAMLRequest" => saml_request = Some(value.to_string()),
                "SAMLResponse" => saml_response = Some(value.to_string()),
                "RelayState" => relay_state = Some(value.to_string()),
                _ => {}
            }
        }

        Self::decode(
            saml_request.as_deref(),
            saml_response.as_deref(),
            relay_state.as_deref(),
        )
    }
}

/// Compresses data using DEFLATE (raw, no zlib header).
fn deflate_compress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| SamlError::Deflate(format!("Compression error: {e}")))?;
    encoder
        .finish()
        .map_err(|e| SamlError::Deflate(format!("Compression finish error: {e}")))
}

/// Decompresses DEFLATE data.
fn deflate_decompress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| SamlError::Deflate(format!("Decompression error: {e}")))?;
    Ok(decompressed)
}
