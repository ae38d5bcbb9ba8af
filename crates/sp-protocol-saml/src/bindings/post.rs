//! HTTP-POST Binding implementation.
//!
//! Decodes SAML messages delivered through an HTML form POST.

use base64::Engine;

use crate::error::{SamlError, SamlResult};

use super::{DecodedMessage, SamlMessageType};

/// HTTP-POST binding decoder.
pub struct HttpPostBinding;

impl HttpPostBinding {
    /// Decodes a SAML message from HTTP-POST form data.
    ///
    /// # Arguments
    ///
    /// * `saml_request` - The SAMLRequest parameter value (if present)
    /// * `saml_response` - The SAMLResponse parameter value (if present)
    /// * `relay_state` - The RelayState parameter value (if present)
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

        Ok(DecodedMessage {
            xml: Self::decode_payload(encoded)?,
            message_type,
            relay_state: relay_state.map(String::from),
        })
    }

    /// Base64-decodes a single form field into XML text.
    ///
    /// Line breaks and other whitespace inserted by the sender are ignored.
    pub fn decode_payload(encoded: &str) -> SamlResult<String> {
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(SamlError::Base64Decode("empty payload".to_string()));
        }

        let decoded = base64::engine::general_purpose::STANDARD.decode(compact)?;

        String::from_utf8(decoded)
            .map_err(|e| SamlError::SchemaInvalid(format!("Invalid UTF-8 in message: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_response() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("<samlp:Response/>");
        let decoded = HttpPostBinding::decode(None, Some(&encoded), Some("/home")).unwrap();

        assert_eq!(decoded.xml, "<samlp:Response/>");
        assert_eq!(decoded.message_type, SamlMessageType::Response);
        assert_eq!(decoded.relay_state.as_deref(), Some("/home"));
    }

    #[test]
    fn decode_tolerates_line_breaks() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("<samlp:LogoutResponse/>");
        let wrapped = format!("{}\r\n{}", &encoded[..8], &encoded[8..]);

        assert_eq!(
            HttpPostBinding::decode_payload(&wrapped).unwrap(),
            "<samlp:LogoutResponse/>"
        );
    }

    #[test]
    fn decode_rejects_missing_and_garbage() {
        assert!(matches!(
            HttpPostBinding::decode(None, None, None),
            Err(SamlError::SchemaInvalid(_))
        ));
        assert!(matches!(
            HttpPostBinding::decode_payload("not base64!!"),
            Err(SamlError::Base64Decode(_))
        ));
        assert!(matches!(
            HttpPostBinding::decode_payload("   "),
            Err(SamlError::Base64Decode(_))
        ));
    }
}
