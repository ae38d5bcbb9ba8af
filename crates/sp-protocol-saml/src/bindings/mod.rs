//! SAML bindings implementation.
//!
//! This module implements the SAML 2.0 bindings for message transport:
//!
//! - **HTTP-POST Binding** - Messages arrive base64-encoded in form fields
//! - **HTTP-Redirect Binding** - Messages are deflated, base64-encoded, and URL-encoded
//!
//! # Usage
//!
//! ```rust,ignore
//! use sp_protocol_saml::bindings::{HttpPostBinding, HttpRedirectBinding};
//!
//! // Decode a posted SAMLResponse
//! let decoded = HttpPostBinding::decode(None, Some(&saml_response), relay_state)?;
//!
//! // Encode an AuthnRequest for the Redirect binding
//! let url = HttpRedirectBinding::encode_request(&request_xml, "https://idp.example.com/sso", Some("relay_state"))?;
//! ```

mod post;
mod redirect;

pub use post::*;
pub use redirect::*;

/// SAML message type for binding operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamlMessageType {
    /// Request message (AuthnRequest, LogoutRequest).
    Request,
    /// Response message (Response, LogoutResponse).
    Response,
}

impl SamlMessageType {
    /// Returns the form parameter name for this message type.
    #[must_use]
    pub const fn form_param(&self) -> &'static str {
        match self {
            Self::Request => "SAMLRequest",
            Self::Response => "SAMLResponse",
        }
    }
}

/// Decoded SAML binding message.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    /// The decoded XML message.
    pub xml: String,
    /// The message type (request or response).
    pub message_type: SamlMessageType,
    /// The RelayState if present.
    pub relay_state: Option<String>,
}
