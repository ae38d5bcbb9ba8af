//! SAML 2.0 types and data structures.
//!
//! Outbound messages (authentication and logout requests) know how to
//! serialize themselves; inbound messages (responses, assertions, logout
//! responses) are plain views populated by [`crate::parser`].

mod assertion;
mod authn_request;
mod constants;
mod logout;
mod name_id;
mod response;
mod status;

pub use assertion::*;
pub use authn_request::*;
pub use constants::*;
pub use logout::*;
pub use name_id::*;
pub use response::*;
pub use status::*;

/// Escapes a value for inclusion in XML text or a double-quoted attribute.
pub(crate) fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
