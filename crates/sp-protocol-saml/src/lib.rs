//! SAML 2.0 service provider protocol support.
//!
//! This crate provides the protocol half of a SAML service provider:
//!
//! - **AuthnRequest and LogoutRequest construction** - Messages sent to the IdP
//! - **Response and LogoutResponse parsing** - Typed views of inbound messages
//! - **XML signature** - A pluggable verification capability with an XML-DSig default
//! - **POST and Redirect bindings** - Encoding and decoding for both binding types
//! - **Metadata** - SP metadata generation and IdP metadata resolution
//!
//! # Architecture
//!
//! - [`types`] - Core SAML types and data structures
//! - [`parser`] - quick-xml based parsers for inbound messages
//! - [`signature`] - XML signature verification
//! - [`bindings`] - POST and Redirect binding implementations
//! - [`settings`] - SP/IdP pairing configuration and its validation
//! - [`metadata`] - SP metadata document generation and checks
//! - [`idp`] - IdP endpoint resolution, optionally from remote metadata
//! - [`processor`] - The [`SamlProcessor`] capability and its [`ServiceProvider`] implementation
//! - [`error`] - Error types for SAML operations
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sp_protocol_saml::{SamlProcessor, SamlSettings, ServiceProvider, XmlSignatureValidator};
//!
//! let sp = ServiceProvider::new(settings, Arc::new(XmlSignatureValidator::new()));
//! let processed = sp.process_response(&saml_response).await?;
//! ```
//!
//! # SAML Specifications
//!
//! - [SAML 2.0 Core](https://docs.oasis-open.org/security/saml/v2.0/saml-core-2.0-os.pdf)
//! - [SAML 2.0 Bindings](https://docs.oasis-open.org/security/saml/v2.0/saml-bindings-2.0-os.pdf)
//! - [SAML 2.0 Metadata](https://docs.oasis-open.org/security/saml/v2.0/saml-metadata-2.0-os.pdf)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bindings;
pub mod error;
pub mod idp;
pub mod metadata;
pub mod parser;
pub mod processor;
pub mod settings;
pub mod signature;
pub mod types;

pub use error::{SamlError, SamlResult, ValidationErrorKind};
pub use idp::IdpResolver;
pub use processor::{
    is_logout_response, ProcessedResponse, SamlProcessor, ServiceProvider, SloMessage,
};
pub use settings::{IdpSettings, SamlSettings, SecuritySettings, SpSettings};
pub use signature::{SignatureVerifier, XmlSignatureValidator};
pub use types::*;
