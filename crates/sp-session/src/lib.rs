//! # sp-session
//!
//! Session state for the SAML service provider.
//!
//! A browser is identified by an opaque [`SessionScope`] carried in a cookie.
//! Each scope maps to at most one [`SessionRecord`], created after a
//! successful login and cleared on logout.
//!
//! ## Modules
//!
//! - [`attributes`] - Canonical user attributes and their values
//! - [`record`] - The per-scope session record
//! - [`scope`] - The session scope handle
//! - [`manager`] - The [`SessionStateManager`] trait and an in-memory implementation
//! - [`error`] - Session error types

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod attributes;
pub mod error;
pub mod manager;
pub mod record;
pub mod scope;

pub use attributes::{AttributeValue, CanonicalField, EncryptedBundle, NormalizedAttributes};
pub use error::{SessionError, SessionResult};
pub use manager::{InMemorySessionManager, SessionStateManager};
pub use record::{DiagnosticCapture, SessionRecord, ValidationMode};
pub use scope::SessionScope;
