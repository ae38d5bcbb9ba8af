//! # sp-auth
//!
//! The login and logout engine of the SAML service provider.
//!
//! ## Login
//!
//! [`AssertionValidator`] runs strict validation through a
//! [`SamlProcessor`](sp_protocol_saml::SamlProcessor). Two failure classes are
//! recoverable when the [`TrustPolicy`] allows it:
//!
//! - repeated attribute names on a signed response, admitted with a sentinel
//!   subject and no attributes
//! - a missing or invalid signature, admitted by reading the document
//!   directly with [`extract`]
//!
//! Everything else is rejected.
//!
//! ## Logout
//!
//! [`LogoutCoordinator`] always clears the local session first, then decides
//! whether the IdP should be involved.
//!
//! ## Example
//!
//! ```ignore
//! use sp_auth::{AssertionValidator, TrustPolicy, ValidationOutcome};
//!
//! let validator = AssertionValidator::new(processor).with_policy(TrustPolicy::strict());
//! match validator.validate_into(&scope, &saml_response, sessions.as_ref()).await {
//!     ValidationOutcome::Accepted { mode, record } => { /* render success */ }
//!     ValidationOutcome::Rejected(rejection) => { /* render error */ }
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod extractor;
pub mod logout;
pub mod normalizer;
pub mod validator;

pub use error::Rejection;
pub use extractor::{extract, ExtractedAssertion, RawAttributeSet};
pub use logout::{LogoutCoordinator, LogoutDirective, LogoutReport, LogoutTrigger};
pub use normalizer::{AttributeNormalizer, Normalized, DEFAULT_PERMISSION_PREFIX};
pub use validator::{
    AssertionValidator, DiagnosticHook, TracingDiagnostics, TrustPolicy, ValidationOutcome,
};
