//! Login rejection reasons.

use sp_protocol_saml::ValidationErrorKind;
use thiserror::Error;

/// Why a login response was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Validation failed and no fallback applied.
    #[error("SAML validation failed ({}): {detail}", kind.as_str())]
    ValidationFailed {
        /// Failure class.
        kind: ValidationErrorKind,
        /// Human-readable cause.
        detail: String,
    },

    /// The IdP did not confirm authentication.
    #[error("authentication not confirmed")]
    AuthenticationDenied,

    /// The response named no user.
    #[error("no user identity could be recovered from the SAML response")]
    NoIdentity,

    /// No `SAMLResponse` was posted.
    #[error("SAML response missing")]
    MissingResponse,

    /// The session could not be stored.
    #[error("session could not be stored: {0}")]
    SessionUnavailable(String),
}

impl Rejection {
    /// Returns the HTTP status code for this rejection.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::ValidationFailed { .. } | Self::MissingResponse => 400,
            Self::AuthenticationDenied | Self::NoIdentity => 401,
            Self::SessionUnavailable(_) => 500,
        }
    }

    /// Returns true if the rejection is rendered as an HTML page rather
    /// than a JSON error.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        matches!(self, Self::AuthenticationDenied | Self::NoIdentity)
    }
}
