//! Tiered assertion validation.
//!
//! Strict validation is always tried first. When it fails with a
//! recoverable error and the [`TrustPolicy`] allows it, a reduced-trust
//! session is created instead:
//!
//! | Failure | Mode | Subject | Attributes |
//! |---|---|---|---|
//! | repeated attribute names | `LenientDuplicate` | `authenticated_user` | none |
//! | missing or invalid signature | `SignatureBypassed` | `NameID` from the document | read directly |

use std::sync::Arc;

use sp_protocol_saml::bindings::HttpPostBinding;
use sp_protocol_saml::{SamlError, SamlProcessor, ValidationErrorKind};
use sp_session::{
    DiagnosticCapture, NormalizedAttributes, SessionRecord, SessionScope, SessionStateManager,
    ValidationMode,
};
use tracing::{debug, error, info, warn};

use crate::error::Rejection;
use crate::extractor::{extract, RawAttributeSet};
use crate::normalizer::AttributeNormalizer;

/// Subject recorded when attributes had to be skipped.
const SENTINEL_NAME_ID: &str = "authenticated_user";

/// Note recorded when attributes had to be skipped.
const DUPLICATE_NOTE: &str = "Attributes skipped due to duplicate names";

/// Number of base64 characters logged by [`TracingDiagnostics`].
const LOGGED_PREFIX_LEN: usize = 200;

// ============================================================================
// Trust Policy
// ============================================================================

/// Which reduced-trust validation tiers are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrustPolicy {
    /// Admit signed responses with repeated attribute names.
    pub allow_lenient_duplicates: bool,
    /// Admit responses whose signature is missing or invalid.
    pub allow_signature_bypass: bool,
}

impl TrustPolicy {
    /// Only fully validated responses are admitted.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            allow_lenient_duplicates: false,
            allow_signature_bypass: false,
        }
    }

    /// Every fallback tier is enabled.
    #[must_use]
    pub const fn development() -> Self {
        Self {
            allow_lenient_duplicates: true,
            allow_signature_bypass: true,
        }
    }

    /// Returns true if any reduced-trust tier is enabled.
    #[must_use]
    pub const fn is_lenient(&self) -> bool {
        self.allow_lenient_duplicates || self.allow_signature_bypass
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Observer of inbound responses, called before validation.
pub trait DiagnosticHook: Send + Sync {
    /// Inspects the posted payload and, if it decoded, the document.
    fn inspect(&self, raw_base64: &str, decoded_xml: Option<&str>);
}

/// Logs inbound responses at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticHook for TracingDiagnostics {
    fn inspect(&self, raw_base64: &str, decoded_xml: Option<&str>) {
        let prefix: String = raw_base64.chars().take(LOGGED_PREFIX_LEN).collect();
        debug!(
            length = raw_base64.len(),
            prefix = %prefix,
            xml = decoded_xml.unwrap_or("<undecodable>"),
            "Received SAML response"
        );
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Result of validating a login response.
#[derive(Debug, Clone)]
pub enum ValidationOutcome {
    /// A session may be created.
    Accepted {
        /// The tier that admitted the response.
        mode: ValidationMode,
        /// The session to store.
        record: SessionRecord,
    },
    /// No session may be created.
    Rejected(Rejection),
}

impl ValidationOutcome {
    /// Returns true for [`ValidationOutcome::Accepted`].
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// Returns the admitting mode, if accepted.
    #[must_use]
    pub const fn mode(&self) -> Option<ValidationMode> {
        match self {
            Self::Accepted { mode, .. } => Some(*mode),
            Self::Rejected(_) => None,
        }
    }
}

// ============================================================================
// Validator
// ============================================================================

/// Validates login responses and builds session records.
pub struct AssertionValidator {
    processor: Arc<dyn SamlProcessor>,
    normalizer: AttributeNormalizer,
    policy: TrustPolicy,
    diagnostics: Arc<dyn DiagnosticHook>,
    capture_raw: bool,
}

impl AssertionValidator {
    /// Creates a strict validator with default normalization.
    #[must_use]
    pub fn new(processor: Arc<dyn SamlProcessor>) -> Self {
        Self {
            processor,
            normalizer: AttributeNormalizer::new(),
            policy: TrustPolicy::strict(),
            diagnostics: Arc::new(TracingDiagnostics),
            capture_raw: false,
        }
    }

    /// Sets the attribute normalizer.
    #[must_use]
    pub fn with_normalizer(mut self, normalizer: AttributeNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Sets the trust policy.
    #[must_use]
    pub fn with_policy(mut self, policy: TrustPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the diagnostic hook.
    #[must_use]
    pub fn with_diagnostics(mut self, hook: Arc<dyn DiagnosticHook>) -> Self {
        self.diagnostics = hook;
        self
    }

    /// Keeps the raw response on the session record for display.
    #[must_use]
    pub fn capture_raw(mut self, capture: bool) -> Self {
        self.capture_raw = capture;
        self
    }

    /// Returns the active trust policy.
    #[must_use]
    pub const fn policy(&self) -> TrustPolicy {
        self.policy
    }

    /// Validates a base64 `SAMLResponse`.
    pub async fn validate(&self, raw: &str) -> ValidationOutcome {
        if raw.trim().is_empty() {
            return ValidationOutcome::Rejected(Rejection::MissingResponse);
        }

        let decoded = HttpPostBinding::decode_payload(raw).ok();
        self.diagnostics.inspect(raw, decoded.as_deref());

        let outcome = match self.processor.process_response(raw).await {
            Ok(processed) if processed.authenticated => {
                let set = RawAttributeSet::from_attributes(&processed.attributes);
                let name_id = processed.name_id.or_else(|| self.normalizer.username(&set));
                self.accept(ValidationMode::Strict, name_id, &set, processed.session_index)
            }
            Ok(processed) => {
                info!(status = %processed.status.describe(), "Authentication not confirmed by IdP");
                ValidationOutcome::Rejected(Rejection::AuthenticationDenied)
            }
            Err(e) => self.recover(e, decoded.as_deref()),
        };

        match outcome {
            ValidationOutcome::Accepted { mode, record } if self.capture_raw => {
                let record = record.with_diagnostics(DiagnosticCapture {
                    raw_response: raw.to_string(),
                    decoded_xml: decoded,
                });
                ValidationOutcome::Accepted { mode, record }
            }
            other => other,
        }
    }

    /// Validates a response and stores the resulting session under `scope`.
    pub async fn validate_into(
        &self,
        scope: &SessionScope,
        raw: &str,
        sessions: &dyn SessionStateManager,
    ) -> ValidationOutcome {
        let outcome = self.validate(raw).await;

        if let ValidationOutcome::Accepted { mode, record } = &outcome {
            if let Err(e) = sessions.create(scope, record.clone()).await {
                error!(error = %e, mode = %mode, "Failed to store session");
                return ValidationOutcome::Rejected(Rejection::SessionUnavailable(e.to_string()));
            }
            info!(name_id = %record.name_id, mode = %mode, "User logged in");
        }

        outcome
    }

    fn recover(&self, err: SamlError, decoded: Option<&str>) -> ValidationOutcome {
        match err.kind() {
            ValidationErrorKind::DuplicateAttributeName if self.policy.allow_lenient_duplicates => {
                warn!(error = %err, "Accepting signed response without its attributes");
                self.lenient_duplicate()
            }
            ValidationErrorKind::SignatureMissing if self.policy.allow_signature_bypass => {
                warn!(error = %err, "Accepting response without signature verification");
                match decoded {
                    Some(xml) => self.signature_bypassed(xml),
                    None => reject(ValidationErrorKind::SchemaInvalid, "response is not decodable"),
                }
            }
            kind => {
                warn!(error = %err, kind = kind.as_str(), "SAML response rejected");
                reject(kind, &err.to_string())
            }
        }
    }

    fn lenient_duplicate(&self) -> ValidationOutcome {
        let mut attributes = NormalizedAttributes::new().with_note(DUPLICATE_NOTE);
        attributes
            .raw
            .insert("status".to_string(), "authenticated".to_string());
        attributes
            .raw
            .insert("source".to_string(), "keycloak".to_string());

        ValidationOutcome::Accepted {
            mode: ValidationMode::LenientDuplicate,
            record: SessionRecord::new(
                SENTINEL_NAME_ID,
                attributes,
                ValidationMode::LenientDuplicate,
            ),
        }
    }

    fn signature_bypassed(&self, xml: &str) -> ValidationOutcome {
        let extracted = extract(xml);
        let name_id = extracted
            .name_id
            .or_else(|| self.normalizer.username(&extracted.attributes));
        self.accept(
            ValidationMode::SignatureBypassed,
            name_id,
            &extracted.attributes,
            extracted.session_index,
        )
    }

    fn accept(
        &self,
        mode: ValidationMode,
        name_id: Option<String>,
        attributes: &RawAttributeSet,
        session_index: Option<String>,
    ) -> ValidationOutcome {
        let Some(name_id) = name_id.filter(|n| !n.trim().is_empty()) else {
            warn!(mode = %mode, "No subject could be recovered from the response");
            return ValidationOutcome::Rejected(Rejection::NoIdentity);
        };

        let normalized = self.normalizer.normalize(attributes);
        let record = SessionRecord::new(name_id, normalized.attributes, mode)
            .with_permissions(normalized.permissions)
            .with_session_index(session_index);

        ValidationOutcome::Accepted { mode, record }
    }
}

fn reject(kind: ValidationErrorKind, detail: &str) -> ValidationOutcome {
    ValidationOutcome::Rejected(Rejection::ValidationFailed {
        kind,
        detail: detail.to_string(),
    })
}
