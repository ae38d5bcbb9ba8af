//! Logout coordination.
//!
//! Every logout path clears the local session before anything else, so a
//! failure to reach the IdP never leaves the user signed in here.
//!
//! ```text
//! /logout ──► session? ──yes──► UserInitiated ─────────► RedirectToIdp | LocalOnly
//!                  └────no───► CrossSpNoLocalSession ──► RedirectToIdp (IdP or global URL)
//! /sls ─────► IdpCallback ─────────────────────────────► SloProcessed
//! ```

use std::sync::Arc;
use std::time::Duration;

use sp_protocol_saml::{SamlError, SamlProcessor, SloMessage};
use sp_session::{SessionRecord, SessionScope, SessionStateManager};
use tracing::{debug, info, warn};

const LOCAL_CLEARED: &str = "Logged out successfully (local session cleared)";
const SESSION_CLEARED: &str = "Logged out successfully (session cleared)";
const FULL_LOGOUT: &str =
    "Successfully logged out from both the application and the identity provider";

/// What started a logout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutTrigger {
    /// A signed-in user asked to log out.
    UserInitiated,
    /// The IdP redirected back to the single logout service.
    IdpCallback {
        /// The logout message, if one was sent.
        message: Option<SloMessage>,
    },
    /// Logout requested without a local session, typically after logging
    /// out of another SP sharing the IdP session.
    CrossSpNoLocalSession,
}

impl LogoutTrigger {
    /// Returns true if the trigger carries an IdP logout message.
    #[must_use]
    pub const fn has_response(&self) -> bool {
        matches!(self, Self::IdpCallback { message: Some(_) })
    }
}

/// Result shown to the user after logout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutReport {
    /// Headline.
    pub message: String,
    /// Explanation.
    pub detail: String,
}

impl LogoutReport {
    fn new(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: detail.into(),
        }
    }
}

/// What the transport should do after logout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutDirective {
    /// Redirect the browser to the IdP.
    RedirectToIdp {
        /// Target URL.
        url: String,
    },
    /// Only the local session was ended.
    LocalOnly(LogoutReport),
    /// An IdP logout callback was handled.
    SloProcessed(LogoutReport),
}

/// Reconciles local session state with IdP logout.
pub struct LogoutCoordinator {
    processor: Arc<dyn SamlProcessor>,
    sessions: Arc<dyn SessionStateManager>,
    home_url: String,
    global_logout_url: String,
    idp_timeout: Duration,
}

impl LogoutCoordinator {
    /// Default global logout URL.
    pub const DEFAULT_GLOBAL_LOGOUT_URL: &'static str =
        "http://localhost:8080/realms/demo/protocol/saml?GLO=true";

    /// Creates a coordinator returning users to `home_url`.
    #[must_use]
    pub fn new(
        processor: Arc<dyn SamlProcessor>,
        sessions: Arc<dyn SessionStateManager>,
        home_url: impl Into<String>,
    ) -> Self {
        Self {
            processor,
            sessions,
            home_url: home_url.into(),
            global_logout_url: Self::DEFAULT_GLOBAL_LOGOUT_URL.to_string(),
            idp_timeout: Duration::from_secs(5),
        }
    }

    /// Sets the IdP global logout URL used for cross-SP logout.
    #[must_use]
    pub fn with_global_logout_url(mut self, url: impl Into<String>) -> Self {
        self.global_logout_url = url.into();
        self
    }

    /// Sets the bound on IdP calls.
    #[must_use]
    pub const fn with_idp_timeout(mut self, timeout: Duration) -> Self {
        self.idp_timeout = timeout;
        self
    }

    /// Handles `/logout`, classifying the trigger from session presence.
    pub async fn handle_logout_request(&self, scope: &SessionScope) -> LogoutDirective {
        let trigger = if self.lookup(scope).await.is_some() {
            LogoutTrigger::UserInitiated
        } else {
            LogoutTrigger::CrossSpNoLocalSession
        };
        self.handle(scope, trigger).await
    }

    /// Clears the session for `scope` and resolves `trigger`.
    pub async fn handle(&self, scope: &SessionScope, trigger: LogoutTrigger) -> LogoutDirective {
        let existing = self.lookup(scope).await;
        self.clear(scope).await;

        match trigger {
            LogoutTrigger::CrossSpNoLocalSession => self.cross_sp_redirect().await,
            LogoutTrigger::UserInitiated => self.user_initiated(existing.as_ref()).await,
            LogoutTrigger::IdpCallback { message: None } => {
                LogoutDirective::SloProcessed(LogoutReport::new(
                    SESSION_CLEARED,
                    "SAML logout - No response to process (likely cross-SP logout)",
                ))
            }
            LogoutTrigger::IdpCallback {
                message: Some(message),
            } => self.idp_callback(&message).await,
        }
    }

    /// Ends only the local session.
    pub async fn local_logout(&self, scope: &SessionScope) -> LogoutDirective {
        self.clear(scope).await;
        LogoutDirective::LocalOnly(LogoutReport::new(
            LOCAL_CLEARED,
            "Simple logout - You may still be logged into the identity provider",
        ))
    }

    /// Ends the local session and sends the browser to the IdP's global
    /// logout endpoint.
    pub async fn global_logout(&self, scope: &SessionScope) -> LogoutDirective {
        self.clear(scope).await;

        match self.global_logout_target() {
            Ok(url) => {
                info!(url = %url, "Redirecting to IdP global logout");
                LogoutDirective::RedirectToIdp { url }
            }
            Err(e) => {
                warn!(error = %e, "Global logout URL unusable");
                LogoutDirective::LocalOnly(LogoutReport::new(
                    LOCAL_CLEARED,
                    format!("Cross-SP logout completed - {e}"),
                ))
            }
        }
    }

    fn global_logout_target(&self) -> Result<String, url::ParseError> {
        let mut url = url::Url::parse(&self.global_logout_url)?;
        url.query_pairs_mut()
            .append_pair("redirect_uri", &self.home_url);
        Ok(url.into())
    }

    async fn lookup(&self, scope: &SessionScope) -> Option<SessionRecord> {
        match self.sessions.get(scope).await {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Session lookup failed during logout");
                None
            }
        }
    }

    async fn clear(&self, scope: &SessionScope) {
        match self.sessions.clear(scope).await {
            Ok(existed) => debug!(existed, "Local session cleared"),
            Err(e) => warn!(error = %e, "Session clear failed during logout"),
        }
    }

    async fn logout_url(&self, record: Option<&SessionRecord>) -> Result<String, SamlError> {
        let name_id = record.map(|r| r.name_id.as_str());
        let session_index = record.and_then(|r| r.session_index.as_deref());

        tokio::time::timeout(
            self.idp_timeout,
            self.processor
                .logout_url(name_id, session_index, Some(&self.home_url)),
        )
        .await
        .map_err(|_| {
            SamlError::IdpUnreachable(format!(
                "no logout URL within {}s",
                self.idp_timeout.as_secs_f32()
            ))
        })?
    }

    async fn cross_sp_redirect(&self) -> LogoutDirective {
        let url = match self.logout_url(None).await {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "IdP logout unavailable, using global logout URL");
                self.global_logout_url.clone()
            }
        };
        LogoutDirective::RedirectToIdp { url }
    }

    async fn user_initiated(&self, record: Option<&SessionRecord>) -> LogoutDirective {
        match self.logout_url(record).await {
            Ok(url) => {
                info!(
                    name_id = record.map_or("", |r| r.name_id.as_str()),
                    "Redirecting to IdP logout"
                );
                LogoutDirective::RedirectToIdp { url }
            }
            Err(e) => {
                warn!(error = %e, "IdP logout redirect failed");
                LogoutDirective::LocalOnly(LogoutReport::new(
                    LOCAL_CLEARED,
                    format!("IdP logout redirect failed: {e}, but local logout completed"),
                ))
            }
        }
    }

    async fn idp_callback(&self, message: &SloMessage) -> LogoutDirective {
        let warning = match self.processor.process_slo(message).await {
            Ok(response) if response.is_success() => {
                info!("IdP confirmed logout");
                return LogoutDirective::SloProcessed(LogoutReport::new(
                    FULL_LOGOUT,
                    "SAML logout - Complete",
                ));
            }
            Ok(response) => response.status.describe(),
            Err(e) => e.to_string(),
        };

        warn!(detail = %warning, "IdP logout completed with a warning");
        LogoutDirective::SloProcessed(LogoutReport::new(
            SESSION_CLEARED,
            format!("SAML logout - completed with a protocol-level warning: {warning}"),
        ))
    }
}
