//! Application state management.
//!
//! This module defines the shared state that is passed to all request handlers.

use std::sync::Arc;

use sp_auth::{AssertionValidator, AttributeNormalizer, LogoutCoordinator};
use sp_protocol_saml::{
    IdpResolver, SamlProcessor, ServiceProvider, SignatureVerifier, XmlSignatureValidator,
};
use sp_session::{InMemorySessionManager, SessionStateManager};

use crate::config::ServerConfig;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// SAML protocol operations.
    pub processor: Arc<dyn SamlProcessor>,

    /// Session storage.
    pub sessions: Arc<dyn SessionStateManager>,

    /// Login response validation.
    pub validator: Arc<AssertionValidator>,

    /// Logout handling.
    pub logout: Arc<LogoutCoordinator>,
}

impl AppState {
    /// Creates the state with XML signature verification.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let verifier = XmlSignatureValidator::new().allow_sha1(config.saml.security.allow_sha1);
        Self::with_verifier(config, Arc::new(verifier))
    }

    /// Creates the state with the given signature verifier.
    #[must_use]
    pub fn with_verifier(config: ServerConfig, verifier: Arc<dyn SignatureVerifier>) -> Self {
        let mut resolver = IdpResolver::new(config.saml.idp.clone(), config.idp_timeout());
        if let Some(url) = &config.idp_metadata_url {
            resolver = resolver.with_metadata_url(url);
        }
        let processor: Arc<dyn SamlProcessor> = Arc::new(
            ServiceProvider::new(config.saml.clone(), verifier).with_idp_resolver(resolver),
        );

        let sessions: Arc<dyn SessionStateManager> =
            Arc::new(InMemorySessionManager::new().with_idle_ttl(config.session_ttl()));

        let validator = AssertionValidator::new(processor.clone())
            .with_normalizer(
                AttributeNormalizer::new().with_permission_prefix(&config.permission_prefix),
            )
            .with_policy(config.trust_policy())
            .capture_raw(config.capture_raw_saml);

        let logout = LogoutCoordinator::new(processor.clone(), sessions.clone(), config.home_url())
            .with_global_logout_url(&config.idp_global_logout_url)
            .with_idp_timeout(config.idp_timeout());

        Self {
            config: Arc::new(config),
            processor,
            sessions,
            validator: Arc::new(validator),
            logout: Arc::new(logout),
        }
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
