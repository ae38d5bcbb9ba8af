//! Identity provider endpoint resolution.
//!
//! The IdP endpoints come from static settings, optionally overridden by the
//! IdP's published metadata. Metadata is fetched once, under the configured
//! timeout, and cached for the life of the process. A failed fetch is not
//! retried until [`DEFAULT_RETRY_AFTER`] has passed.

use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{SamlError, SamlResult};
use crate::parser::{attr, walk, ElementVisitor};
use crate::settings::IdpSettings;
use crate::types::SamlBinding;

/// How long a failed metadata fetch suppresses further attempts.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Resolves the active [`IdpSettings`].
#[derive(Debug)]
pub struct IdpResolver {
    fallback: IdpSettings,
    metadata_url: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
    cached: RwLock<Option<IdpSettings>>,
    retry_after: Duration,
    last_failure: RwLock<Option<Instant>>,
}

impl IdpResolver {
    /// Creates a resolver that only uses the given static settings.
    #[must_use]
    pub fn new(settings: IdpSettings, timeout: Duration) -> Self {
        Self {
            fallback: settings,
            metadata_url: None,
            timeout,
            client: reqwest::Client::new(),
            cached: RwLock::new(None),
            retry_after: DEFAULT_RETRY_AFTER,
            last_failure: RwLock::new(None),
        }
    }

    /// Fetches endpoints from the IdP's metadata document, falling back to
    /// the static settings when it cannot be retrieved.
    #[must_use]
    pub fn with_metadata_url(mut self, url: impl Into<String>) -> Self {
        self.metadata_url = Some(url.into());
        self
    }

    /// Sets how long a failed fetch suppresses further attempts.
    #[must_use]
    pub const fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Returns the configured timeout for IdP calls.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the best settings known without touching the network.
    #[must_use]
    pub fn current(&self) -> IdpSettings {
        self.cached
            .read()
            .clone()
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// Resolves the IdP settings, fetching metadata on first use.
    pub async fn resolve(&self) -> SamlResult<IdpSettings> {
        if let Some(cached) = self.cached.read().clone() {
            return Ok(cached);
        }

        let Some(url) = self.metadata_url.as_deref() else {
            return Ok(self.fallback.clone());
        };

        if self.backing_off() {
            return self.fallback_or(SamlError::IdpUnreachable(format!(
                "metadata fetch from {url} failed recently"
            )));
        }

        match self.fetch(url).await {
            Ok(settings) => {
                debug!(entity_id = %settings.entity_id, "Resolved IdP from metadata");
                *self.cached.write() = Some(settings.clone());
                *self.last_failure.write() = None;
                Ok(settings)
            }
            Err(e) => {
                warn!(error = %e, url, "IdP metadata unavailable");
                *self.last_failure.write() = Some(Instant::now());
                self.fallback_or(e)
            }
        }
    }

    fn backing_off(&self) -> bool {
        self.last_failure
            .read()
            .is_some_and(|at| at.elapsed() < self.retry_after)
    }

    fn fallback_or(&self, err: SamlError) -> SamlResult<IdpSettings> {
        if self.fallback.sso_url.is_empty() {
            Err(err)
        } else {
            Ok(self.fallback.clone())
        }
    }

    async fn fetch(&self, url: &str) -> SamlResult<IdpSettings> {
        let body = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let mut settings = parse_idp_metadata(&body)?;
        if settings.x509_cert.is_none() {
            settings.x509_cert.clone_from(&self.fallback.x509_cert);
        }
        Ok(settings)
    }
}

/// Reads the entity ID, Redirect-binding endpoints and signing certificate
/// from an IdP `EntityDescriptor`.
pub fn parse_idp_metadata(xml: &str) -> SamlResult<IdpSettings> {
    #[derive(Default)]
    struct Reader {
        settings: IdpSettings,
        in_idp: bool,
        key_use: Option<String>,
    }

    impl ElementVisitor for Reader {
        fn open(
            &mut self,
            name: &str,
            parent: Option<&str>,
            attrs: &[(String, String)],
        ) -> SamlResult<()> {
            let redirect = attr(attrs, "Binding") == Some(SamlBinding::HttpRedirect.uri());
            match name {
                "EntityDescriptor" if parent.is_none() => {
                    self.settings.entity_id =
                        attr(attrs, "entityID").unwrap_or_default().to_string();
                }
                "IDPSSODescriptor" => self.in_idp = true,
                "KeyDescriptor" if self.in_idp => {
                    self.key_use = Some(attr(attrs, "use").unwrap_or("signing").to_string());
                }
                "SingleSignOnService" if self.in_idp && redirect => {
                    if self.settings.sso_url.is_empty() {
                        self.settings.sso_url =
                            attr(attrs, "Location").unwrap_or_default().to_string();
                    }
                }
                "SingleLogoutService" if self.in_idp && redirect => {
                    if self.settings.slo_url.is_none() {
                        self.settings.slo_url = attr(attrs, "Location").map(str::to_string);
                    }
                }
                _ => {}
            }
            Ok(())
        }

        fn close(&mut self, name: &str, _parent: Option<&str>, text: &str) -> SamlResult<()> {
            match name {
                "IDPSSODescriptor" => self.in_idp = false,
                "KeyDescriptor" => self.key_use = None,
                "X509Certificate"
                    if self.in_idp
                        && self.settings.x509_cert.is_none()
                        && self.key_use.as_deref() != Some("encryption") =>
                {
                    let cert: String = text.split_whitespace().collect();
                    if !cert.is_empty() {
                        self.settings.x509_cert = Some(cert);
                    }
                }
                _ => {}
            }
            Ok(())
        }
    }

    let mut reader = Reader::default();
    walk(xml, &mut reader)?;

    if reader.settings.entity_id.is_empty() {
        return Err(SamlError::SchemaInvalid(
            "IdP metadata has no entityID".to_string(),
        ));
    }
    if reader.settings.sso_url.is_empty() {
        return Err(SamlError::SchemaInvalid(
            "IdP metadata has no HTTP-Redirect SingleSignOnService".to_string(),
        ));
    }
    Ok(reader.settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDP_METADATA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" entityID="http://localhost:8080/realms/demo">
    <md:IDPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
        <md:KeyDescriptor use="encryption">
            <ds:KeyInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
                <ds:X509Data><ds:X509Certificate>ENCRYPTION</ds:X509Certificate></ds:X509Data>
            </ds:KeyInfo>
        </md:KeyDescriptor>
        <md:KeyDescriptor use="signing">
            <ds:KeyInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
                <ds:X509Data><ds:X509Certificate>
                    SIGN ING
                </ds:X509Certificate></ds:X509Data>
            </ds:KeyInfo>
        </md:KeyDescriptor>
        <md:SingleLogoutService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Location="http://idp/post-slo"/>
        <md:SingleLogoutService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" Location="http://idp/slo"/>
        <md:SingleSignOnService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" Location="http://idp/sso"/>
    </md:IDPSSODescriptor>
</md:EntityDescriptor>"#;

    #[test]
    fn parses_redirect_endpoints_and_signing_cert() {
        let settings = parse_idp_metadata(IDP_METADATA).unwrap();
        assert_eq!(settings.entity_id, "http://localhost:8080/realms/demo");
        assert_eq!(settings.sso_url, "http://idp/sso");
        assert_eq!(settings.slo_url.as_deref(), Some("http://idp/slo"));
        assert_eq!(settings.x509_cert.as_deref(), Some("SIGNING"));
    }

    #[test]
    fn metadata_without_sso_is_rejected() {
        let xml = r#"<EntityDescriptor entityID="idp"><IDPSSODescriptor/></EntityDescriptor>"#;
        assert!(matches!(
            parse_idp_metadata(xml),
            Err(SamlError::SchemaInvalid(_))
        ));
    }

    #[tokio::test]
    async fn resolve_without_metadata_url_uses_static_settings() {
        let settings = IdpSettings {
            entity_id: "idp".to_string(),
            sso_url: "http://idp/sso".to_string(),
            ..IdpSettings::default()
        };
        let resolver = IdpResolver::new(settings.clone(), Duration::from_secs(1));
        assert_eq!(resolver.resolve().await.unwrap(), settings);
        assert_eq!(resolver.current(), settings);
    }

    #[tokio::test]
    async fn unreachable_metadata_falls_back_to_static_settings() {
        let settings = IdpSettings {
            entity_id: "idp".to_string(),
            sso_url: "http://idp/sso".to_string(),
            ..IdpSettings::default()
        };
        let resolver = IdpResolver::new(settings.clone(), Duration::from_millis(200))
            .with_metadata_url("http://127.0.0.1:9/metadata");
        assert_eq!(resolver.resolve().await.unwrap(), settings);
    }

    #[tokio::test]
    async fn unreachable_metadata_without_fallback_is_transport_error() {
        let resolver = IdpResolver::new(IdpSettings::default(), Duration::from_millis(200))
            .with_metadata_url("http://127.0.0.1:9/metadata");
        let err = resolver.resolve().await.unwrap_err();
        assert!(matches!(err, SamlError::IdpUnreachable(_)));
    }

    #[tokio::test]
    async fn failed_fetch_is_not_retried_within_window() {
        let settings = IdpSettings {
            entity_id: "idp".to_string(),
            sso_url: "http://idp/sso".to_string(),
            ..IdpSettings::default()
        };
        let resolver = IdpResolver::new(settings.clone(), Duration::from_millis(200))
            .with_metadata_url("http://127.0.0.1:9/metadata");

        assert_eq!(resolver.resolve().await.unwrap(), settings);
        assert!(resolver.backing_off());
        assert_eq!(resolver.resolve().await.unwrap(), settings);

        let eager = IdpResolver::new(settings, Duration::from_millis(200))
            .with_metadata_url("http://127.0.0.1:9/metadata")
            .with_retry_after(Duration::ZERO);
        eager.resolve().await.unwrap();
        assert!(!eager.backing_off());
    }

    #[tokio::test]
    async fn backoff_without_fallback_stays_unreachable() {
        let resolver = IdpResolver::new(IdpSettings::default(), Duration::from_millis(200))
            .with_metadata_url("http://127.0.0.1:9/metadata");

        resolver.resolve().await.unwrap_err();
        let err = resolver.resolve().await.unwrap_err();
        assert!(matches!(err, SamlError::IdpUnreachable(_)));
    }
}
