//! Server configuration.
//!
//! Configuration is loaded from `SP_*` environment variables with defaults
//! that pair a local SP on port 8000 with a local Keycloak realm.

use std::time::Duration;

use sp_auth::{LogoutCoordinator, TrustPolicy, DEFAULT_PERMISSION_PREFIX};
use sp_protocol_saml::{IdpSettings, NameIdFormat, SamlSettings, SpSettings};

const DEFAULT_IDP_ENTITY_ID: &str = "http://localhost:8080/realms/demo";
const DEFAULT_IDP_SAML_URL: &str = "http://localhost:8080/realms/demo/protocol/saml";

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Reduced-trust validation tiers are unavailable.
    #[default]
    Production,
    /// Reduced-trust validation tiers may be enabled.
    Development,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Self::Development,
            _ => Self::Production,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,

    /// Port to bind to.
    pub port: u16,

    /// Public base URL of this SP; also the post-logout landing page.
    pub base_url: String,

    /// Deployment environment.
    pub environment: Environment,

    /// SAML pairing.
    pub saml: SamlSettings,

    /// IdP metadata document to resolve endpoints from.
    pub idp_metadata_url: Option<String>,

    /// IdP endpoint ending every IdP session at once.
    pub idp_global_logout_url: String,

    /// Bound on IdP network calls in seconds.
    pub idp_timeout_secs: u64,

    /// Session cookie name.
    pub session_cookie: String,

    /// Session idle lifetime in seconds.
    pub session_ttl_secs: u64,

    /// Keep the raw SAML response on the session for display.
    pub capture_raw_saml: bool,

    /// Attribute name prefix marking permissions.
    pub permission_prefix: String,

    /// Requested lenient handling of duplicate attribute names.
    pub allow_duplicate_attributes: Option<bool>,

    /// Requested acceptance of unsigned or badly signed assertions.
    pub allow_unsigned_assertions: Option<bool>,
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = var("SP_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&var, "SP_PORT", 8000)?;

        let base_url = var("SP_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        let environment = var("SP_ENVIRONMENT")
            .map(|v| Environment::parse(&v))
            .unwrap_or_default();

        let mut saml = default_pairing(&base_url);
        if let Some(v) = var("SP_ENTITY_ID") {
            saml.sp.entity_id = v;
        }
        if let Some(v) = var("SP_ACS_URL") {
            saml.sp.acs_url = v;
        }
        if let Some(v) = var("SP_SLS_URL") {
            saml.sp.sls_url = Some(v);
        }
        saml.sp.x509_cert = var("SP_X509_CERT").filter(|v| !v.trim().is_empty());
        if let Some(v) = var("SP_IDP_ENTITY_ID") {
            saml.idp.entity_id = v;
        }
        if let Some(v) = var("SP_IDP_SSO_URL") {
            saml.idp.sso_url = v;
        }
        if let Some(v) = var("SP_IDP_SLO_URL") {
            saml.idp.slo_url = Some(v);
        }
        saml.idp.x509_cert = var("SP_IDP_X509_CERT").filter(|v| !v.trim().is_empty());
        saml.strict = parse_or(&var, "SP_STRICT", true)?;
        saml.security.want_assertions_signed = parse_or(&var, "SP_WANT_ASSERTIONS_SIGNED", true)?;

        Ok(Self {
            host,
            port,
            environment,
            saml,
            idp_metadata_url: var("SP_IDP_METADATA_URL").filter(|v| !v.trim().is_empty()),
            idp_global_logout_url: var("SP_IDP_GLOBAL_LOGOUT_URL")
                .unwrap_or_else(|| LogoutCoordinator::DEFAULT_GLOBAL_LOGOUT_URL.to_string()),
            idp_timeout_secs: parse_or(&var, "SP_IDP_TIMEOUT_SECS", 5)?,
            session_cookie: var("SP_SESSION_COOKIE").unwrap_or_else(|| "sp_session".to_string()),
            session_ttl_secs: parse_or(&var, "SP_SESSION_TTL_SECS", 1800)?,
            capture_raw_saml: parse_or(&var, "SP_CAPTURE_RAW_SAML", false)?,
            permission_prefix: var("SP_PERMISSION_PREFIX")
                .unwrap_or_else(|| DEFAULT_PERMISSION_PREFIX.to_string()),
            allow_duplicate_attributes: parse_opt(&var, "SP_ALLOW_DUPLICATE_ATTRIBUTES")?,
            allow_unsigned_assertions: parse_opt(&var, "SP_ALLOW_UNSIGNED_ASSERTIONS")?,
            base_url,
        })
    }

    /// Creates a configuration for testing.
    #[must_use]
    pub fn for_testing() -> Self {
        let mut config = Self::default();
        config.host = "127.0.0.1".to_string();
        config.port = 0; // Random port
        config.saml.idp.x509_cert = Some("AQIDBA==".to_string());
        config.idp_timeout_secs = 1;
        config
    }

    /// Returns the URL users land on after login or logout.
    #[must_use]
    pub fn home_url(&self) -> String {
        format!("{}/", self.base_url)
    }

    /// Returns the IdP call timeout.
    #[must_use]
    pub const fn idp_timeout(&self) -> Duration {
        Duration::from_secs(self.idp_timeout_secs)
    }

    /// Returns the session idle lifetime.
    #[must_use]
    pub const fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Returns true if cookies must carry the `Secure` attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Returns the effective trust policy.
    ///
    /// Reduced-trust tiers are only honored in development, where both are
    /// on unless explicitly disabled.
    #[must_use]
    pub fn trust_policy(&self) -> TrustPolicy {
        match self.environment {
            Environment::Development => {
                let defaults = TrustPolicy::development();
                TrustPolicy {
                    allow_lenient_duplicates: self
                        .allow_duplicate_attributes
                        .unwrap_or(defaults.allow_lenient_duplicates),
                    allow_signature_bypass: self
                        .allow_unsigned_assertions
                        .unwrap_or(defaults.allow_signature_bypass),
                }
            }
            Environment::Production => {
                if self.allow_duplicate_attributes == Some(true)
                    || self.allow_unsigned_assertions == Some(true)
                {
                    tracing::warn!(
                        "Reduced-trust validation requested outside development; ignoring"
                    );
                }
                TrustPolicy::strict()
            }
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        let base_url = "http://localhost:8000".to_string();
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            environment: Environment::Production,
            saml: default_pairing(&base_url),
            idp_metadata_url: None,
            idp_global_logout_url: LogoutCoordinator::DEFAULT_GLOBAL_LOGOUT_URL.to_string(),
            idp_timeout_secs: 5,
            session_cookie: "sp_session".to_string(),
            session_ttl_secs: 1800,
            capture_raw_saml: false,
            permission_prefix: DEFAULT_PERMISSION_PREFIX.to_string(),
            allow_duplicate_attributes: None,
            allow_unsigned_assertions: None,
            base_url,
        }
    }
}

/// SP endpoints under `base_url` paired with the local demo realm.
fn default_pairing(base_url: &str) -> SamlSettings {
    SamlSettings::new(
        SpSettings {
            entity_id: format!("{base_url}/metadata"),
            acs_url: format!("{base_url}/callback"),
            sls_url: Some(format!("{base_url}/sls")),
            name_id_format: NameIdFormat::Unspecified.uri().to_string(),
            x509_cert: None,
        },
        IdpSettings {
            entity_id: DEFAULT_IDP_ENTITY_ID.to_string(),
            sso_url: DEFAULT_IDP_SAML_URL.to_string(),
            slo_url: Some(DEFAULT_IDP_SAML_URL.to_string()),
            x509_cert: None,
        },
    )
}

fn parse_or<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> anyhow::Result<T> {
    Ok(parse_opt(var, key)?.unwrap_or(default))
}

fn parse_opt<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> anyhow::Result<Option<T>> {
    match var(key).map(|v| v.trim().to_string()) {
        None => Ok(None),
        Some(v) if v.is_empty() => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{key} has an invalid value: {v}")),
    }
}
