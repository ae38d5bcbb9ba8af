//! HTML pages.

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use sp_auth::{LogoutReport, Rejection};
use sp_session::SessionRecord;

/// Home page template.
#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    /// Signed-in subject, if any.
    pub user: Option<HomeUser>,
}

/// The signed-in user as shown on the home page.
pub struct HomeUser {
    /// Subject.
    pub name_id: String,
    /// Validation tier that admitted the login.
    pub mode: String,
    /// Session status.
    pub status: String,
    /// Where the attributes came from.
    pub source: String,
    /// Note about skipped attributes.
    pub note: Option<String>,
    /// Canonical fields as label/value pairs.
    pub fields: Vec<(String, String)>,
}

impl HomeUser {
    /// Builds the view of a stored session.
    #[must_use]
    pub fn from_record(record: &SessionRecord) -> Self {
        let raw = &record.attributes.raw;
        Self {
            name_id: record.name_id.clone(),
            mode: record.validation_mode.to_string(),
            status: raw.get("status").cloned().unwrap_or_else(|| "Active".to_string()),
            source: raw
                .get("source")
                .cloned()
                .unwrap_or_else(|| "Keycloak SAML".to_string()),
            note: record.attributes.note.clone(),
            fields: fields(record),
        }
    }
}

/// Login success page template.
#[derive(Template)]
#[template(path = "success.html")]
pub struct SuccessTemplate {
    /// Subject.
    pub name_id: String,
    /// Outcome message.
    pub message: String,
    /// Canonical fields as label/value pairs.
    pub fields: Vec<(String, String)>,
    /// Granted permissions.
    pub permissions: Vec<String>,
    /// Encrypted bundle entries, if the IdP sent any.
    pub encrypted: Vec<(String, String)>,
    /// Every received attribute, joined for display.
    pub raw_attributes: Vec<(String, String)>,
    /// Captured base64 response.
    pub raw_response: Option<String>,
    /// Captured decoded XML.
    pub decoded_xml: Option<String>,
}

impl SuccessTemplate {
    /// Builds the page for a freshly created session.
    #[must_use]
    pub fn from_record(record: &SessionRecord) -> Self {
        let encrypted = record
            .attributes
            .encrypted
            .as_ref()
            .map(|bundle| {
                let mut entries = Vec::new();
                let mut push = |label: &str, value: &Option<String>| {
                    if let Some(v) = value {
                        entries.push((label.to_string(), v.clone()));
                    }
                };
                push("Payload", &bundle.payload);
                push("Chunk count", &bundle.chunk_count);
                push("WebAuthn credential", &bundle.webauthn_credential_id);
                push("Salt", &bundle.encryption_salt);
                for (i, chunk) in bundle.chunks.iter().enumerate() {
                    entries.push((format!("Chunk {}", i + 1), chunk.clone()));
                }
                entries
            })
            .unwrap_or_default();

        let diagnostics = record.diagnostics.as_ref();
        Self {
            name_id: record.name_id.clone(),
            message: record.validation_mode.login_message().to_string(),
            fields: fields(record),
            permissions: record.permissions.clone(),
            encrypted,
            raw_attributes: record
                .attributes
                .raw
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            raw_response: diagnostics.map(|d| d.raw_response.clone()),
            decoded_xml: diagnostics.and_then(|d| d.decoded_xml.clone()),
        }
    }
}

/// Error page template.
#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    /// Page title.
    pub title: String,
    /// Explanation.
    pub message: String,
    /// Technical details.
    pub details: Option<String>,
}

/// Logout result page template.
#[derive(Template)]
#[template(path = "logout.html")]
pub struct LogoutTemplate {
    /// Headline.
    pub message: String,
    /// How the logout was carried out.
    pub logout_type: String,
}

impl From<LogoutReport> for LogoutTemplate {
    fn from(report: LogoutReport) -> Self {
        Self {
            message: report.message,
            logout_type: report.detail,
        }
    }
}

fn fields(record: &SessionRecord) -> Vec<(String, String)> {
    record
        .attributes
        .iter()
        .map(|(field, value)| (field.label().to_string(), value.to_string()))
        .collect()
}

/// Renders `template` with `status`.
pub fn render(status: StatusCode, template: &impl Template) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!("Template render error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}

/// Renders an error page.
pub fn error_page(
    status: StatusCode,
    title: &str,
    message: &str,
    details: Option<String>,
) -> Response {
    render(
        status,
        &ErrorTemplate {
            title: title.to_string(),
            message: message.to_string(),
            details,
        },
    )
}

/// Renders the page for a rejection shown to the user.
pub fn rejection_page(rejection: &Rejection) -> Response {
    let status = StatusCode::from_u16(rejection.http_status()).unwrap_or(StatusCode::UNAUTHORIZED);
    let details = match rejection {
        Rejection::AuthenticationDenied => "Authentication validation failed".to_string(),
        other => other.to_string(),
    };
    error_page(
        status,
        "Authentication Failed",
        "User could not be authenticated via SAML",
        Some(details),
    )
}
