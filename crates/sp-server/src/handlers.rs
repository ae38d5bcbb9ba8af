//! Service provider endpoint handlers.
//!
//! Handlers translate HTTP into calls on the validator and the logout
//! coordinator, then render the directive they return. Every branch ends in
//! a response; no handler fails.

use axum::{
    extract::{
        rejection::{FormRejection, QueryRejection},
        Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    Form,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};

use sp_auth::{LogoutDirective, LogoutTrigger, Rejection, ValidationOutcome};
use sp_protocol_saml::{is_logout_response, SloMessage};
use sp_session::SessionScope;

use crate::cookies::{self, ScopeCookie};
use crate::pages::{self, HomeTemplate, HomeUser, LogoutTemplate, SuccessTemplate};
use crate::state::AppState;

/// SAML fields posted to, or redirected at, the SP.
#[derive(Debug, Default, Deserialize)]
pub struct SamlParams {
    /// Login or logout response.
    #[serde(rename = "SAMLResponse")]
    pub saml_response: Option<String>,
    /// Logout response sent under its own field name.
    #[serde(rename = "SAMLLogoutResponse")]
    pub saml_logout_response: Option<String>,
    /// Opaque state echoed by the IdP.
    #[serde(rename = "RelayState")]
    pub relay_state: Option<String>,
}

impl SamlParams {
    /// Returns the logout message, preferring the dedicated field.
    fn logout_message(&self) -> Option<&str> {
        self.saml_logout_response
            .as_deref()
            .or(self.saml_response.as_deref())
            .filter(|v| !v.trim().is_empty())
    }
}

// ============================================================================
// Login
// ============================================================================

/// `GET /login`: redirects to the IdP with a new `AuthnRequest`.
pub async fn login(State(state): State<AppState>) -> Response {
    let home = state.config.home_url();
    match state.processor.login_url(Some(&home)).await {
        Ok(url) => found(&url),
        Err(e) => {
            error!(error = %e, "Could not build SAML login redirect");
            pages::error_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "SAML Login Error",
                "The login request to the identity provider could not be created",
                Some(e.to_string()),
            )
        }
    }
}

/// `POST /callback`: the assertion consumer service.
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    form: Result<Form<SamlParams>, FormRejection>,
) -> Response {
    let params = form_params(form);
    let Some(raw) = params
        .saml_response
        .as_deref()
        .filter(|v| !v.trim().is_empty())
    else {
        return json_error(StatusCode::BAD_REQUEST, &Rejection::MissingResponse);
    };

    if is_logout_response(raw) {
        return sls(&state, &headers, Some(SloMessage::post(raw))).await;
    }

    // Every accepted login gets a fresh scope; the presented one is retired.
    let previous = ScopeCookie::from_headers(&headers, &state.config.session_cookie);
    let scope = SessionScope::generate();
    let outcome = state
        .validator
        .validate_into(&scope, raw, state.sessions.as_ref())
        .await;

    match outcome {
        ValidationOutcome::Accepted { record, .. } => {
            if !previous.minted {
                if let Err(e) = state.sessions.clear(&previous.scope).await {
                    warn!(error = %e, "Could not retire previous session scope");
                }
            }
            let mut response =
                pages::render(StatusCode::OK, &SuccessTemplate::from_record(&record));
            set_scope_cookie(&state, &mut response, &scope);
            response
        }
        ValidationOutcome::Rejected(rejection) if rejection.is_user_facing() => {
            pages::rejection_page(&rejection)
        }
        ValidationOutcome::Rejected(rejection) => json_error(
            StatusCode::from_u16(rejection.http_status()).unwrap_or(StatusCode::BAD_REQUEST),
            &rejection,
        ),
    }
}

// ============================================================================
// Logout
// ============================================================================

/// `GET|POST /logout`: SP-initiated logout.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let cookie = ScopeCookie::from_headers(&headers, &state.config.session_cookie);
    let directive = state.logout.handle_logout_request(&cookie.scope).await;
    render_directive(directive)
}

/// `GET|POST /simple-logout`: ends only the local session.
pub async fn simple_logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let cookie = ScopeCookie::from_headers(&headers, &state.config.session_cookie);
    render_directive(state.logout.local_logout(&cookie.scope).await)
}

/// `GET|POST /cross-sp-logout`: ends every IdP session.
pub async fn cross_sp_logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let cookie = ScopeCookie::from_headers(&headers, &state.config.session_cookie);
    render_directive(state.logout.global_logout(&cookie.scope).await)
}

/// `GET /sls`: logout response over HTTP-Redirect.
pub async fn sls_redirect(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<SamlParams>, QueryRejection>,
) -> Response {
    let params = match query {
        Ok(Query(params)) => params,
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable logout query");
            SamlParams::default()
        }
    };
    let message = params.logout_message().map(SloMessage::redirect);
    sls(&state, &headers, message).await
}

/// `POST /sls`: logout response over HTTP-POST.
pub async fn sls_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    form: Result<Form<SamlParams>, FormRejection>,
) -> Response {
    let params = form_params(form);
    let message = params.logout_message().map(SloMessage::post);
    sls(&state, &headers, message).await
}

async fn sls(state: &AppState, headers: &HeaderMap, message: Option<SloMessage>) -> Response {
    let cookie = ScopeCookie::from_headers(headers, &state.config.session_cookie);
    let directive = state
        .logout
        .handle(&cookie.scope, LogoutTrigger::IdpCallback { message })
        .await;
    render_directive(directive)
}

// ============================================================================
// Status pages
// ============================================================================

/// `GET /`: authentication status.
pub async fn home(State(state): State<AppState>, headers: HeaderMap) -> Response {
    home_page(&state, &headers).await
}

/// `POST /`: IdPs configured with the home URL as their logout target post
/// logout responses here.
pub async fn home_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    form: Result<Form<SamlParams>, FormRejection>,
) -> Response {
    let params = form_params(form);
    if let Some(message) = params.logout_message() {
        return sls(&state, &headers, Some(SloMessage::post(message))).await;
    }
    home_page(&state, &headers).await
}

async fn home_page(state: &AppState, headers: &HeaderMap) -> Response {
    let user = match cookies::read_scope(headers, &state.config.session_cookie) {
        Some(scope) => match state.sessions.get(&scope).await {
            Ok(record) => record.as_ref().map(HomeUser::from_record),
            Err(e) => {
                warn!(error = %e, "Session lookup failed");
                None
            }
        },
        None => None,
    };
    pages::render(StatusCode::OK, &HomeTemplate { user })
}

/// `GET /metadata`: SP metadata, or the configuration errors preventing it.
pub async fn metadata(State(state): State<AppState>) -> Response {
    match state.processor.metadata() {
        Ok(xml) => ([(header::CONTENT_TYPE, "text/xml")], xml).into_response(),
        Err(errors) => {
            warn!(errors = ?errors, "SP metadata is invalid");
            ([(header::CONTENT_TYPE, "text/plain")], errors.join(", ")).into_response()
        }
    }
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always `healthy` while the process serves requests.
    pub status: &'static str,
    /// Crate version.
    pub version: &'static str,
}

/// `GET /health`: liveness.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Helpers
// ============================================================================

/// Missing or non-form bodies are treated as carrying no SAML fields.
fn form_params(form: Result<Form<SamlParams>, FormRejection>) -> SamlParams {
    match form {
        Ok(Form(params)) => params,
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable form body");
            SamlParams::default()
        }
    }
}

fn render_directive(directive: LogoutDirective) -> Response {
    match directive {
        LogoutDirective::RedirectToIdp { url } => found(&url),
        LogoutDirective::LocalOnly(report) | LogoutDirective::SloProcessed(report) => {
            pages::render(StatusCode::OK, &LogoutTemplate::from(report))
        }
    }
}

/// A `302 Found` redirect.
fn found(url: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response()
}

fn json_error(status: StatusCode, rejection: &Rejection) -> Response {
    let body = match rejection {
        Rejection::MissingResponse => json!({
            "error": "SAML Response missing",
            "details": "No SAMLResponse found in POST data",
        }),
        Rejection::SessionUnavailable(detail) => json!({
            "error": "Session Error",
            "details": detail,
        }),
        Rejection::ValidationFailed { kind, detail } => json!({
            "error": "SAML Processing Error",
            "kind": kind.as_str(),
            "details": detail,
        }),
        other => json!({
            "error": "SAML Processing Error",
            "details": other.to_string(),
        }),
    };
    (status, Json(body)).into_response()
}

fn set_scope_cookie(state: &AppState, response: &mut Response, scope: &SessionScope) {
    let value = cookies::session_cookie(
        &state.config.session_cookie,
        scope,
        state.config.session_ttl_secs,
        state.config.secure_cookies(),
    );
    cookies::attach(response, &value);
}
