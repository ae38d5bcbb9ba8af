//! Session scope cookie.
//!
//! The cookie carries only the opaque [`SessionScope`]; every session field
//! stays server-side.

use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::Response;
use sp_session::SessionScope;

/// A request's session scope and whether it was minted for this request.
#[derive(Debug, Clone)]
pub struct ScopeCookie {
    /// The scope.
    pub scope: SessionScope,
    /// True if the request carried no usable cookie.
    pub minted: bool,
}

impl ScopeCookie {
    /// Reads the scope from the `Cookie` header, minting one if absent.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap, name: &str) -> Self {
        match read_scope(headers, name) {
            Some(scope) => Self {
                scope,
                minted: false,
            },
            None => Self {
                scope: SessionScope::generate(),
                minted: true,
            },
        }
    }
}

/// Extracts the session scope from request cookies.
pub fn read_scope(headers: &HeaderMap, name: &str) -> Option<SessionScope> {
    let prefix = format!("{name}=");
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|part| part.trim().strip_prefix(prefix.as_str()))
        .and_then(|value| SessionScope::from_cookie(value.trim()))
}

/// Builds the `Set-Cookie` value for `scope`.
#[must_use]
pub fn session_cookie(name: &str, scope: &SessionScope, max_age_secs: u64, secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!("{name}={scope}; HttpOnly{secure_flag}; SameSite=Lax; Path=/; Max-Age={max_age_secs}")
}

/// Adds a `Set-Cookie` header to `response`.
pub fn attach(response: &mut Response, cookie: &str) {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
}
