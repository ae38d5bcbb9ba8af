//! Session scope handle.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MAX_SCOPE_LEN: usize = 128;

/// Opaque per-browser session handle.
///
/// The transport stores the handle in a cookie; nothing else about the
/// browser is known to the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionScope(String);

impl SessionScope {
    /// Mints a fresh random scope.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accepts a scope presented by a client.
    ///
    /// Returns `None` for values that could not have been minted here.
    #[must_use]
    pub fn from_cookie(value: &str) -> Option<Self> {
        let valid = !value.is_empty()
            && value.len() <= MAX_SCOPE_LEN
            && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        valid.then(|| Self(value.to_string()))
    }

    /// Returns the handle as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
