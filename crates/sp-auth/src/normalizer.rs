//! Mapping of IdP attribute names onto canonical fields.

use sp_session::{AttributeValue, CanonicalField, EncryptedBundle, NormalizedAttributes};

use crate::extractor::RawAttributeSet;

/// Default prefix marking permission attributes.
pub const DEFAULT_PERMISSION_PREFIX: &str = "Permission.";

const ENCRYPTED_PAYLOAD: &str = "encrypted_payload";
const ENCRYPTED_CHUNK_COUNT: &str = "encrypted_payload_chunks";
const ENCRYPTED_CHUNKS: [&str; 3] = [
    "encrypted_payload_chunk1",
    "encrypted_payload_chunk2",
    "encrypted_payload_chunk3",
];
const WEBAUTHN_CREDENTIAL_ID: &str = "webauthn_credential_id";
const ENCRYPTION_SALT: &str = "encryption_salt";

/// Returns the source attribute names for `field`, most preferred first.
const fn default_aliases(field: CanonicalField) -> &'static [&'static str] {
    match field {
        CanonicalField::Username => &["username", "uid"],
        CanonicalField::Email => &["email", "mail"],
        CanonicalField::FirstName => &["given_name", "givenName", "firstName"],
        CanonicalField::LastName => &["family_name", "sn", "lastName"],
        CanonicalField::Age => &["age"],
        CanonicalField::Mobile => &["mobile", "phone", "telephoneNumber"],
        CanonicalField::Address => &["address", "street"],
        CanonicalField::Profession => &["profession", "title"],
        CanonicalField::Roles => &["Role", "role", "roles"],
    }
}

/// Result of normalizing a raw attribute set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    /// Canonical attributes.
    pub attributes: NormalizedAttributes,
    /// Permission names with the prefix removed, in source order.
    pub permissions: Vec<String>,
}

/// Maps raw attribute names to [`CanonicalField`]s.
///
/// For each field the first alias present in the raw set wins. Single-valued
/// fields keep their first value, multi-valued fields keep all of them.
#[derive(Debug, Clone)]
pub struct AttributeNormalizer {
    permission_prefix: String,
}

impl Default for AttributeNormalizer {
    fn default() -> Self {
        Self {
            permission_prefix: DEFAULT_PERMISSION_PREFIX.to_string(),
        }
    }
}

impl AttributeNormalizer {
    /// Creates a normalizer with the default alias table and prefix.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the permission prefix.
    #[must_use]
    pub fn with_permission_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.permission_prefix = prefix.into();
        self
    }

    /// Normalizes `raw` into canonical fields and permissions.
    #[must_use]
    pub fn normalize(&self, raw: &RawAttributeSet) -> Normalized {
        let mut attributes = NormalizedAttributes::new();

        for field in CanonicalField::ALL {
            let values = default_aliases(field)
                .iter()
                .find_map(|alias| raw.get(alias).filter(|v| !v.is_empty()));

            let value = match values {
                None => AttributeValue::Unavailable,
                Some(values) if field.is_multi() => AttributeValue::Multi(values.to_vec()),
                Some(values) => AttributeValue::Single(values[0].clone()),
            };
            attributes.set(field, value);
        }

        let bundle = encrypted_bundle(raw);
        attributes.encrypted = (!bundle.is_empty()).then_some(bundle);
        attributes.raw = raw
            .iter()
            .map(|(name, values)| (name.to_string(), values.join(", ")))
            .collect();

        let mut permissions: Vec<String> = Vec::new();
        if !self.permission_prefix.is_empty() {
            for (name, _) in raw.iter() {
                if let Some(permission) = name.strip_prefix(self.permission_prefix.as_str()) {
                    if !permission.is_empty() && !permissions.iter().any(|p| p == permission) {
                        permissions.push(permission.to_string());
                    }
                }
            }
        }

        Normalized {
            attributes,
            permissions,
        }
    }

    /// Returns the username field's value, if the IdP sent one.
    #[must_use]
    pub fn username(&self, raw: &RawAttributeSet) -> Option<String> {
        default_aliases(CanonicalField::Username)
            .iter()
            .find_map(|alias| raw.get(alias).and_then(|v| v.first()).cloned())
    }
}

fn encrypted_bundle(raw: &RawAttributeSet) -> EncryptedBundle {
    let first = |name: &str| raw.get(name).and_then(|v| v.first()).cloned();

    EncryptedBundle {
        payload: first(ENCRYPTED_PAYLOAD),
        chunk_count: first(ENCRYPTED_CHUNK_COUNT),
        chunks: ENCRYPTED_CHUNKS.iter().filter_map(|name| first(name)).collect(),
        webauthn_credential_id: first(WEBAUTHN_CREDENTIAL_ID),
        encryption_salt: first(ENCRYPTION_SALT),
    }
}
