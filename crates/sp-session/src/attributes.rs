//! Canonical user attributes.
//!
//! Identity providers name the same attribute differently (`email` or
//! `mail`, `sn` or `family_name`). The session keeps only the canonical
//! view: every [`CanonicalField`] is always present, holding either a value
//! or [`AttributeValue::Unavailable`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Placeholder rendered for a field the IdP did not send.
pub const UNAVAILABLE: &str = "N/A";

static MISSING: AttributeValue = AttributeValue::Unavailable;

// ============================================================================
// Canonical Fields
// ============================================================================

/// The user attributes this service provider understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    /// Login name.
    Username,
    /// Email address.
    Email,
    /// Given name.
    FirstName,
    /// Family name.
    LastName,
    /// Age.
    Age,
    /// Phone number.
    Mobile,
    /// Postal address.
    Address,
    /// Job title.
    Profession,
    /// Role memberships.
    Roles,
}

impl CanonicalField {
    /// Every field, in display order.
    pub const ALL: [Self; 9] = [
        Self::Username,
        Self::Email,
        Self::FirstName,
        Self::LastName,
        Self::Age,
        Self::Mobile,
        Self::Address,
        Self::Profession,
        Self::Roles,
    ];

    /// Returns the snake_case key for this field.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Email => "email",
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::Age => "age",
            Self::Mobile => "mobile",
            Self::Address => "address",
            Self::Profession => "profession",
            Self::Roles => "roles",
        }
    }

    /// Returns a human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Username => "Username",
            Self::Email => "Email",
            Self::FirstName => "First Name",
            Self::LastName => "Last Name",
            Self::Age => "Age",
            Self::Mobile => "Mobile",
            Self::Address => "Address",
            Self::Profession => "Profession",
            Self::Roles => "Roles",
        }
    }

    /// Returns true if the field keeps every value instead of the first.
    #[must_use]
    pub const fn is_multi(&self) -> bool {
        matches!(self, Self::Roles)
    }
}

// ============================================================================
// Values
// ============================================================================

/// The value of a canonical field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    /// A single value.
    Single(String),
    /// Several values in source order.
    Multi(Vec<String>),
    /// The IdP did not send this field.
    #[default]
    Unavailable,
}

impl AttributeValue {
    /// Returns true unless the value is [`AttributeValue::Unavailable`].
    #[must_use]
    pub const fn is_available(&self) -> bool {
        !matches!(self, Self::Unavailable)
    }

    /// Returns the first value, if any.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Single(v) => Some(v.as_str()),
            Self::Multi(values) => values.first().map(String::as_str),
            Self::Unavailable => None,
        }
    }

    /// Returns every value.
    #[must_use]
    pub fn values(&self) -> &[String] {
        match self {
            Self::Single(v) => std::slice::from_ref(v),
            Self::Multi(values) => values,
            Self::Unavailable => &[],
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(v) => f.write_str(v),
            Self::Multi(values) if values.is_empty() => f.write_str(UNAVAILABLE),
            Self::Multi(values) => f.write_str(&values.join(", ")),
            Self::Unavailable => f.write_str(UNAVAILABLE),
        }
    }
}

// ============================================================================
// Encrypted Bundle
// ============================================================================

/// Client-side encrypted attributes of WebAuthn-registered users.
///
/// The SP never decrypts these. They are passed through for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBundle {
    /// The encrypted payload, when sent in one piece.
    pub payload: Option<String>,
    /// Declared number of chunks.
    pub chunk_count: Option<String>,
    /// Payload chunks in order.
    pub chunks: Vec<String>,
    /// Credential that encrypted the payload.
    pub webauthn_credential_id: Option<String>,
    /// Salt used to derive the encryption key.
    pub encryption_salt: Option<String>,
}

impl EncryptedBundle {
    /// Returns true if no encrypted payload was received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_none() && self.chunks.is_empty()
    }
}

// ============================================================================
// Normalized Attributes
// ============================================================================

/// Canonical attributes of an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedAttributes {
    fields: BTreeMap<CanonicalField, AttributeValue>,

    /// Explains why fields are missing, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// Encrypted passthrough attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted: Option<EncryptedBundle>,

    /// Received attributes collapsed to display strings.
    #[serde(default)]
    pub raw: BTreeMap<String, String>,
}

impl Default for NormalizedAttributes {
    fn default() -> Self {
        Self {
            fields: CanonicalField::ALL
                .iter()
                .map(|f| (*f, AttributeValue::Unavailable))
                .collect(),
            note: None,
            encrypted: None,
            raw: BTreeMap::new(),
        }
    }
}

impl NormalizedAttributes {
    /// Creates a set with every field unavailable.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of `field`.
    #[must_use]
    pub fn get(&self, field: CanonicalField) -> &AttributeValue {
        self.fields.get(&field).unwrap_or(&MISSING)
    }

    /// Sets the value of `field`.
    pub fn set(&mut self, field: CanonicalField, value: AttributeValue) {
        self.fields.insert(field, value);
    }

    /// Sets an explanatory note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Iterates over every field in display order.
    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, &AttributeValue)> {
        CanonicalField::ALL.into_iter().map(|f| (f, self.get(f)))
    }

    /// Returns true if at least one field carries a value.
    #[must_use]
    pub fn any_available(&self) -> bool {
        self.fields.values().any(AttributeValue::is_available)
    }
}
