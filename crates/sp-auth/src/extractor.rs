//! Direct attribute extraction from a decoded assertion document.
//!
//! Used when strict validation refused the response but policy still allows
//! reading it. Extraction never fails: a malformed document yields whatever
//! was collected before the error.

use sp_protocol_saml::parser::{attr, walk, ElementVisitor};
use sp_protocol_saml::{Attribute, SamlResult};
use tracing::warn;

/// Attribute names mapped to their values, in document order.
///
/// Repeated `Attribute` elements with the same name are merged, keeping
/// every value in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawAttributeSet {
    entries: Vec<(String, Vec<String>)>,
}

impl RawAttributeSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from parsed attributes, dropping those without values.
    #[must_use]
    pub fn from_attributes(attributes: &[Attribute]) -> Self {
        let mut set = Self::new();
        for attribute in attributes {
            set.extend(&attribute.name, attribute.values.iter().cloned());
        }
        set
    }

    /// Appends values under `name`.
    pub fn extend(&mut self, name: &str, values: impl IntoIterator<Item = String>) {
        let mut values = values.into_iter().filter(|v| !v.is_empty()).peekable();
        if values.peek().is_none() {
            return;
        }
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => existing.extend(values),
            None => self.entries.push((name.to_string(), values.collect())),
        }
    }

    /// Returns the values for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    /// Iterates over names and values in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    /// Returns the number of distinct names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no attribute carried a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What could be read from an assertion without validating it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedAssertion {
    /// First non-empty `NameID`.
    pub name_id: Option<String>,
    /// First `SessionIndex` of an `AuthnStatement`.
    pub session_index: Option<String>,
    /// Attributes with at least one value.
    pub attributes: RawAttributeSet,
}

#[derive(Default)]
struct Collector {
    out: ExtractedAssertion,
    current: Option<(String, Vec<String>)>,
}

impl ElementVisitor for Collector {
    fn open(
        &mut self,
        name: &str,
        _parent: Option<&str>,
        attrs: &[(String, String)],
    ) -> SamlResult<()> {
        match name {
            "Attribute" => {
                self.current = attr(attrs, "Name").map(|n| (n.to_string(), Vec::new()));
            }
            "AuthnStatement" if self.out.session_index.is_none() => {
                self.out.session_index = attr(attrs, "SessionIndex").map(str::to_string);
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &str, parent: Option<&str>, text: &str) -> SamlResult<()> {
        match name {
            "NameID" if self.out.name_id.is_none() && !text.is_empty() => {
                self.out.name_id = Some(text.to_string());
            }
            "AttributeValue" if parent == Some("Attribute") && !text.is_empty() => {
                if let Some((_, values)) = self.current.as_mut() {
                    values.push(text.to_string());
                }
            }
            "Attribute" => {
                if let Some((name, values)) = self.current.take() {
                    self.out.attributes.extend(&name, values);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Reads the subject and attributes of a decoded SAML document.
#[must_use]
pub fn extract(xml: &str) -> ExtractedAssertion {
    let mut collector = Collector::default();
    if let Err(e) = walk(xml, &mut collector) {
        warn!(
            error = %e,
            collected = collector.out.attributes.len(),
            "Attribute extraction stopped early"
        );
    }
    collector.out
}
