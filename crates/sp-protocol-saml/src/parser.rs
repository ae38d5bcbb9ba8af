//! quick-xml based parsers for inbound SAML messages.
//!
//! Parsing is namespace-prefix agnostic: elements are matched by local name,
//! so `saml:Attribute`, `saml2:Attribute` and an unprefixed `Attribute` in the
//! default namespace are all recognised.
//!
//! The [`walk`] driver is shared by every parser in this crate and by the
//! tolerant attribute extractor in `sp-auth`.

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{SamlError, SamlResult};
use crate::types::{
    Assertion, Attribute, AttributeStatement, AuthnStatement, Conditions, LogoutResponse, NameId,
    Response, Status, StatusCode, Subject,
};

/// Callbacks invoked by [`walk`] for every element in document order.
pub trait ElementVisitor {
    /// Called when an element opens. `parent` is the local name of the enclosing element.
    fn open(
        &mut self,
        name: &str,
        parent: Option<&str>,
        attrs: &[(String, String)],
    ) -> SamlResult<()>;

    /// Called when an element closes, with its trimmed text content.
    fn close(&mut self, name: &str, parent: Option<&str>, text: &str) -> SamlResult<()>;
}

/// Streams `xml` through `visitor`.
///
/// Returns an error for malformed XML. Callbacks made before the error
/// remain applied to the visitor.
pub fn walk(xml: &str, visitor: &mut impl ElementVisitor) -> SamlResult<()> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut seen_root = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                if stack.is_empty() && seen_root {
                    return Err(SamlError::XmlParse("multiple root elements".to_string()));
                }
                seen_root = true;
                let name = local_name(e);
                let attrs = attributes_of(e)?;
                visitor.open(&name, stack.last().map(String::as_str), &attrs)?;
                stack.push(name);
                text.clear();
            }
            Event::Empty(ref e) => {
                if stack.is_empty() && seen_root {
                    return Err(SamlError::XmlParse("multiple root elements".to_string()));
                }
                seen_root = true;
                let name = local_name(e);
                let attrs = attributes_of(e)?;
                let parent = stack.last().map(String::as_str);
                visitor.open(&name, parent, &attrs)?;
                visitor.close(&name, parent, "")?;
            }
            Event::Text(ref t) => {
                let unescaped = t
                    .unescape()
                    .map_err(|e| SamlError::XmlParse(e.to_string()))?;
                text.push_str(&unescaped);
            }
            Event::CData(c) => {
                text.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Event::End(_) => {
                let name = stack
                    .pop()
                    .ok_or_else(|| SamlError::XmlParse("unexpected closing tag".to_string()))?;
                visitor.close(&name, stack.last().map(String::as_str), text.trim())?;
                text.clear();
            }
            Event::Eof => {
                if !stack.is_empty() {
                    return Err(SamlError::XmlParse(format!(
                        "unexpected end of document inside <{}>",
                        stack.join("/")
                    )));
                }
                if !seen_root {
                    return Err(SamlError::XmlParse("document has no root element".to_string()));
                }
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

/// Returns the local name of the document's root element.
pub fn root_element(xml: &str) -> SamlResult<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) => return Ok(local_name(e)),
            Event::Eof => {
                return Err(SamlError::XmlParse("document has no root element".to_string()))
            }
            _ => {}
        }
        buf.clear();
    }
}

/// Parses a `samlp:Response` document.
pub fn parse_response(xml: &str) -> SamlResult<Response> {
    let mut visitor = ResponseVisitor::default();
    walk(xml, &mut visitor)?;
    visitor.response.ok_or_else(|| {
        SamlError::SchemaInvalid("document root is not a SAML Response".to_string())
    })
}

/// Parses a `samlp:LogoutResponse` document.
pub fn parse_logout_response(xml: &str) -> SamlResult<LogoutResponse> {
    let mut visitor = LogoutResponseVisitor::default();
    walk(xml, &mut visitor)?;
    visitor.response.ok_or_else(|| {
        SamlError::SchemaInvalid("document root is not a SAML LogoutResponse".to_string())
    })
}

/// Looks up an attribute value by local name.
pub fn attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().into_inner()).into_owned()
}

fn attributes_of(e: &BytesStart<'_>) -> SamlResult<Vec<(String, String)>> {
    let mut out = Vec::new();
    for attribute in e.attributes() {
        let attribute = attribute.map_err(|err| SamlError::XmlParse(err.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.local_name().into_inner()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|err| SamlError::XmlParse(err.to_string()))?
            .into_owned();
        out.push((key, value));
    }
    Ok(out)
}

fn timestamp(value: Option<&str>, field: &str) -> SamlResult<Option<DateTime<Utc>>> {
    value
        .map(|v| {
            DateTime::parse_from_rfc3339(v)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| SamlError::SchemaInvalid(format!("invalid {field} '{v}': {e}")))
        })
        .transpose()
}

/// Shared handling of `Status`, `StatusCode` and `StatusMessage`.
#[derive(Default)]
struct StatusVisitor {
    status: Option<Status>,
}

impl StatusVisitor {
    fn open(&mut self, name: &str, parent: Option<&str>, attrs: &[(String, String)]) {
        match (name, parent) {
            ("Status", _) => self.status = Some(Status::with_code(String::new())),
            ("StatusCode", Some("Status")) => {
                if let Some(status) = self.status.as_mut() {
                    status.status_code.value = attr(attrs, "Value").unwrap_or_default().to_string();
                }
            }
            ("StatusCode", Some("StatusCode")) => {
                if let Some(status) = self.status.as_mut() {
                    if status.status_code.status_code.is_none() {
                        let sub = attr(attrs, "Value").unwrap_or_default();
                        status.status_code.status_code = Some(Box::new(StatusCode::new(sub)));
                    }
                }
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &str, text: &str) {
        if name == "StatusMessage" {
            if let Some(status) = self.status.as_mut() {
                status.status_message = Some(text.to_string());
            }
        }
    }

    fn take(&mut self) -> SamlResult<Status> {
        match self.status.take() {
            Some(status) if !status.status_code.value.is_empty() => Ok(status),
            Some(_) => Err(SamlError::SchemaInvalid(
                "Status element has no StatusCode".to_string(),
            )),
            None => Err(SamlError::SchemaInvalid(
                "missing Status element".to_string(),
            )),
        }
    }
}

#[derive(Default)]
struct ResponseVisitor {
    response: Option<Response>,
    status: StatusVisitor,
    assertion: Option<Assertion>,
    statement: Option<AttributeStatement>,
    attribute: Option<Attribute>,
    in_encrypted: usize,
}

impl ElementVisitor for ResponseVisitor {
    fn open(
        &mut self,
        name: &str,
        parent: Option<&str>,
        attrs: &[(String, String)],
    ) -> SamlResult<()> {
        if parent.is_none() {
            if name != "Response" {
                return Err(SamlError::SchemaInvalid(format!(
                    "expected Response root element, found {name}"
                )));
            }
            self.response = Some(Response {
                id: attr(attrs, "ID").unwrap_or_default().to_string(),
                version: attr(attrs, "Version").unwrap_or_default().to_string(),
                issue_instant: timestamp(attr(attrs, "IssueInstant"), "IssueInstant")?,
                in_response_to: attr(attrs, "InResponseTo").map(String::from),
                destination: attr(attrs, "Destination").map(String::from),
                ..Response::default()
            });
            return Ok(());
        }

        if self.in_encrypted > 0 || name == "EncryptedAssertion" {
            self.in_encrypted += 1;
            return Ok(());
        }

        self.status.open(name, parent, attrs);

        match name {
            "Assertion" => {
                self.assertion = Some(Assertion {
                    id: attr(attrs, "ID").unwrap_or_default().to_string(),
                    issue_instant: timestamp(attr(attrs, "IssueInstant"), "IssueInstant")?,
                    ..Assertion::default()
                });
            }
            "Subject" => {
                if let Some(a) = self.assertion.as_mut() {
                    a.subject = Some(Subject::default());
                }
            }
            "NameID" if parent == Some("Subject") => {
                if let Some(subject) = self.assertion.as_mut().and_then(|a| a.subject.as_mut()) {
                    subject.name_id = Some(NameId {
                        value: String::new(),
                        format: attr(attrs, "Format").map(String::from),
                        sp_name_qualifier: attr(attrs, "SPNameQualifier").map(String::from),
                    });
                }
            }
            "SubjectConfirmationData" => {
                if let (Some(subject), Some(recipient)) = (
                    self.assertion.as_mut().and_then(|a| a.subject.as_mut()),
                    attr(attrs, "Recipient"),
                ) {
                    subject.recipients.push(recipient.to_string());
                }
            }
            "Conditions" => {
                if let Some(a) = self.assertion.as_mut() {
                    a.conditions = Some(Conditions {
                        not_before: timestamp(attr(attrs, "NotBefore"), "NotBefore")?,
                        not_on_or_after: timestamp(attr(attrs, "NotOnOrAfter"), "NotOnOrAfter")?,
                        audiences: Vec::new(),
                    });
                }
            }
            "AuthnStatement" => {
                if let Some(a) = self.assertion.as_mut() {
                    a.authn_statements.push(AuthnStatement {
                        authn_instant: timestamp(attr(attrs, "AuthnInstant"), "AuthnInstant")?,
                        session_index: attr(attrs, "SessionIndex").map(String::from),
                    });
                }
            }
            "AttributeStatement" => self.statement = Some(AttributeStatement::default()),
            "Attribute" => {
                let name = attr(attrs, "Name").ok_or_else(|| {
                    SamlError::SchemaInvalid("Attribute element without Name".to_string())
                })?;
                self.attribute = Some(Attribute {
                    name: name.to_string(),
                    name_format: attr(attrs, "NameFormat").map(String::from),
                    friendly_name: attr(attrs, "FriendlyName").map(String::from),
                    values: Vec::new(),
                });
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &str, parent: Option<&str>, text: &str) -> SamlResult<()> {
        if self.in_encrypted > 0 {
            self.in_encrypted -= 1;
            if self.in_encrypted == 0 {
                if let Some(r) = self.response.as_mut() {
                    r.encrypted_assertions += 1;
                }
            }
            return Ok(());
        }

        self.status.close(name, text);

        match (name, parent) {
            ("Response", None) => {
                let status = self.status.take()?;
                if let Some(r) = self.response.as_mut() {
                    r.status = status;
                }
            }
            ("Issuer", Some("Response")) => {
                if let Some(r) = self.response.as_mut() {
                    r.issuer = Some(text.to_string());
                }
            }
            ("Issuer", Some("Assertion")) => {
                if let Some(a) = self.assertion.as_mut() {
                    a.issuer = text.to_string();
                }
            }
            ("NameID", Some("Subject")) => {
                if let Some(name_id) = self
                    .assertion
                    .as_mut()
                    .and_then(|a| a.subject.as_mut())
                    .and_then(|s| s.name_id.as_mut())
                {
                    name_id.value = text.to_string();
                }
            }
            ("Audience", _) => {
                if let Some(conditions) = self
                    .assertion
                    .as_mut()
                    .and_then(|a| a.conditions.as_mut())
                {
                    conditions.audiences.push(text.to_string());
                }
            }
            ("AttributeValue", Some("Attribute")) => {
                if let Some(attribute) = self.attribute.as_mut() {
                    if !text.is_empty() {
                        attribute.values.push(text.to_string());
                    }
                }
            }
            ("Attribute", _) => {
                if let (Some(statement), Some(attribute)) =
                    (self.statement.as_mut(), self.attribute.take())
                {
                    statement.attributes.push(attribute);
                }
            }
            ("AttributeStatement", _) => {
                if let (Some(a), Some(statement)) = (self.assertion.as_mut(), self.statement.take())
                {
                    a.attribute_statements.push(statement);
                }
            }
            ("Assertion", _) => {
                if let (Some(r), Some(a)) = (self.response.as_mut(), self.assertion.take()) {
                    r.assertions.push(a);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[derive(Default)]
struct LogoutResponseVisitor {
    response: Option<LogoutResponse>,
    status: StatusVisitor,
}

impl ElementVisitor for LogoutResponseVisitor {
    fn open(
        &mut self,
        name: &str,
        parent: Option<&str>,
        attrs: &[(String, String)],
    ) -> SamlResult<()> {
        if parent.is_none() {
            if name != "LogoutResponse" {
                return Err(SamlError::SchemaInvalid(format!(
                    "expected LogoutResponse root element, found {name}"
                )));
            }
            self.response = Some(LogoutResponse {
                id: attr(attrs, "ID").unwrap_or_default().to_string(),
                in_response_to: attr(attrs, "InResponseTo").map(String::from),
                destination: attr(attrs, "Destination").map(String::from),
                ..LogoutResponse::default()
            });
            return Ok(());
        }
        self.status.open(name, parent, attrs);
        Ok(())
    }

    fn close(&mut self, name: &str, parent: Option<&str>, text: &str) -> SamlResult<()> {
        self.status.close(name, text);
        match (name, parent) {
            ("LogoutResponse", None) => {
                let status = self.status.take()?;
                if let Some(r) = self.response.as_mut() {
                    r.status = status;
                }
            }
            ("Issuer", Some("LogoutResponse")) => {
                if let Some(r) = self.response.as_mut() {
                    r.issuer = Some(text.to_string());
                }
            }
            _ => {}
        }
        Ok(())
    }
}
