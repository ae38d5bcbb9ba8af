//! SP metadata generation.
//!
//! Produces the `md:EntityDescriptor` this service provider publishes to its
//! identity provider, and checks a generated document before it is served.

use crate::parser::{attr, walk, ElementVisitor};
use crate::settings::SamlSettings;
use crate::signature::certificate_der;
use crate::types::{xml_escape, SamlBinding, MD_NS, SAMLP_NS, XMLDSIG_NS};
use crate::SamlResult;

/// Generates SP metadata XML from the configured settings.
#[must_use]
pub fn sp_metadata(settings: &SamlSettings) -> String {
    let sp = &settings.sp;

    let key_descriptor = sp
        .x509_cert
        .as_deref()
        .and_then(|cert| certificate_der(cert).map(|_| bare_certificate(cert)))
        .map(|cert| {
            format!(
                r#"
        <md:KeyDescriptor use="signing">
            <ds:KeyInfo xmlns:ds="{XMLDSIG_NS}">
                <ds:X509Data>
                    <ds:X509Certificate>{cert}</ds:X509Certificate>
                </ds:X509Data>
            </ds:KeyInfo>
        </md:KeyDescriptor>"#
            )
        })
        .unwrap_or_default();

    let single_logout = sp
        .sls_url
        .as_deref()
        .map(|sls| {
            format!(
                r#"
        <md:SingleLogoutService Binding="{}" Location="{}"/>"#,
                SamlBinding::HttpRedirect.uri(),
                xml_escape(sls)
            )
        })
        .unwrap_or_default();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<md:EntityDescriptor xmlns:md="{MD_NS}" entityID="{}">
    <md:SPSSODescriptor AuthnRequestsSigned="false" WantAssertionsSigned="{}" protocolSupportEnumeration="{SAMLP_NS}">{key_descriptor}{single_logout}
        <md:NameIDFormat>{}</md:NameIDFormat>
        <md:AssertionConsumerService Binding="{}" Location="{}" index="1"/>
    </md:SPSSODescriptor>
</md:EntityDescriptor>"#,
        xml_escape(&sp.entity_id),
        settings.security.want_assertions_signed,
        xml_escape(&sp.name_id_format),
        SamlBinding::HttpPost.uri(),
        xml_escape(&sp.acs_url),
    )
}

/// Strips PEM armor and whitespace from a certificate.
fn bare_certificate(cert: &str) -> String {
    cert.lines()
        .filter(|line| !line.starts_with("-----"))
        .flat_map(|line| line.split_whitespace())
        .collect()
}

/// Checks a metadata document, returning one message per problem.
#[must_use]
pub fn check_sp_metadata(xml: &str) -> Vec<String> {
    #[derive(Default)]
    struct Checker {
        root: Option<String>,
        entity_id: Option<String>,
        sp_descriptor: bool,
        acs: bool,
    }

    impl ElementVisitor for Checker {
        fn open(
            &mut self,
            name: &str,
            parent: Option<&str>,
            attrs: &[(String, String)],
        ) -> SamlResult<()> {
            if parent.is_none() {
                self.root = Some(name.to_string());
                self.entity_id = attr(attrs, "entityID").map(str::to_string);
            }
            match (name, parent) {
                ("SPSSODescriptor", Some("EntityDescriptor")) => self.sp_descriptor = true,
                ("AssertionConsumerService", Some("SPSSODescriptor")) => {
                    self.acs = attr(attrs, "Location").is_some_and(|l| !l.is_empty());
                }
                _ => {}
            }
            Ok(())
        }

        fn close(&mut self, _name: &str, _parent: Option<&str>, _text: &str) -> SamlResult<()> {
            Ok(())
        }
    }

    let mut checker = Checker::default();
    if let Err(e) = walk(xml, &mut checker) {
        return vec![format!("invalid_xml: {e}")];
    }

    let mut errors = Vec::new();
    if checker.root.as_deref() != Some("EntityDescriptor") {
        errors.push("noEntityDescriptor_xml".to_string());
        return errors;
    }
    if checker.entity_id.as_deref().map_or(true, str::is_empty) {
        errors.push("entityID_not_found".to_string());
    }
    if !checker.sp_descriptor {
        errors.push("onlySPSSODescriptor_allowed_xml".to_string());
    }
    if !checker.acs {
        errors.push("sp_acs_not_found".to_string());
    }
    errors
}

/// Generates metadata and collects configuration and document errors.
///
/// Returns the metadata XML when there is nothing to report, or the list of
/// errors otherwise.
pub fn build_sp_metadata(settings: &SamlSettings) -> Result<String, Vec<String>> {
    let mut errors = settings.check_sp_settings();
    let metadata = sp_metadata(settings);
    errors.extend(check_sp_metadata(&metadata));

    if errors.is_empty() {
        Ok(metadata)
    } else {
        Err(errors)
    }
}
