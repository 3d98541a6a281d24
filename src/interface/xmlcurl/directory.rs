//! Directory responder
//!
//! Answers credential lookups for SIP REGISTER and INVITE auth. Cache-aside
//! over (user, domain) with a short TTL so a password rotation converges
//! within one re-registration interval. Negative lookups are not cached: a
//! freshly created extension must be visible on its next attempt.

use super::request::DirectoryRequest;
use super::{xml_escape, NOT_FOUND_XML};
use crate::domain::extension::{Extension, ExtensionRepository};
use crate::infrastructure::cache::CacheManager;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

pub const DIRECTORY_CACHE_TTL: Duration = Duration::from_secs(60);

// Softswitch variable placeholders pass through verbatim; the switch
// expands them, not us.
const DOMAIN_DIAL_STRING: &str = "{^^:sip_invite_domain=${dialed_domain}:presence_id=${dialed_user}@${dialed_domain}}${sofia_contact(*/${dialed_user}@${dialed_domain})},${verto_contact(${dialed_user}@${dialed_domain})}";
const USER_DIAL_STRING: &str =
    "{presence_id=${dialed_user}@${dialed_domain}}${sofia_contact(${dialed_user}@${dialed_domain})}";

pub struct DirectoryHandler {
    extensions: Arc<dyn ExtensionRepository>,
    cache: Arc<CacheManager>,
}

impl DirectoryHandler {
    pub fn new(extensions: Arc<dyn ExtensionRepository>, cache: Arc<CacheManager>) -> Self {
        Self { extensions, cache }
    }

    /// Process a directory request. Every failure mode renders the
    /// canonical not-found document; the HTTP layer always replies 200.
    pub async fn handle(&self, req: &DirectoryRequest) -> String {
        debug!(
            "directory request: user={}, domain={}, action={}",
            req.user, req.domain, req.action
        );

        if req.user.is_empty() || req.domain.is_empty() {
            return NOT_FOUND_XML.to_string();
        }

        let cache_key = format!("dir:{}@{}", req.user, req.domain);
        if let Some(ext) = self.cache.get(&cache_key) {
            debug!("directory cache hit for {}@{}", req.user, req.domain);
            return render_directory(&ext);
        }

        match self.extensions.get(&req.user, &req.domain).await {
            Ok(Some(ext)) => {
                if !ext.active {
                    info!("directory: extension inactive: {}@{}", req.user, req.domain);
                    return NOT_FOUND_XML.to_string();
                }
                if !ext.is_routable_user() {
                    info!(
                        "directory: extension type {} cannot authenticate: {}@{}",
                        ext.ext_type.as_str(),
                        req.user,
                        req.domain
                    );
                    return NOT_FOUND_XML.to_string();
                }

                self.cache.set(&cache_key, ext.clone(), DIRECTORY_CACHE_TTL);
                debug!(
                    "directory: found extension {}@{} (id={})",
                    req.user, req.domain, ext.id
                );
                render_directory(&ext)
            }
            Ok(None) => {
                info!("directory: extension not found: {}@{}", req.user, req.domain);
                NOT_FOUND_XML.to_string()
            }
            Err(e) => {
                error!(
                    "directory lookup failed for {}@{}: {}",
                    req.user, req.domain, e
                );
                NOT_FOUND_XML.to_string()
            }
        }
    }

    /// Drop the cached entry for a user; called by the admin API after
    /// mutations so the switch sees fresh credentials.
    pub fn invalidate(&self, user: &str, domain: &str) {
        self.cache.delete(&format!("dir:{}@{}", user, domain));
        debug!("directory cache invalidated for {}@{}", user, domain);
    }
}

/// Render the directory document for one extension. Credentials are the
/// pre-computed digests only; the plaintext password never leaves the
/// database row.
fn render_directory(ext: &Extension) -> String {
    let mut vm_params = String::new();
    if let Some(password) = ext.vm_password.as_deref().filter(|s| !s.is_empty()) {
        vm_params.push_str(&format!(
            "\n                <param name=\"vm-password\" value=\"{}\"/>",
            xml_escape(password)
        ));
    }
    if let Some(email) = ext.vm_email.as_deref().filter(|s| !s.is_empty()) {
        vm_params.push_str(&format!(
            "\n                <param name=\"vm-email-all-messages\" value=\"{}\"/>",
            xml_escape(email)
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<document type="freeswitch/xml">
  <section name="directory">
    <domain name="{domain}">
      <params>
        <param name="dial-string" value="{domain_dial_string}"/>
        <param name="jsonrpc-allowed-methods" value="verto"/>
      </params>

      <groups>
        <group name="default">
          <users>
            <user id="{extension}">
              <params>
                <!-- MD5 digest authentication; hashes maintained by the database -->
                <param name="a1-hash" value="{ha1}"/>
                <param name="a1-hash-b" value="{ha1b}"/>

                <param name="dial-string" value="{user_dial_string}"/>
                <param name="max-calls" value="{max_calls}"/>{vm_params}
              </params>

              <variables>
                <variable name="toll_allow" value="domestic,international"/>
                <variable name="accountcode" value="{extension}"/>
                <variable name="user_context" value="default"/>
                <variable name="effective_caller_id_name" value="{display_name}"/>
                <variable name="effective_caller_id_number" value="{extension}"/>
                <variable name="outbound_caller_id_name" value="{display_name}"/>
                <variable name="outbound_caller_id_number" value="{extension}"/>
                <variable name="callgroup" value="default"/>
                <variable name="call_timeout" value="{call_timeout}"/>
              </variables>
            </user>
          </users>
        </group>
      </groups>
    </domain>
  </section>
</document>"#,
        domain = xml_escape(&ext.domain),
        domain_dial_string = DOMAIN_DIAL_STRING,
        extension = xml_escape(&ext.extension),
        ha1 = xml_escape(&ext.sip_ha1),
        ha1b = xml_escape(&ext.sip_ha1b),
        user_dial_string = USER_DIAL_STRING,
        max_calls = ext.max_concurrent,
        vm_params = vm_params,
        display_name = xml_escape(&ext.display_name),
        call_timeout = ext.call_timeout,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::extension::ExtensionType;
    use chrono::Utc;

    fn extension_fixture() -> Extension {
        let now = Utc::now();
        Extension {
            id: 7,
            domain_id: 1,
            extension: "1001".to_string(),
            ext_type: ExtensionType::User,
            display_name: "Alice".to_string(),
            email: None,
            sip_password: "plaintext-secret".to_string(),
            sip_ha1: "abc123ha1".to_string(),
            sip_ha1b: "def456ha1b".to_string(),
            vm_password: Some("4242".to_string()),
            vm_email: None,
            active: true,
            max_concurrent: 3,
            call_timeout: 30,
            created_at: now,
            updated_at: now,
            domain: "pbx.local".to_string(),
        }
    }

    #[test]
    fn test_render_carries_digests_not_password() {
        let xml = render_directory(&extension_fixture());
        assert!(xml.contains(r#"<user id="1001">"#));
        assert!(xml.contains(r#"a1-hash" value="abc123ha1""#));
        assert!(xml.contains(r#"a1-hash-b" value="def456ha1b""#));
        assert!(!xml.contains("plaintext-secret"));
    }

    #[test]
    fn test_render_placeholders_pass_through() {
        let xml = render_directory(&extension_fixture());
        assert!(xml.contains("${dialed_user}@${dialed_domain}"));
        assert!(xml.contains("${sofia_contact("));
    }

    #[test]
    fn test_render_conditional_vm_params() {
        let mut ext = extension_fixture();
        let xml = render_directory(&ext);
        assert!(xml.contains(r#"vm-password" value="4242""#));
        assert!(!xml.contains("vm-email-all-messages"));

        ext.vm_password = None;
        ext.vm_email = Some("alice@example.com".to_string());
        let xml = render_directory(&ext);
        assert!(!xml.contains("vm-password"));
        assert!(xml.contains(r#"vm-email-all-messages" value="alice@example.com""#));
    }

    #[test]
    fn test_render_user_settings() {
        let xml = render_directory(&extension_fixture());
        assert!(xml.contains(r#"max-calls" value="3""#));
        assert!(xml.contains(r#"call_timeout" value="30""#));
        assert!(xml.contains(r#"effective_caller_id_number" value="1001""#));
        assert!(xml.contains(r#"effective_caller_id_name" value="Alice""#));
    }

    #[test]
    fn test_render_escapes_display_name() {
        let mut ext = extension_fixture();
        ext.display_name = "Ops <& Support>".to_string();
        let xml = render_directory(&ext);
        assert!(xml.contains("Ops &lt;&amp; Support&gt;"));
    }
}
