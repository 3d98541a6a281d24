//! Dialplan responder
//!
//! Classifies the dialed number against an ordered pattern table and
//! renders the routing document for the matched family. Calls are rarer
//! than registrations and routing freshness matters more, so lookups here
//! go straight to the database with no cache.

use super::request::DialplanRequest;
use super::{xml_escape, NOT_FOUND_XML};
use crate::domain::extension::ExtensionRepository;
use crate::domain::queue::QueueRepository;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info};

/// Number families the dialplan understands. Several are reserved: they
/// classify but render not-found until their subsystem exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationKind {
    Extension,
    Queue,
    Ivr,
    Conference,
    Voicemail,
    FeatureCode,
    Outbound,
}

/// Ordered classification table. Order matters where patterns overlap:
/// voicemail codes must win over the generic feature-code pattern, and the
/// extension family is checked first, so `9xxx` can serve as an extension
/// even though it also matches the reserved IVR range.
fn classification_table() -> &'static [(Regex, DestinationKind)] {
    static TABLE: OnceLock<Vec<(Regex, DestinationKind)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        vec![
            (
                Regex::new(r"^[1-79]\d{3}$").expect("valid regex"),
                DestinationKind::Extension,
            ),
            (
                Regex::new(r"^8\d{3}$").expect("valid regex"),
                DestinationKind::Queue,
            ),
            (
                Regex::new(r"^9\d{3}$").expect("valid regex"),
                DestinationKind::Ivr,
            ),
            (
                Regex::new(r"^3\d{3}$").expect("valid regex"),
                DestinationKind::Conference,
            ),
            (
                Regex::new(r"^\*9[78]$").expect("valid regex"),
                DestinationKind::Voicemail,
            ),
            (
                Regex::new(r"^\*\d{2,3}$").expect("valid regex"),
                DestinationKind::FeatureCode,
            ),
            (
                Regex::new(r"^(\+?\d{10,11}|\+\d{8,15})$").expect("valid regex"),
                DestinationKind::Outbound,
            ),
        ]
    })
}

/// First matching family wins; unmatched destinations get not-found.
pub fn classify(destination: &str) -> Option<DestinationKind> {
    classification_table()
        .iter()
        .find(|(pattern, _)| pattern.is_match(destination))
        .map(|&(_, kind)| kind)
}

pub struct DialplanHandler {
    extensions: Arc<dyn ExtensionRepository>,
    queues: Arc<dyn QueueRepository>,
}

impl DialplanHandler {
    pub fn new(extensions: Arc<dyn ExtensionRepository>, queues: Arc<dyn QueueRepository>) -> Self {
        Self { extensions, queues }
    }

    /// Route a dialplan request. Like the directory, every miss or error
    /// renders the canonical not-found document at HTTP 200.
    pub async fn handle(&self, req: &DialplanRequest) -> String {
        debug!(
            "dialplan request: context={}, caller={}, destination={}, domain={}",
            req.context, req.caller_id_number, req.destination_number, req.domain
        );

        if req.destination_number.is_empty() {
            return NOT_FOUND_XML.to_string();
        }

        match classify(&req.destination_number) {
            Some(DestinationKind::Extension) => self.handle_extension(req).await,
            Some(DestinationKind::Queue) => self.handle_queue(req).await,
            Some(DestinationKind::Ivr) => {
                info!("dialplan: ivr not implemented: {}", req.destination_number);
                NOT_FOUND_XML.to_string()
            }
            Some(DestinationKind::Conference) => self.handle_conference(req),
            Some(DestinationKind::Voicemail) => self.handle_voicemail(req),
            Some(DestinationKind::FeatureCode) => {
                info!(
                    "dialplan: feature code not implemented: {}",
                    req.destination_number
                );
                NOT_FOUND_XML.to_string()
            }
            Some(DestinationKind::Outbound) => {
                info!(
                    "dialplan: outbound routing not implemented: {}",
                    req.destination_number
                );
                NOT_FOUND_XML.to_string()
            }
            None => {
                info!(
                    "dialplan: no matching pattern for destination: {}",
                    req.destination_number
                );
                NOT_FOUND_XML.to_string()
            }
        }
    }

    async fn handle_extension(&self, req: &DialplanRequest) -> String {
        let ext = match self
            .extensions
            .get(&req.destination_number, &req.domain)
            .await
        {
            Ok(Some(ext)) => ext,
            Ok(None) => {
                info!(
                    "dialplan: extension not found: {}@{}",
                    req.destination_number, req.domain
                );
                return NOT_FOUND_XML.to_string();
            }
            Err(e) => {
                error!(
                    "dialplan extension lookup failed for {}@{}: {}",
                    req.destination_number, req.domain, e
                );
                return NOT_FOUND_XML.to_string();
            }
        };

        if !ext.active {
            info!(
                "dialplan: extension inactive: {}@{}",
                req.destination_number, req.domain
            );
            return NOT_FOUND_XML.to_string();
        }
        if !ext.is_routable_user() {
            info!(
                "dialplan: cannot directly call type {}: {}@{}",
                ext.ext_type.as_str(),
                req.destination_number,
                req.domain
            );
            return NOT_FOUND_XML.to_string();
        }

        render_extension(
            &ext.extension,
            &req.domain,
            &req.caller_id_number,
            ext.call_timeout,
        )
    }

    async fn handle_queue(&self, req: &DialplanRequest) -> String {
        let queue = match self
            .queues
            .get_by_extension(&req.destination_number, &req.domain)
            .await
        {
            Ok(Some(queue)) => queue,
            Ok(None) => {
                info!(
                    "dialplan: queue not found: {}@{}",
                    req.destination_number, req.domain
                );
                return NOT_FOUND_XML.to_string();
            }
            Err(e) => {
                error!(
                    "dialplan queue lookup failed for {}@{}: {}",
                    req.destination_number, req.domain, e
                );
                return NOT_FOUND_XML.to_string();
            }
        };

        if !queue.active {
            info!(
                "dialplan: queue inactive: {}@{}",
                req.destination_number, req.domain
            );
            return NOT_FOUND_XML.to_string();
        }

        render_queue(
            &queue.name,
            &queue.extension,
            &req.domain,
            queue.max_wait_time,
        )
    }

    fn handle_conference(&self, req: &DialplanRequest) -> String {
        render_conference(&req.destination_number, &req.domain)
    }

    fn handle_voicemail(&self, req: &DialplanRequest) -> String {
        // The caller checks their own mailbox.
        render_voicemail(&req.domain, &req.caller_id_number)
    }
}

fn render_extension(extension: &str, domain: &str, caller_id_number: &str, call_timeout: i32) -> String {
    let extension = xml_escape(extension);
    let domain = xml_escape(domain);
    let caller = xml_escape(caller_id_number);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<document type="freeswitch/xml">
  <section name="dialplan" description="Extension Dialplan">
    <context name="default">
      <extension name="local_extension">
        <condition field="destination_number" expression="^{extension}$">
          <action application="set" data="call_timeout={call_timeout}"/>
          <action application="set" data="hangup_after_bridge=true"/>
          <action application="set" data="continue_on_fail=true"/>
          <action application="set" data="called_party_callgroup=${{user_data({extension}@{domain} var callgroup)}}"/>
          <action application="export" data="dialed_extension={extension}"/>

          <!-- Pre-answer for queue calls -->
          <action application="ring_ready" data=""/>

          <!-- Bridge to extension with recording -->
          <action application="set" data="RECORD_TITLE={caller} to {extension}"/>
          <action application="set" data="RECORD_COPYRIGHT=Squawk"/>
          <action application="set" data="RECORD_ARTIST={caller}"/>
          <action application="set" data="RECORD_DATE=${{strftime(%Y-%m-%d %H:%M:%S)}}"/>

          <action application="bridge" data="user/{extension}@{domain}"/>

          <!-- Voicemail on no answer or busy -->
          <action application="answer" data=""/>
          <action application="sleep" data="1000"/>
          <action application="voicemail" data="default {domain} {extension}"/>
        </condition>
      </extension>
    </context>
  </section>
</document>"#
    )
}

fn render_queue(queue_name: &str, extension: &str, domain: &str, max_wait_time: i32) -> String {
    let queue_name = xml_escape(queue_name);
    let extension = xml_escape(extension);
    let domain = xml_escape(domain);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<document type="freeswitch/xml">
  <section name="dialplan" description="Queue Dialplan">
    <context name="default">
      <extension name="queue_call">
        <condition field="destination_number" expression="^{extension}$">
          <action application="answer" data=""/>
          <action application="set" data="hangup_after_bridge=true"/>
          <action application="set" data="continue_on_fail=NORMAL_TEMPORARY_FAILURE,USER_BUSY,NO_ANSWER,TIMEOUT,NO_USER_RESPONSE"/>

          <!-- Set queue variables -->
          <action application="set" data="queue_name={queue_name}"/>
          <action application="set" data="max_wait_time={max_wait_time}"/>

          <!-- Enter queue with music on hold -->
          <action application="callcenter" data="{queue_name}@{domain}"/>

          <!-- Fallback if queue fails -->
          <action application="playback" data="ivr/ivr-call_cannot_be_completed_as_dialed.wav"/>
          <action application="hangup" data=""/>
        </condition>
      </extension>
    </context>
  </section>
</document>"#
    )
}

fn render_conference(conference_number: &str, domain: &str) -> String {
    let number = xml_escape(conference_number);
    let domain = xml_escape(domain);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<document type="freeswitch/xml">
  <section name="dialplan" description="Conference Dialplan">
    <context name="default">
      <extension name="conference_call">
        <condition field="destination_number" expression="^{number}$">
          <action application="answer" data=""/>
          <action application="set" data="conference_name={number}@{domain}"/>

          <!-- Join conference -->
          <action application="conference" data="{number}@default"/>
        </condition>
      </extension>
    </context>
  </section>
</document>"#
    )
}

fn render_voicemail(domain: &str, extension: &str) -> String {
    let domain = xml_escape(domain);
    let extension = xml_escape(extension);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<document type="freeswitch/xml">
  <section name="dialplan" description="Voicemail Access">
    <context name="default">
      <extension name="voicemail_check">
        <condition field="destination_number" expression="^(\*97|\*98)$">
          <action application="answer" data=""/>
          <action application="sleep" data="1000"/>
          <action application="voicemail" data="check default {domain} {extension}"/>
        </condition>
      </extension>
    </context>
  </section>
</document>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_families() {
        assert_eq!(classify("1001"), Some(DestinationKind::Extension));
        assert_eq!(classify("7999"), Some(DestinationKind::Extension));
        assert_eq!(classify("8000"), Some(DestinationKind::Queue));
        assert_eq!(classify("8999"), Some(DestinationKind::Queue));
        assert_eq!(classify("*97"), Some(DestinationKind::Voicemail));
        assert_eq!(classify("*98"), Some(DestinationKind::Voicemail));
        assert_eq!(classify("*21"), Some(DestinationKind::FeatureCode));
        assert_eq!(classify("15551234567"), Some(DestinationKind::Outbound));
        assert_eq!(classify("+4930123456"), Some(DestinationKind::Outbound));
        assert_eq!(classify(""), None);
        assert_eq!(classify("12"), None);
        assert_eq!(classify("abcd"), None);
    }

    #[test]
    fn test_classify_order_on_overlaps() {
        // 9xxx matches the extension family before the reserved IVR range
        assert_eq!(classify("9000"), Some(DestinationKind::Extension));
        // 3xxx likewise hits the extension family first
        assert_eq!(classify("3000"), Some(DestinationKind::Extension));
        // voicemail codes win over the generic feature-code pattern
        assert_eq!(classify("*97"), Some(DestinationKind::Voicemail));
    }

    #[test]
    fn test_render_extension_template() {
        let xml = render_extension("1002", "pbx.local", "1001", 45);
        assert!(xml.contains(r#"expression="^1002$""#));
        assert!(xml.contains(r#"data="call_timeout=45""#));
        assert!(xml.contains(r#"data="hangup_after_bridge=true""#));
        assert!(xml.contains(r#"data="user/1002@pbx.local""#));
        assert!(xml.contains(r#"data="voicemail" "#) || xml.contains("voicemail"));
        // switch-side placeholders survive rendering
        assert!(xml.contains("${strftime(%Y-%m-%d %H:%M:%S)}"));
        assert!(xml.contains("${user_data(1002@pbx.local var callgroup)}"));
    }

    #[test]
    fn test_render_queue_template() {
        let xml = render_queue("support", "8000", "pbx.local", 300);
        assert!(xml.contains(r#"expression="^8000$""#));
        assert!(xml.contains(r#"data="support@pbx.local""#));
        assert!(xml.contains(r#"data="max_wait_time=300""#));
        assert!(xml.contains("NORMAL_TEMPORARY_FAILURE,USER_BUSY,NO_ANSWER,TIMEOUT,NO_USER_RESPONSE"));
        assert!(xml.contains("ivr/ivr-call_cannot_be_completed_as_dialed.wav"));
    }

    #[test]
    fn test_render_conference_template() {
        let xml = render_conference("3100", "pbx.local");
        assert!(xml.contains(r#"data="conference_name=3100@pbx.local""#));
        assert!(xml.contains(r#"application="conference" data="3100@default""#));
    }

    #[test]
    fn test_render_voicemail_template() {
        let xml = render_voicemail("pbx.local", "1001");
        assert!(xml.contains(r#"data="check default pbx.local 1001""#));
        assert!(xml.contains(r#"expression="^(\*97|\*98)$""#));
    }
}
