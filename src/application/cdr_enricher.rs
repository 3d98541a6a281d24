//! CDR enrichment
//!
//! Post-parse refinement before the record is persisted. Every step here
//! is tolerant of failure: a lookup that errors logs and leaves the record
//! partially enriched, it never blocks persistence.

use crate::domain::cdr::{CallDirection, CallType, Cdr};
use crate::domain::extension::ExtensionRepository;
use crate::domain::queue::QueueRepository;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

fn extension_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[1-79]\d{3}$").expect("valid regex"))
}

fn queue_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^8\d{3}$").expect("valid regex"))
}

fn ivr_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^9\d{3}$").expect("valid regex"))
}

fn conference_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^3\d{3}$").expect("valid regex"))
}

/// Classify a destination by the number-family patterns.
pub fn derive_call_type(destination: &str) -> CallType {
    if queue_pattern().is_match(destination) {
        CallType::Queue
    } else if ivr_pattern().is_match(destination) {
        CallType::Ivr
    } else if conference_pattern().is_match(destination) {
        CallType::Conference
    } else if extension_pattern().is_match(destination) {
        CallType::Direct
    } else {
        CallType::Other
    }
}

/// Direction from both endpoints, for records the switch left unclassified.
pub fn derive_direction(caller: &str, destination: &str) -> CallDirection {
    let caller_is_ext = extension_pattern().is_match(caller);
    let dest_is_ext = extension_pattern().is_match(destination);

    if caller_is_ext && dest_is_ext {
        return CallDirection::Internal;
    }
    if destination.len() >= 10 || destination.starts_with('+') {
        return CallDirection::Outbound;
    }
    if !caller_is_ext && dest_is_ext {
        return CallDirection::Inbound;
    }
    CallDirection::Internal
}

pub struct CdrEnricher {
    queues: Arc<dyn QueueRepository>,
    extensions: Arc<dyn ExtensionRepository>,
}

impl CdrEnricher {
    pub fn new(queues: Arc<dyn QueueRepository>, extensions: Arc<dyn ExtensionRepository>) -> Self {
        Self { queues, extensions }
    }

    pub async fn enrich(&self, cdr: &mut Cdr) {
        if cdr.call_type.is_none() {
            cdr.call_type = Some(derive_call_type(&cdr.destination_number));
        }

        if cdr.call_type == Some(CallType::Queue) {
            self.resolve_queue(cdr).await;
        }

        if cdr.direction.is_none() {
            cdr.direction = Some(derive_direction(
                &cdr.caller_id_number,
                &cdr.destination_number,
            ));
        }

        self.note_destination_extension(cdr).await;
    }

    /// Map the dialed queue extension to its row id.
    async fn resolve_queue(&self, cdr: &mut Cdr) {
        match self
            .queues
            .get_by_extension(&cdr.destination_number, &cdr.domain)
            .await
        {
            Ok(Some(queue)) => {
                debug!(
                    "mapped queue {} to id {} for cdr {}",
                    queue.name, queue.id, cdr.uuid
                );
                cdr.queue_id = Some(queue.id);
            }
            Ok(None) => {
                warn!(
                    "queue enrichment found no queue {}@{} for cdr {}",
                    cdr.destination_number, cdr.domain, cdr.uuid
                );
            }
            Err(e) => {
                warn!("queue enrichment failed for cdr {}: {}", cdr.uuid, e);
            }
        }
    }

    /// Resolve the destination extension when it looks like one. Only used
    /// for diagnostics today.
    async fn note_destination_extension(&self, cdr: &Cdr) {
        if !extension_pattern().is_match(&cdr.destination_number) || cdr.domain.is_empty() {
            return;
        }
        match self
            .extensions
            .get(&cdr.destination_number, &cdr.domain)
            .await
        {
            Ok(Some(ext)) => {
                debug!(
                    "destination extension {} (id={}) for cdr {}",
                    ext.extension, ext.id, cdr.uuid
                );
            }
            Ok(None) => {}
            Err(e) => {
                warn!("extension enrichment failed for cdr {}: {}", cdr.uuid, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::extension::MockExtensionRepository;
    use crate::domain::queue::{MockQueueRepository, Queue};
    use chrono::Utc;

    fn queue_fixture(id: i64) -> Queue {
        let now = Utc::now();
        Queue {
            id,
            name: "support".to_string(),
            extension: "8000".to_string(),
            domain_id: 1,
            strategy: "longest-idle-agent".to_string(),
            moh: "local_stream://default".to_string(),
            record_template: String::new(),
            time_base_score: "system".to_string(),
            max_wait_time: 300,
            max_wait_time_no_agent: 30,
            tier_rules_apply: false,
            tier_rule_wait_second: 30,
            discard_abandoned_after: 60,
            abandoned_resume_allowed: false,
            active: true,
            created_at: now,
            updated_at: now,
            domain: "pbx.local".to_string(),
        }
    }

    fn cdr_fixture(destination: &str) -> Cdr {
        let now = Utc::now();
        Cdr {
            id: 0,
            uuid: "u1".to_string(),
            caller_id_number: "1001".to_string(),
            caller_id_name: "Alice".to_string(),
            destination_number: destination.to_string(),
            context: "default".to_string(),
            extension: destination.to_string(),
            domain: "pbx.local".to_string(),
            start_stamp: now,
            answer_stamp: None,
            end_stamp: now,
            duration: 0,
            billsec: 0,
            holdsec: 0,
            hangup_cause: String::new(),
            hangup_cause_q850: None,
            sip_hangup_disposition: None,
            direction: None,
            call_type: None,
            queue_id: None,
            queue_wait_time: None,
            agent_extension: None,
            record_file: None,
            record_duration: None,
            sip_from_user: None,
            sip_to_user: None,
            sip_call_id: None,
            user_agent: None,
            read_codec: None,
            write_codec: None,
            remote_media_ip: None,
            rtp_audio_in_mos: None,
            rtp_audio_in_packet_count: None,
            rtp_audio_in_packet_loss: None,
            rtp_audio_in_jitter_min: None,
            rtp_audio_in_jitter_max: None,
            created_at: now,
        }
    }

    #[test]
    fn test_derive_call_type_families() {
        assert_eq!(derive_call_type("8000"), CallType::Queue);
        assert_eq!(derive_call_type("9000"), CallType::Ivr);
        assert_eq!(derive_call_type("3000"), CallType::Conference);
        assert_eq!(derive_call_type("1001"), CallType::Direct);
        assert_eq!(derive_call_type("15551234567"), CallType::Other);
        assert_eq!(derive_call_type(""), CallType::Other);
    }

    #[test]
    fn test_derive_direction() {
        assert_eq!(derive_direction("1001", "1002"), CallDirection::Internal);
        assert_eq!(derive_direction("1001", "15551234567"), CallDirection::Outbound);
        assert_eq!(derive_direction("1001", "+49301234"), CallDirection::Outbound);
        assert_eq!(
            derive_direction("15551234567", "1001"),
            CallDirection::Inbound
        );
        assert_eq!(derive_direction("333", "444"), CallDirection::Internal);
    }

    #[tokio::test]
    async fn test_enrich_resolves_queue_id() {
        let mut queues = MockQueueRepository::new();
        queues
            .expect_get_by_extension()
            .returning(|_, _| Ok(Some(queue_fixture(42))));
        let extensions = MockExtensionRepository::new();

        let enricher = CdrEnricher::new(Arc::new(queues), Arc::new(extensions));
        let mut cdr = cdr_fixture("8000");
        cdr.call_type = Some(CallType::Queue);

        enricher.enrich(&mut cdr).await;
        assert_eq!(cdr.queue_id, Some(42));
    }

    #[tokio::test]
    async fn test_enrich_fills_missing_classification() {
        let queues = MockQueueRepository::new();
        let mut extensions = MockExtensionRepository::new();
        extensions.expect_get().returning(|_, _| Ok(None));

        let enricher = CdrEnricher::new(Arc::new(queues), Arc::new(extensions));
        let mut cdr = cdr_fixture("1002");
        cdr.direction = None;
        cdr.call_type = None;

        enricher.enrich(&mut cdr).await;
        assert_eq!(cdr.call_type, Some(CallType::Direct));
        assert_eq!(cdr.direction, Some(CallDirection::Internal));
    }

    #[tokio::test]
    async fn test_enrich_survives_lookup_failure() {
        use crate::domain::shared::error::DomainError;

        let mut queues = MockQueueRepository::new();
        queues
            .expect_get_by_extension()
            .returning(|_, _| Err(DomainError::Database("connection reset".to_string())));
        let extensions = MockExtensionRepository::new();

        let enricher = CdrEnricher::new(Arc::new(queues), Arc::new(extensions));
        let mut cdr = cdr_fixture("8000");
        cdr.call_type = Some(CallType::Queue);

        enricher.enrich(&mut cdr).await;
        // Failure leaves the record partially enriched
        assert_eq!(cdr.queue_id, None);
        assert_eq!(cdr.call_type, Some(CallType::Queue));
    }
}
