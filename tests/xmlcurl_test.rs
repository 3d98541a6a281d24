//! XML_CURL responder tests
//!
//! Exercises the directory and dialplan pipelines against stub
//! repositories; no database required.

use async_trait::async_trait;
use chrono::Utc;
use squawk::config::CacheConfig;
use squawk::domain::extension::{
    Extension, ExtensionFilter, ExtensionRepository, ExtensionType, ExtensionUpdate, NewExtension,
    SipDomain,
};
use squawk::domain::queue::{
    NewQueue, NewQueueAgent, Queue, QueueAgent, QueueAgentUpdate, QueueRepository, QueueUpdate,
};
use squawk::domain::shared::result::Result;
use squawk::infrastructure::cache::CacheManager;
use squawk::interface::xmlcurl::{
    DialplanHandler, DialplanRequest, DirectoryHandler, DirectoryRequest, NOT_FOUND_XML,
};
use std::sync::Arc;

fn extension_fixture(number: &str, active: bool, ext_type: ExtensionType) -> Extension {
    let now = Utc::now();
    Extension {
        id: 1,
        domain_id: 1,
        extension: number.to_string(),
        ext_type,
        display_name: "Alice".to_string(),
        email: None,
        sip_password: "plaintext-password".to_string(),
        sip_ha1: "abc123".to_string(),
        sip_ha1b: "def456".to_string(),
        vm_password: None,
        vm_email: None,
        active,
        max_concurrent: 3,
        call_timeout: 30,
        created_at: now,
        updated_at: now,
        domain: "pbx.local".to_string(),
    }
}

fn queue_fixture(number: &str, active: bool) -> Queue {
    let now = Utc::now();
    Queue {
        id: 5,
        name: "support".to_string(),
        extension: number.to_string(),
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
        active,
        created_at: now,
        updated_at: now,
        domain: "pbx.local".to_string(),
    }
}

/// Serves one canned extension; everything else is absent.
struct StubExtensions {
    extension: Option<Extension>,
}

#[async_trait]
impl ExtensionRepository for StubExtensions {
    async fn get(&self, extension: &str, domain: &str) -> Result<Option<Extension>> {
        Ok(self
            .extension
            .clone()
            .filter(|e| e.extension == extension && e.domain == domain))
    }

    async fn get_by_id(&self, _id: i64) -> Result<Option<Extension>> {
        Ok(self.extension.clone())
    }

    async fn list(
        &self,
        _filter: ExtensionFilter,
        _page: i64,
        _per_page: i64,
    ) -> Result<(Vec<Extension>, i64)> {
        unimplemented!("not used by xmlcurl tests")
    }

    async fn create(&self, _data: NewExtension) -> Result<Extension> {
        unimplemented!("not used by xmlcurl tests")
    }

    async fn update(&self, _id: i64, _data: ExtensionUpdate) -> Result<Extension> {
        unimplemented!("not used by xmlcurl tests")
    }

    async fn update_password(&self, _id: i64, _password: &str) -> Result<()> {
        unimplemented!("not used by xmlcurl tests")
    }

    async fn deactivate(&self, _id: i64) -> Result<()> {
        unimplemented!("not used by xmlcurl tests")
    }

    async fn get_domain(&self, _id: i64) -> Result<Option<SipDomain>> {
        Ok(None)
    }
}

struct StubQueues {
    queue: Option<Queue>,
}

#[async_trait]
impl QueueRepository for StubQueues {
    async fn get(&self, _id: i64) -> Result<Option<Queue>> {
        Ok(self.queue.clone())
    }

    async fn get_by_extension(&self, extension: &str, domain: &str) -> Result<Option<Queue>> {
        Ok(self
            .queue
            .clone()
            .filter(|q| q.extension == extension && q.domain == domain))
    }

    async fn list(&self, _domain_id: Option<i64>, _active: Option<bool>) -> Result<Vec<Queue>> {
        unimplemented!("not used by xmlcurl tests")
    }

    async fn create(&self, _data: NewQueue) -> Result<Queue> {
        unimplemented!("not used by xmlcurl tests")
    }

    async fn update(&self, _id: i64, _data: QueueUpdate) -> Result<Queue> {
        unimplemented!("not used by xmlcurl tests")
    }

    async fn delete(&self, _id: i64) -> Result<()> {
        unimplemented!("not used by xmlcurl tests")
    }

    async fn get_agent(&self, _id: i64) -> Result<Option<QueueAgent>> {
        Ok(None)
    }

    async fn list_agents(&self, _queue_id: i64, _active: Option<bool>) -> Result<Vec<QueueAgent>> {
        unimplemented!("not used by xmlcurl tests")
    }

    async fn add_agent(&self, _data: NewQueueAgent) -> Result<QueueAgent> {
        unimplemented!("not used by xmlcurl tests")
    }

    async fn update_agent(&self, _id: i64, _data: QueueAgentUpdate) -> Result<QueueAgent> {
        unimplemented!("not used by xmlcurl tests")
    }

    async fn remove_agent(&self, _id: i64) -> Result<()> {
        unimplemented!("not used by xmlcurl tests")
    }
}

fn directory_handler(extension: Option<Extension>) -> DirectoryHandler {
    let cache = Arc::new(CacheManager::new(&CacheConfig::default()));
    DirectoryHandler::new(Arc::new(StubExtensions { extension }), cache)
}

fn dialplan_handler(extension: Option<Extension>, queue: Option<Queue>) -> DialplanHandler {
    DialplanHandler::new(
        Arc::new(StubExtensions { extension }),
        Arc::new(StubQueues { queue }),
    )
}

fn directory_request(user: &str, domain: &str) -> DirectoryRequest {
    let mut req = DirectoryRequest {
        section: "directory".to_string(),
        user: user.to_string(),
        domain: domain.to_string(),
        ..Default::default()
    };
    req.normalize();
    req
}

fn dialplan_request(destination: &str, domain: &str) -> DialplanRequest {
    let mut req = DialplanRequest {
        section: "dialplan".to_string(),
        caller_id_number: "1001".to_string(),
        caller_id_name: "Alice".to_string(),
        destination_number: destination.to_string(),
        domain: domain.to_string(),
        ..Default::default()
    };
    req.normalize();
    req
}

#[tokio::test]
async fn directory_hit_renders_credentials() {
    let handler = directory_handler(Some(extension_fixture("1001", true, ExtensionType::User)));
    // Port suffix is normalised away before the lookup
    let req = directory_request("1001", "pbx.local:5060");
    let xml = handler.handle(&req).await;

    assert!(xml.contains(r#"<user id="1001">"#));
    assert!(xml.contains(r#"a1-hash" value="abc123""#));
    assert!(xml.contains(r#"effective_caller_id_number" value="1001""#));
    assert!(!xml.contains("plaintext-password"));
}

#[tokio::test]
async fn directory_inactive_extension_is_not_found() {
    let handler = directory_handler(Some(extension_fixture("1001", false, ExtensionType::User)));
    let xml = handler.handle(&directory_request("1001", "pbx.local")).await;
    assert_eq!(xml, NOT_FOUND_XML);
}

#[tokio::test]
async fn directory_non_user_type_is_not_found() {
    let handler = directory_handler(Some(extension_fixture("1001", true, ExtensionType::Ivr)));
    let xml = handler.handle(&directory_request("1001", "pbx.local")).await;
    assert_eq!(xml, NOT_FOUND_XML);
}

#[tokio::test]
async fn directory_unknown_user_is_not_found() {
    let handler = directory_handler(None);
    let xml = handler.handle(&directory_request("1002", "pbx.local")).await;
    assert_eq!(xml, NOT_FOUND_XML);
}

#[tokio::test]
async fn directory_caches_successful_lookup() {
    let cache = Arc::new(CacheManager::new(&CacheConfig::default()));
    let handler = DirectoryHandler::new(
        Arc::new(StubExtensions {
            extension: Some(extension_fixture("1001", true, ExtensionType::User)),
        }),
        cache.clone(),
    );

    let req = directory_request("1001", "pbx.local");
    handler.handle(&req).await;
    let first_stats = cache.stats();
    assert_eq!(first_stats.size, 1);

    handler.handle(&req).await;
    let second_stats = cache.stats();
    assert!(second_stats.hits > first_stats.hits);

    // Invalidation drops the entry so the next lookup is fresh
    handler.invalidate("1001", "pbx.local");
    assert_eq!(cache.stats().size, 0);
}

#[tokio::test]
async fn dialplan_queue_call_renders_callcenter() {
    let handler = dialplan_handler(None, Some(queue_fixture("8000", true)));
    let xml = handler.handle(&dialplan_request("8000", "pbx.local")).await;

    assert!(xml.contains(r#"<action application="callcenter" data="support@pbx.local"/>"#));
    assert!(xml.contains(r#"data="max_wait_time=300""#));
}

#[tokio::test]
async fn dialplan_inactive_queue_is_not_found() {
    let handler = dialplan_handler(None, Some(queue_fixture("8000", false)));
    let xml = handler.handle(&dialplan_request("8000", "pbx.local")).await;
    assert_eq!(xml, NOT_FOUND_XML);
}

#[tokio::test]
async fn dialplan_extension_call_bridges_user() {
    let handler = dialplan_handler(
        Some(extension_fixture("1002", true, ExtensionType::User)),
        None,
    );
    let xml = handler.handle(&dialplan_request("1002", "pbx.local")).await;

    assert!(xml.contains(r#"data="user/1002@pbx.local""#));
    assert!(xml.contains(r#"data="call_timeout=30""#));
}

#[tokio::test]
async fn dialplan_empty_destination_is_not_found() {
    let handler = dialplan_handler(None, None);
    let mut req = dialplan_request("", "pbx.local");
    req.destination_number.clear();
    let xml = handler.handle(&req).await;
    assert_eq!(xml, NOT_FOUND_XML);
}

#[tokio::test]
async fn dialplan_voicemail_codes_route_to_mailbox_check() {
    let handler = dialplan_handler(None, None);
    for code in ["*97", "*98"] {
        let xml = handler.handle(&dialplan_request(code, "pbx.local")).await;
        assert!(
            xml.contains(r#"data="check default pbx.local 1001""#),
            "{} should reach the voicemail check flow",
            code
        );
    }
}

#[tokio::test]
async fn dialplan_feature_code_is_reserved() {
    let handler = dialplan_handler(None, None);
    let xml = handler.handle(&dialplan_request("*21", "pbx.local")).await;
    assert_eq!(xml, NOT_FOUND_XML);
}

#[tokio::test]
async fn dialplan_outbound_is_reserved() {
    let handler = dialplan_handler(None, None);
    let xml = handler
        .handle(&dialplan_request("15551234567", "pbx.local"))
        .await;
    assert_eq!(xml, NOT_FOUND_XML);
}
