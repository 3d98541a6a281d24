//! Admin API DTOs
//!
//! Domain models already carry their serialization rules (credential
//! fields are skipped), so responses reuse them directly; this module
//! holds the request shapes, list envelopes, and the response wrapper.

use crate::domain::cdr::Cdr;
use crate::domain::extension::{
    Extension, ExtensionFilter, ExtensionType, ExtensionUpdate, NewExtension,
};
use crate::domain::queue::{
    NewQueue, NewQueueAgent, Queue, QueueAgentUpdate, QueueUpdate, QUEUE_STRATEGIES,
};
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use serde::{Deserialize, Serialize};

/// Generic API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    50
}

/// Clamp pagination to sane bounds (page >= 1, 1 <= per_page <= 1000).
pub fn clamp_pagination(page: i64, per_page: i64) -> (i64, i64) {
    (page.max(1), per_page.clamp(1, 1000))
}

#[derive(Debug, Deserialize)]
pub struct ListExtensionsQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
    pub domain_id: Option<i64>,
    #[serde(rename = "type")]
    pub ext_type: Option<String>,
    pub active: Option<bool>,
}

impl ListExtensionsQuery {
    pub fn filter(&self) -> ExtensionFilter {
        ExtensionFilter {
            domain_id: self.domain_id,
            ext_type: self.ext_type.as_deref().and_then(ExtensionType::parse),
            active: self.active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExtensionListResponse {
    pub extensions: Vec<Extension>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateExtensionRequest {
    pub domain_id: i64,
    pub extension: String,
    #[serde(rename = "type", default = "default_ext_type")]
    pub ext_type: String,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub sip_password: String,
    #[serde(default)]
    pub vm_password: Option<String>,
    #[serde(default)]
    pub vm_email: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: i32,
    #[serde(default = "default_call_timeout")]
    pub call_timeout: i32,
}

fn default_ext_type() -> String {
    "user".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent() -> i32 {
    3
}

fn default_call_timeout() -> i32 {
    30
}

impl CreateExtensionRequest {
    pub fn validate(self) -> Result<NewExtension> {
        if self.domain_id <= 0 {
            return Err(DomainError::Validation("domain_id is required".to_string()));
        }
        if self.extension.len() < 3 || self.extension.len() > 20 {
            return Err(DomainError::Validation(
                "extension must be 3-20 characters".to_string(),
            ));
        }
        let ext_type = ExtensionType::parse(&self.ext_type)
            .ok_or_else(|| DomainError::Validation(format!("invalid type: {}", self.ext_type)))?;
        if self.display_name.is_empty() {
            return Err(DomainError::Validation("display_name is required".to_string()));
        }
        if self.sip_password.len() < 8 || self.sip_password.len() > 128 {
            return Err(DomainError::Validation(
                "sip_password must be 8-128 characters".to_string(),
            ));
        }
        if !(1..=100).contains(&self.max_concurrent) {
            return Err(DomainError::Validation(
                "max_concurrent must be between 1 and 100".to_string(),
            ));
        }
        if !(10..=300).contains(&self.call_timeout) {
            return Err(DomainError::Validation(
                "call_timeout must be between 10 and 300".to_string(),
            ));
        }

        Ok(NewExtension {
            domain_id: self.domain_id,
            extension: self.extension,
            ext_type,
            display_name: self.display_name,
            email: self.email,
            sip_password: self.sip_password,
            vm_password: self.vm_password,
            vm_email: self.vm_email,
            active: self.active,
            max_concurrent: self.max_concurrent,
            call_timeout: self.call_timeout,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateExtensionRequest {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub vm_password: Option<String>,
    pub vm_email: Option<String>,
    pub active: Option<bool>,
    pub max_concurrent: Option<i32>,
    pub call_timeout: Option<i32>,
}

impl UpdateExtensionRequest {
    pub fn validate(self) -> Result<ExtensionUpdate> {
        if let Some(v) = self.max_concurrent {
            if !(1..=100).contains(&v) {
                return Err(DomainError::Validation(
                    "max_concurrent must be between 1 and 100".to_string(),
                ));
            }
        }
        if let Some(v) = self.call_timeout {
            if !(10..=300).contains(&v) {
                return Err(DomainError::Validation(
                    "call_timeout must be between 10 and 300".to_string(),
                ));
            }
        }
        if let Some(ref v) = self.display_name {
            if v.is_empty() {
                return Err(DomainError::Validation(
                    "display_name must not be empty".to_string(),
                ));
            }
        }

        Ok(ExtensionUpdate {
            display_name: self.display_name,
            email: self.email,
            vm_password: self.vm_password,
            vm_email: self.vm_email,
            active: self.active,
            max_concurrent: self.max_concurrent,
            call_timeout: self.call_timeout,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub sip_password: String,
}

impl ChangePasswordRequest {
    pub fn validate(&self) -> Result<()> {
        if self.sip_password.len() < 8 || self.sip_password.len() > 128 {
            return Err(DomainError::Validation(
                "sip_password must be 8-128 characters".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQueuesQuery {
    pub domain_id: Option<i64>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateQueueRequest {
    pub name: String,
    pub extension: String,
    pub domain_id: i64,
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default = "default_moh")]
    pub moh: String,
    #[serde(default)]
    pub record_template: String,
    #[serde(default = "default_time_base_score")]
    pub time_base_score: String,
    #[serde(default = "default_max_wait_time")]
    pub max_wait_time: i32,
    #[serde(default = "default_max_wait_time_no_agent")]
    pub max_wait_time_no_agent: i32,
    #[serde(default)]
    pub tier_rules_apply: bool,
    #[serde(default = "default_tier_rule_wait_second")]
    pub tier_rule_wait_second: i32,
    #[serde(default = "default_discard_abandoned_after")]
    pub discard_abandoned_after: i32,
    #[serde(default)]
    pub abandoned_resume_allowed: bool,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_strategy() -> String {
    "longest-idle-agent".to_string()
}

fn default_moh() -> String {
    "local_stream://default".to_string()
}

fn default_time_base_score() -> String {
    "system".to_string()
}

fn default_max_wait_time() -> i32 {
    300
}

fn default_max_wait_time_no_agent() -> i32 {
    30
}

fn default_tier_rule_wait_second() -> i32 {
    30
}

fn default_discard_abandoned_after() -> i32 {
    60
}

fn validate_strategy(strategy: &str) -> Result<()> {
    if QUEUE_STRATEGIES.contains(&strategy) {
        Ok(())
    } else {
        Err(DomainError::Validation(format!(
            "invalid strategy: {}",
            strategy
        )))
    }
}

fn validate_time_base_score(value: &str) -> Result<()> {
    match value {
        "queue" | "system" => Ok(()),
        other => Err(DomainError::Validation(format!(
            "invalid time_base_score: {}",
            other
        ))),
    }
}

impl CreateQueueRequest {
    pub fn validate(self) -> Result<NewQueue> {
        if self.name.is_empty() {
            return Err(DomainError::Validation("name is required".to_string()));
        }
        if self.extension.len() < 3 || self.extension.len() > 20 {
            return Err(DomainError::Validation(
                "extension must be 3-20 characters".to_string(),
            ));
        }
        if self.domain_id <= 0 {
            return Err(DomainError::Validation("domain_id is required".to_string()));
        }
        validate_strategy(&self.strategy)?;
        validate_time_base_score(&self.time_base_score)?;
        if !(10..=3600).contains(&self.max_wait_time) {
            return Err(DomainError::Validation(
                "max_wait_time must be between 10 and 3600".to_string(),
            ));
        }

        Ok(NewQueue {
            name: self.name,
            extension: self.extension,
            domain_id: self.domain_id,
            strategy: self.strategy,
            moh: self.moh,
            record_template: self.record_template,
            time_base_score: self.time_base_score,
            max_wait_time: self.max_wait_time,
            max_wait_time_no_agent: self.max_wait_time_no_agent,
            tier_rules_apply: self.tier_rules_apply,
            tier_rule_wait_second: self.tier_rule_wait_second,
            discard_abandoned_after: self.discard_abandoned_after,
            abandoned_resume_allowed: self.abandoned_resume_allowed,
            active: self.active,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateQueueRequest {
    pub name: Option<String>,
    pub strategy: Option<String>,
    pub moh: Option<String>,
    pub record_template: Option<String>,
    pub time_base_score: Option<String>,
    pub max_wait_time: Option<i32>,
    pub max_wait_time_no_agent: Option<i32>,
    pub tier_rules_apply: Option<bool>,
    pub tier_rule_wait_second: Option<i32>,
    pub discard_abandoned_after: Option<i32>,
    pub abandoned_resume_allowed: Option<bool>,
    pub active: Option<bool>,
}

impl UpdateQueueRequest {
    pub fn validate(self) -> Result<QueueUpdate> {
        if let Some(ref strategy) = self.strategy {
            validate_strategy(strategy)?;
        }
        if let Some(ref score) = self.time_base_score {
            validate_time_base_score(score)?;
        }

        Ok(QueueUpdate {
            name: self.name,
            strategy: self.strategy,
            moh: self.moh,
            record_template: self.record_template,
            time_base_score: self.time_base_score,
            max_wait_time: self.max_wait_time,
            max_wait_time_no_agent: self.max_wait_time_no_agent,
            tier_rules_apply: self.tier_rules_apply,
            tier_rule_wait_second: self.tier_rule_wait_second,
            discard_abandoned_after: self.discard_abandoned_after,
            abandoned_resume_allowed: self.abandoned_resume_allowed,
            active: self.active,
        })
    }
}

const AGENT_STATES: &[&str] = &["Available", "On Break", "Logged Out"];
const AGENT_STATUSES: &[&str] = &["Waiting", "Receiving", "In a queue call"];

#[derive(Debug, Deserialize)]
pub struct CreateQueueAgentRequest {
    pub extension_id: i64,
    #[serde(default = "default_agent_state")]
    pub state: String,
    #[serde(default = "default_tier")]
    pub tier: i32,
    #[serde(default = "default_tier")]
    pub position: i32,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_agent_state() -> String {
    "Available".to_string()
}

fn default_tier() -> i32 {
    1
}

impl CreateQueueAgentRequest {
    pub fn validate(self, queue_id: i64) -> Result<NewQueueAgent> {
        if self.extension_id <= 0 {
            return Err(DomainError::Validation("extension_id is required".to_string()));
        }
        if !AGENT_STATES.contains(&self.state.as_str()) {
            return Err(DomainError::Validation(format!(
                "invalid state: {}",
                self.state
            )));
        }
        if !(1..=10).contains(&self.tier) {
            return Err(DomainError::Validation("tier must be between 1 and 10".to_string()));
        }
        if !(1..=100).contains(&self.position) {
            return Err(DomainError::Validation(
                "position must be between 1 and 100".to_string(),
            ));
        }

        Ok(NewQueueAgent {
            queue_id,
            extension_id: self.extension_id,
            state: self.state,
            tier: self.tier,
            position: self.position,
            active: self.active,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateQueueAgentRequest {
    pub state: Option<String>,
    pub status: Option<String>,
    pub tier: Option<i32>,
    pub position: Option<i32>,
    pub active: Option<bool>,
}

impl UpdateQueueAgentRequest {
    pub fn validate(self) -> Result<QueueAgentUpdate> {
        if let Some(ref state) = self.state {
            if !AGENT_STATES.contains(&state.as_str()) {
                return Err(DomainError::Validation(format!("invalid state: {}", state)));
            }
        }
        if let Some(ref status) = self.status {
            if !AGENT_STATUSES.contains(&status.as_str()) {
                return Err(DomainError::Validation(format!(
                    "invalid status: {}",
                    status
                )));
            }
        }

        Ok(QueueAgentUpdate {
            state: self.state,
            status: self.status,
            tier: self.tier,
            position: self.position,
            active: self.active,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct QueueListResponse {
    pub queues: Vec<Queue>,
}

#[derive(Debug, Serialize)]
pub struct CdrListResponse {
    pub cdrs: Vec<Cdr>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_request() -> CreateExtensionRequest {
        CreateExtensionRequest {
            domain_id: 1,
            extension: "1001".to_string(),
            ext_type: "user".to_string(),
            display_name: "Alice".to_string(),
            email: None,
            sip_password: "longenoughpw".to_string(),
            vm_password: None,
            vm_email: None,
            active: true,
            max_concurrent: 3,
            call_timeout: 30,
        }
    }

    #[test]
    fn test_create_extension_validation() {
        assert!(create_request().validate().is_ok());

        let mut bad = create_request();
        bad.sip_password = "short".to_string();
        assert!(bad.validate().is_err());

        let mut bad = create_request();
        bad.ext_type = "trunk".to_string();
        assert!(bad.validate().is_err());

        let mut bad = create_request();
        bad.call_timeout = 5;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_queue_strategy_validation() {
        let req = UpdateQueueRequest {
            strategy: Some("shortest-queue".to_string()),
            ..Default::default()
        };
        assert!(req.validate().is_err());

        let req = UpdateQueueRequest {
            strategy: Some("round-robin".to_string()),
            ..Default::default()
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_agent_state_validation() {
        let req = CreateQueueAgentRequest {
            extension_id: 2,
            state: "Sleeping".to_string(),
            tier: 1,
            position: 1,
            active: true,
        };
        assert!(req.validate(1).is_err());

        let req = CreateQueueAgentRequest {
            extension_id: 2,
            state: "On Break".to_string(),
            tier: 1,
            position: 1,
            active: true,
        };
        let agent = req.validate(9).unwrap();
        assert_eq!(agent.queue_id, 9);
    }

    #[test]
    fn test_clamp_pagination() {
        assert_eq!(clamp_pagination(0, 0), (1, 1));
        assert_eq!(clamp_pagination(-5, 5000), (1, 1000));
        assert_eq!(clamp_pagination(3, 100), (3, 100));
    }
}
