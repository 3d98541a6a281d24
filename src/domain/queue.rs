//! Call queue and queue agent models

use crate::domain::shared::result::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Distribution strategies understood by the softswitch's call-center
/// module. Stored as the softswitch's own spelling.
pub const QUEUE_STRATEGIES: &[&str] = &[
    "ring-all",
    "longest-idle-agent",
    "round-robin",
    "top-down",
    "agent-with-least-talk-time",
    "agent-with-fewest-calls",
    "sequentially-by-agent-order",
    "random",
];

/// A call-distribution target the dialplan can send callers into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Queue {
    pub id: i64,
    pub name: String,
    pub extension: String,
    pub domain_id: i64,
    pub strategy: String,
    pub moh: String,
    pub record_template: String,
    pub time_base_score: String,
    pub max_wait_time: i32,
    pub max_wait_time_no_agent: i32,
    pub tier_rules_apply: bool,
    pub tier_rule_wait_second: i32,
    pub discard_abandoned_after: i32,
    pub abandoned_resume_allowed: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Joined from `voip.domains`.
    pub domain: String,
}

/// An extension assigned to service a queue. Ordering within a queue is
/// (tier ascending, position ascending).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueAgent {
    pub id: i64,
    pub queue_id: i64,
    pub extension_id: i64,
    pub state: String,
    pub status: String,
    pub tier: i32,
    pub position: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // Joined from voip.extensions
    pub extension: String,
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct NewQueue {
    pub name: String,
    pub extension: String,
    pub domain_id: i64,
    pub strategy: String,
    pub moh: String,
    pub record_template: String,
    pub time_base_score: String,
    pub max_wait_time: i32,
    pub max_wait_time_no_agent: i32,
    pub tier_rules_apply: bool,
    pub tier_rule_wait_second: i32,
    pub discard_abandoned_after: i32,
    pub abandoned_resume_allowed: bool,
    pub active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct QueueUpdate {
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

#[derive(Debug, Clone)]
pub struct NewQueueAgent {
    pub queue_id: i64,
    pub extension_id: i64,
    pub state: String,
    pub tier: i32,
    pub position: i32,
    pub active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct QueueAgentUpdate {
    pub state: Option<String>,
    pub status: Option<String>,
    pub tier: Option<i32>,
    pub position: Option<i32>,
    pub active: Option<bool>,
}

/// Queue repository contract
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait QueueRepository: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<Queue>>;

    /// Look up a queue by its dialable extension within a domain.
    async fn get_by_extension(&self, extension: &str, domain: &str) -> Result<Option<Queue>>;

    async fn list(&self, domain_id: Option<i64>, active: Option<bool>) -> Result<Vec<Queue>>;

    async fn create(&self, data: NewQueue) -> Result<Queue>;

    async fn update(&self, id: i64, data: QueueUpdate) -> Result<Queue>;

    async fn delete(&self, id: i64) -> Result<()>;

    async fn get_agent(&self, id: i64) -> Result<Option<QueueAgent>>;

    /// Agents of a queue, ordered by (tier, position).
    async fn list_agents(&self, queue_id: i64, active: Option<bool>) -> Result<Vec<QueueAgent>>;

    async fn add_agent(&self, data: NewQueueAgent) -> Result<QueueAgent>;

    async fn update_agent(&self, id: i64, data: QueueAgentUpdate) -> Result<QueueAgent>;

    async fn remove_agent(&self, id: i64) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_strategies() {
        assert!(QUEUE_STRATEGIES.contains(&"longest-idle-agent"));
        assert!(QUEUE_STRATEGIES.contains(&"ring-all"));
        assert!(!QUEUE_STRATEGIES.contains(&"shortest-queue"));
    }
}
