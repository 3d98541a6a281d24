//! Call Detail Record (CDR) domain model
//!
//! Two shapes of the same call: the raw XML staged by the ingest endpoint
//! (`CdrQueueEntry`) and the parsed, enriched record workers persist
//! (`Cdr`). Both are keyed by the softswitch call UUID and idempotent on
//! duplicates.

use crate::domain::shared::result::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A staging row holding raw CDR XML awaiting processing.
///
/// `processed_at IS NULL AND retry_count < MAX_CDR_RETRIES` identifies
/// work; rows past the retry cap stay visible to operators but are never
/// leased again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdrQueueEntry {
    pub id: i64,
    pub uuid: String,
    pub xml_data: String,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub error_message: Option<String>,
}

/// A staging row is abandoned after this many failed attempts.
pub const MAX_CDR_RETRIES: i32 = 3;

/// Call direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    /// Inbound call from external
    Inbound,
    /// Outbound call to external
    Outbound,
    /// Internal call between provisioned extensions
    Internal,
}

impl CallDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallDirection::Inbound => "inbound",
            CallDirection::Outbound => "outbound",
            CallDirection::Internal => "internal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inbound" => Some(CallDirection::Inbound),
            "outbound" => Some(CallDirection::Outbound),
            "internal" => Some(CallDirection::Internal),
            _ => None,
        }
    }
}

/// How the call was serviced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Queue,
    Direct,
    Ivr,
    Conference,
    Other,
}

impl CallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::Queue => "queue",
            CallType::Direct => "direct",
            CallType::Ivr => "ivr",
            CallType::Conference => "conference",
            CallType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queue" => Some(CallType::Queue),
            "direct" => Some(CallType::Direct),
            "ivr" => Some(CallType::Ivr),
            "conference" => Some(CallType::Conference),
            "other" => Some(CallType::Other),
            _ => None,
        }
    }
}

/// The final, queryable record of one call.
///
/// `direction` and `call_type` are `Option` until enrichment has run; the
/// worker guarantees both are set before the record is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cdr {
    pub id: i64,
    pub uuid: String,

    // Participants
    pub caller_id_number: String,
    pub caller_id_name: String,
    pub destination_number: String,

    // Context
    pub context: String,
    pub extension: String,
    pub domain: String,

    // Timing
    pub start_stamp: DateTime<Utc>,
    pub answer_stamp: Option<DateTime<Utc>>,
    pub end_stamp: DateTime<Utc>,
    /// Total seconds, end - start.
    pub duration: i32,
    /// Billable seconds after answer; 0 for unanswered calls.
    pub billsec: i32,
    pub holdsec: i32,

    // Result
    pub hangup_cause: String,
    pub hangup_cause_q850: Option<i32>,
    pub sip_hangup_disposition: Option<String>,

    // Classification
    pub direction: Option<CallDirection>,
    pub call_type: Option<CallType>,

    // Queue specifics
    pub queue_id: Option<i64>,
    pub queue_wait_time: Option<i32>,
    pub agent_extension: Option<String>,

    // Recording
    pub record_file: Option<String>,
    pub record_duration: Option<i32>,

    // SIP identity
    pub sip_from_user: Option<String>,
    pub sip_to_user: Option<String>,
    pub sip_call_id: Option<String>,
    pub user_agent: Option<String>,

    // Media
    pub read_codec: Option<String>,
    pub write_codec: Option<String>,
    pub remote_media_ip: Option<String>,

    // RTP quality
    pub rtp_audio_in_mos: Option<f64>,
    pub rtp_audio_in_packet_count: Option<i32>,
    pub rtp_audio_in_packet_loss: Option<i32>,
    pub rtp_audio_in_jitter_min: Option<i32>,
    pub rtp_audio_in_jitter_max: Option<i32>,

    pub created_at: DateTime<Utc>,
}

/// Filters and pagination for the CDR admin listing.
#[derive(Debug, Clone)]
pub struct CdrListRequest {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub caller_id_number: Option<String>,
    pub destination_number: Option<String>,
    pub direction: Option<CallDirection>,
    pub hangup_cause: Option<String>,
    pub queue_id: Option<i64>,
    pub min_duration: Option<i32>,
    pub page: i64,
    pub per_page: i64,
}

impl Default for CdrListRequest {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            caller_id_number: None,
            destination_number: None,
            direction: None,
            hangup_cause: None,
            queue_id: None,
            min_duration: None,
            page: 1,
            per_page: 50,
        }
    }
}

/// Aggregate statistics over a date range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdrStats {
    pub total_calls: i64,
    pub answered_calls: i64,
    pub missed_calls: i64,
    pub average_duration: f64,
    pub average_billsec: f64,
    pub total_duration: i64,
    pub total_billsec: i64,
}

/// CDR repository contract (pool-scoped operations).
///
/// The worker's transactional lease/mark/insert cycle is implemented
/// directly on the PostgreSQL repository, because it has to share one
/// connection across the batch.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CdrRepository: Send + Sync {
    /// Stage raw CDR XML keyed by call UUID; duplicate UUIDs are a no-op.
    async fn enqueue_raw(&self, uuid: &str, xml: &str) -> Result<()>;

    async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Cdr>>;

    /// Filtered, paginated listing; returns the page plus the total count.
    async fn list(&self, req: CdrListRequest) -> Result<(Vec<Cdr>, i64)>;

    async fn stats(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<CdrStats>;

    /// Delete processed staging rows older than the retention window.
    /// Returns the number of rows removed. Unprocessed and retry-capped
    /// rows are never touched.
    async fn cleanup_staging(&self, retention_days: i32) -> Result<u64>;
}
