//! Softswitch CDR XML decoding
//!
//! The switch posts one XML document per finished call. Everything we care
//! about lives in the `<variables>` block; unknown elements are ignored.
//! Values are taken verbatim, the way the switch URL-encodes them.

use crate::domain::cdr::{CallDirection, CallType, Cdr};
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct RawCdr {
    #[serde(default)]
    variables: RawVariables,
}

/// The subset of CDR variables this service persists. The switch emits
/// many more; serde skips what we do not name.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawVariables {
    uuid: Option<String>,
    direction: Option<String>,

    caller_id_number: Option<String>,
    caller_id_name: Option<String>,
    destination_number: Option<String>,
    dialed_user: Option<String>,
    dialed_domain: Option<String>,

    context: Option<String>,
    domain_name: Option<String>,

    start_epoch: Option<String>,
    answer_epoch: Option<String>,
    end_epoch: Option<String>,
    duration: Option<String>,
    billsec: Option<String>,
    holdsec: Option<String>,

    hangup_cause: Option<String>,
    hangup_cause_q850: Option<String>,
    sip_hangup_disposition: Option<String>,

    sip_from_user: Option<String>,
    sip_to_user: Option<String>,
    sip_call_id: Option<String>,
    sip_user_agent: Option<String>,

    read_codec: Option<String>,
    write_codec: Option<String>,
    remote_media_ip: Option<String>,

    rtp_audio_in_mos: Option<String>,
    rtp_audio_in_packet_count: Option<String>,
    rtp_audio_in_skip_packet_count: Option<String>,
    rtp_audio_in_jitter_min_variance: Option<String>,
    rtp_audio_in_jitter_max_variance: Option<String>,

    recording_file: Option<String>,
    record_seconds: Option<String>,

    cc_queue: Option<String>,
    cc_queue_joined_epoch: Option<String>,
    cc_queue_answered_epoch: Option<String>,
    cc_agent: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn opt_string(value: &Option<String>) -> Option<String> {
    non_empty(value).map(str::to_string)
}

fn parse_i32(value: &Option<String>) -> Option<i32> {
    non_empty(value).and_then(|s| s.parse().ok())
}

fn parse_i64(value: &Option<String>) -> Option<i64> {
    non_empty(value).and_then(|s| s.parse().ok())
}

fn parse_f64(value: &Option<String>) -> Option<f64> {
    non_empty(value).and_then(|s| s.parse().ok())
}

fn epoch_to_utc(secs: i64, field: &str) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| DomainError::Parse(format!("{} out of range: {}", field, secs)))
}

/// Seed direction when the switch did not say. Four digits is a local
/// extension; long or `+`/`00`-prefixed numbers left the building.
fn seed_direction(destination: &str) -> CallDirection {
    if destination.len() == 4 {
        return CallDirection::Internal;
    }
    if destination.len() >= 10 || destination.starts_with('+') || destination.starts_with("00") {
        return CallDirection::Outbound;
    }
    CallDirection::Internal
}

/// Decode a softswitch CDR document into a `Cdr`.
///
/// Fails only on structural problems: undecodable XML, missing `uuid`,
/// missing or malformed `start_epoch` / `end_epoch`. Everything else is
/// optional and absent fields stay `None`.
pub fn parse_cdr_xml(xml: &str) -> Result<Cdr> {
    let raw: RawCdr = quick_xml::de::from_str(xml)
        .map_err(|e| DomainError::Parse(format!("unmarshal cdr xml: {}", e)))?;
    let vars = raw.variables;

    let uuid = non_empty(&vars.uuid)
        .ok_or_else(|| DomainError::Parse("missing uuid in cdr".to_string()))?
        .to_string();

    // Timing: start and end are required, answer is not (unanswered calls
    // report answer_epoch as "0" or omit it).
    let start_secs = parse_i64(&vars.start_epoch)
        .ok_or_else(|| DomainError::Parse("missing or invalid start_epoch".to_string()))?;
    let start_stamp = epoch_to_utc(start_secs, "start_epoch")?;

    let end_secs = parse_i64(&vars.end_epoch)
        .ok_or_else(|| DomainError::Parse("missing or invalid end_epoch".to_string()))?;
    let end_stamp = epoch_to_utc(end_secs, "end_epoch")?;

    let answer_stamp = match non_empty(&vars.answer_epoch) {
        Some("0") | None => None,
        Some(s) => s
            .parse::<i64>()
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
    };

    let duration =
        parse_i32(&vars.duration).unwrap_or_else(|| (end_secs - start_secs) as i32);
    let billsec = parse_i32(&vars.billsec).unwrap_or_else(|| {
        answer_stamp
            .map(|a| (end_stamp - a).num_seconds() as i32)
            .unwrap_or(0)
    });
    let holdsec = parse_i32(&vars.holdsec).unwrap_or(0);

    let destination_number = non_empty(&vars.destination_number)
        .unwrap_or_default()
        .to_string();

    let extension = non_empty(&vars.dialed_user)
        .or(non_empty(&vars.destination_number))
        .unwrap_or_default()
        .to_string();
    let domain = non_empty(&vars.domain_name)
        .or(non_empty(&vars.dialed_domain))
        .unwrap_or_default()
        .to_string();

    // Honour the switch's direction variable when it is definitive.
    let direction = match vars.direction.as_deref() {
        Some("inbound") => Some(CallDirection::Inbound),
        Some("outbound") => Some(CallDirection::Outbound),
        _ => Some(seed_direction(&destination_number)),
    };

    // Queue markers: presence of cc_queue classifies the call.
    let call_type = if non_empty(&vars.cc_queue).is_some() {
        Some(CallType::Queue)
    } else {
        Some(CallType::Direct)
    };

    let queue_wait_time = match (
        parse_i64(&vars.cc_queue_joined_epoch),
        parse_i64(&vars.cc_queue_answered_epoch),
    ) {
        (Some(joined), Some(answered)) => Some((answered - joined) as i32),
        _ => None,
    };

    let (record_file, record_duration) = match opt_string(&vars.recording_file) {
        Some(file) => {
            let secs = parse_i32(&vars.record_seconds);
            (Some(file), secs)
        }
        None => (None, None),
    };

    Ok(Cdr {
        id: 0,
        uuid,
        caller_id_number: non_empty(&vars.caller_id_number).unwrap_or_default().to_string(),
        caller_id_name: non_empty(&vars.caller_id_name).unwrap_or_default().to_string(),
        destination_number,
        context: non_empty(&vars.context).unwrap_or_default().to_string(),
        extension,
        domain,
        start_stamp,
        answer_stamp,
        end_stamp,
        duration,
        billsec,
        holdsec,
        hangup_cause: non_empty(&vars.hangup_cause).unwrap_or_default().to_string(),
        hangup_cause_q850: parse_i32(&vars.hangup_cause_q850),
        sip_hangup_disposition: opt_string(&vars.sip_hangup_disposition),
        direction,
        call_type,
        queue_id: None,
        queue_wait_time,
        agent_extension: opt_string(&vars.cc_agent),
        record_file,
        record_duration,
        sip_from_user: opt_string(&vars.sip_from_user),
        sip_to_user: opt_string(&vars.sip_to_user),
        sip_call_id: opt_string(&vars.sip_call_id),
        user_agent: opt_string(&vars.sip_user_agent),
        read_codec: opt_string(&vars.read_codec),
        write_codec: opt_string(&vars.write_codec),
        remote_media_ip: opt_string(&vars.remote_media_ip),
        rtp_audio_in_mos: parse_f64(&vars.rtp_audio_in_mos),
        rtp_audio_in_packet_count: parse_i32(&vars.rtp_audio_in_packet_count),
        rtp_audio_in_packet_loss: parse_i32(&vars.rtp_audio_in_skip_packet_count),
        rtp_audio_in_jitter_min: parse_i32(&vars.rtp_audio_in_jitter_min_variance),
        rtp_audio_in_jitter_max: parse_i32(&vars.rtp_audio_in_jitter_max_variance),
        created_at: Utc::now(),
    })
}
