//! PostgreSQL implementation of the CDR repository
//!
//! Pool-scoped operations implement the `CdrRepository` trait. The worker's
//! lease/mark/insert cycle lives here as connection-scoped functions: the
//! `FOR UPDATE SKIP LOCKED` lease only protects rows while its transaction
//! is open, so every statement of a batch must run on that one connection.

use crate::domain::cdr::{
    CallDirection, CallType, Cdr, CdrListRequest, CdrQueueEntry, CdrRepository, CdrStats,
    MAX_CDR_RETRIES,
};
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::{debug, error};

const CDR_COLUMNS: &str = r#"
    id, uuid, caller_id_number, caller_id_name, destination_number,
    context, extension, domain, start_stamp, answer_stamp, end_stamp,
    duration, billsec, holdsec, hangup_cause, hangup_cause_q850,
    sip_hangup_disposition, direction, call_type, queue_id,
    queue_wait_time, agent_extension, record_file, record_duration,
    sip_from_user, sip_to_user, sip_call_id, user_agent,
    read_codec, write_codec, remote_media_ip,
    rtp_audio_in_mos, rtp_audio_in_packet_count, rtp_audio_in_packet_loss,
    rtp_audio_in_jitter_min, rtp_audio_in_jitter_max, created_at
"#;

#[derive(FromRow)]
struct CdrRow {
    id: i64,
    uuid: String,
    caller_id_number: String,
    caller_id_name: String,
    destination_number: String,
    context: String,
    extension: String,
    domain: String,
    start_stamp: DateTime<Utc>,
    answer_stamp: Option<DateTime<Utc>>,
    end_stamp: DateTime<Utc>,
    duration: i32,
    billsec: i32,
    holdsec: i32,
    hangup_cause: String,
    hangup_cause_q850: Option<i32>,
    sip_hangup_disposition: Option<String>,
    direction: String,
    call_type: String,
    queue_id: Option<i64>,
    queue_wait_time: Option<i32>,
    agent_extension: Option<String>,
    record_file: Option<String>,
    record_duration: Option<i32>,
    sip_from_user: Option<String>,
    sip_to_user: Option<String>,
    sip_call_id: Option<String>,
    user_agent: Option<String>,
    read_codec: Option<String>,
    write_codec: Option<String>,
    remote_media_ip: Option<String>,
    rtp_audio_in_mos: Option<f64>,
    rtp_audio_in_packet_count: Option<i32>,
    rtp_audio_in_packet_loss: Option<i32>,
    rtp_audio_in_jitter_min: Option<i32>,
    rtp_audio_in_jitter_max: Option<i32>,
    created_at: DateTime<Utc>,
}

impl From<CdrRow> for Cdr {
    fn from(r: CdrRow) -> Self {
        Cdr {
            id: r.id,
            uuid: r.uuid,
            caller_id_number: r.caller_id_number,
            caller_id_name: r.caller_id_name,
            destination_number: r.destination_number,
            context: r.context,
            extension: r.extension,
            domain: r.domain,
            start_stamp: r.start_stamp,
            answer_stamp: r.answer_stamp,
            end_stamp: r.end_stamp,
            duration: r.duration,
            billsec: r.billsec,
            holdsec: r.holdsec,
            hangup_cause: r.hangup_cause,
            hangup_cause_q850: r.hangup_cause_q850,
            sip_hangup_disposition: r.sip_hangup_disposition,
            direction: CallDirection::parse(&r.direction),
            call_type: CallType::parse(&r.call_type),
            queue_id: r.queue_id,
            queue_wait_time: r.queue_wait_time,
            agent_extension: r.agent_extension,
            record_file: r.record_file,
            record_duration: r.record_duration,
            sip_from_user: r.sip_from_user,
            sip_to_user: r.sip_to_user,
            sip_call_id: r.sip_call_id,
            user_agent: r.user_agent,
            read_codec: r.read_codec,
            write_codec: r.write_codec,
            remote_media_ip: r.remote_media_ip,
            rtp_audio_in_mos: r.rtp_audio_in_mos,
            rtp_audio_in_packet_count: r.rtp_audio_in_packet_count,
            rtp_audio_in_packet_loss: r.rtp_audio_in_packet_loss,
            rtp_audio_in_jitter_min: r.rtp_audio_in_jitter_min,
            rtp_audio_in_jitter_max: r.rtp_audio_in_jitter_max,
            created_at: r.created_at,
        }
    }
}

#[derive(FromRow)]
struct CdrQueueRow {
    id: i64,
    uuid: String,
    xml_data: String,
    received_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    retry_count: i32,
    error_message: Option<String>,
}

impl From<CdrQueueRow> for CdrQueueEntry {
    fn from(r: CdrQueueRow) -> Self {
        CdrQueueEntry {
            id: r.id,
            uuid: r.uuid,
            xml_data: r.xml_data,
            received_at: r.received_at,
            processed_at: r.processed_at,
            retry_count: r.retry_count,
            error_message: r.error_message,
        }
    }
}

#[derive(FromRow)]
struct StatsRow {
    total_calls: i64,
    answered_calls: i64,
    missed_calls: i64,
    average_duration: f64,
    average_billsec: f64,
    total_duration: i64,
    total_billsec: i64,
}

pub struct PgCdrRepository {
    pool: PgPool,
}

impl PgCdrRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, req: &CdrListRequest) {
        let mut sep = " WHERE ";
        if let Some(start) = req.start_date {
            qb.push(sep).push("start_stamp >= ").push_bind(start);
            sep = " AND ";
        }
        if let Some(end) = req.end_date {
            qb.push(sep).push("start_stamp <= ").push_bind(end);
            sep = " AND ";
        }
        if let Some(ref caller) = req.caller_id_number {
            qb.push(sep)
                .push("caller_id_number LIKE ")
                .push_bind(format!("%{}%", caller));
            sep = " AND ";
        }
        if let Some(ref dest) = req.destination_number {
            qb.push(sep)
                .push("destination_number LIKE ")
                .push_bind(format!("%{}%", dest));
            sep = " AND ";
        }
        if let Some(direction) = req.direction {
            qb.push(sep).push("direction = ").push_bind(direction.as_str());
            sep = " AND ";
        }
        if let Some(ref cause) = req.hangup_cause {
            qb.push(sep).push("hangup_cause = ").push_bind(cause.clone());
            sep = " AND ";
        }
        if let Some(queue_id) = req.queue_id {
            qb.push(sep).push("queue_id = ").push_bind(queue_id);
            sep = " AND ";
        }
        if let Some(min) = req.min_duration {
            qb.push(sep).push("duration >= ").push_bind(min);
        }
    }

    /// Lease up to `limit` pending staging rows. Leased rows stay locked
    /// until the caller commits, so a second worker running the same query
    /// concurrently skips them and takes a disjoint set.
    pub async fn lease_pending(conn: &mut PgConnection, limit: i64) -> Result<Vec<CdrQueueEntry>> {
        let rows: Vec<CdrQueueRow> = sqlx::query_as(
            r#"
            SELECT id, uuid, xml_data, received_at, processed_at, retry_count, error_message
            FROM voip.cdr_queue
            WHERE processed_at IS NULL
              AND retry_count < $1
            ORDER BY received_at
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(MAX_CDR_RETRIES)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn mark_processed(conn: &mut PgConnection, id: i64) -> Result<()> {
        let result = sqlx::query("UPDATE voip.cdr_queue SET processed_at = now() WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("cdr queue entry {}", id)));
        }
        Ok(())
    }

    pub async fn mark_failed(conn: &mut PgConnection, id: i64, message: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE voip.cdr_queue SET retry_count = retry_count + 1, error_message = $1 WHERE id = $2",
        )
        .bind(message)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("cdr queue entry {}", id)));
        }
        Ok(())
    }

    /// Insert a processed CDR. Returns `false` when a record with the same
    /// UUID already exists; that is a successful no-op, not an error.
    pub async fn insert_final(conn: &mut PgConnection, cdr: &Cdr) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO voip.cdr (
                uuid, caller_id_number, caller_id_name, destination_number,
                context, extension, domain, start_stamp, answer_stamp, end_stamp,
                duration, billsec, holdsec, hangup_cause, hangup_cause_q850,
                sip_hangup_disposition, direction, call_type, queue_id,
                queue_wait_time, agent_extension, record_file, record_duration,
                sip_from_user, sip_to_user, sip_call_id, user_agent,
                read_codec, write_codec, remote_media_ip,
                rtp_audio_in_mos, rtp_audio_in_packet_count, rtp_audio_in_packet_loss,
                rtp_audio_in_jitter_min, rtp_audio_in_jitter_max
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, $20,
                $21, $22, $23, $24, $25, $26, $27, $28, $29, $30,
                $31, $32, $33, $34, $35
            )
            ON CONFLICT (uuid) DO NOTHING
            "#,
        )
        .bind(&cdr.uuid)
        .bind(&cdr.caller_id_number)
        .bind(&cdr.caller_id_name)
        .bind(&cdr.destination_number)
        .bind(&cdr.context)
        .bind(&cdr.extension)
        .bind(&cdr.domain)
        .bind(cdr.start_stamp)
        .bind(cdr.answer_stamp)
        .bind(cdr.end_stamp)
        .bind(cdr.duration)
        .bind(cdr.billsec)
        .bind(cdr.holdsec)
        .bind(&cdr.hangup_cause)
        .bind(cdr.hangup_cause_q850)
        .bind(&cdr.sip_hangup_disposition)
        .bind(cdr.direction.unwrap_or(CallDirection::Internal).as_str())
        .bind(cdr.call_type.unwrap_or(CallType::Direct).as_str())
        .bind(cdr.queue_id)
        .bind(cdr.queue_wait_time)
        .bind(&cdr.agent_extension)
        .bind(&cdr.record_file)
        .bind(cdr.record_duration)
        .bind(&cdr.sip_from_user)
        .bind(&cdr.sip_to_user)
        .bind(&cdr.sip_call_id)
        .bind(&cdr.user_agent)
        .bind(&cdr.read_codec)
        .bind(&cdr.write_codec)
        .bind(&cdr.remote_media_ip)
        .bind(cdr.rtp_audio_in_mos)
        .bind(cdr.rtp_audio_in_packet_count)
        .bind(cdr.rtp_audio_in_packet_loss)
        .bind(cdr.rtp_audio_in_jitter_min)
        .bind(cdr.rtp_audio_in_jitter_max)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            error!("failed to insert cdr {}: {}", cdr.uuid, e);
            DomainError::from(e)
        })?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CdrRepository for PgCdrRepository {
    async fn enqueue_raw(&self, uuid: &str, xml: &str) -> Result<()> {
        debug!("staging cdr {}", uuid);

        sqlx::query(
            r#"
            INSERT INTO voip.cdr_queue (uuid, xml_data)
            VALUES ($1, $2)
            ON CONFLICT (uuid) DO NOTHING
            "#,
        )
        .bind(uuid)
        .bind(xml)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to stage cdr {}: {}", uuid, e);
            DomainError::from(e)
        })?;

        Ok(())
    }

    async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Cdr>> {
        let row: Option<CdrRow> = sqlx::query_as(&format!(
            "SELECT {CDR_COLUMNS} FROM voip.cdr WHERE uuid = $1"
        ))
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list(&self, req: CdrListRequest) -> Result<(Vec<Cdr>, i64)> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM voip.cdr");
        Self::push_filters(&mut count_qb, &req);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb =
            QueryBuilder::new(format!("SELECT {CDR_COLUMNS} FROM voip.cdr"));
        Self::push_filters(&mut qb, &req);
        qb.push(" ORDER BY start_stamp DESC LIMIT ")
            .push_bind(req.per_page)
            .push(" OFFSET ")
            .push_bind((req.page - 1) * req.per_page);

        let rows: Vec<CdrRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    async fn stats(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<CdrStats> {
        let row: StatsRow = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS total_calls,
                COUNT(CASE WHEN answer_stamp IS NOT NULL THEN 1 END) AS answered_calls,
                COUNT(CASE WHEN answer_stamp IS NULL THEN 1 END) AS missed_calls,
                COALESCE(AVG(duration), 0)::double precision AS average_duration,
                COALESCE(AVG(billsec), 0)::double precision AS average_billsec,
                COALESCE(SUM(duration), 0)::bigint AS total_duration,
                COALESCE(SUM(billsec), 0)::bigint AS total_billsec
            FROM voip.cdr
            WHERE start_stamp >= $1 AND start_stamp <= $2
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(CdrStats {
            total_calls: row.total_calls,
            answered_calls: row.answered_calls,
            missed_calls: row.missed_calls,
            average_duration: row.average_duration,
            average_billsec: row.average_billsec,
            total_duration: row.total_duration,
            total_billsec: row.total_billsec,
        })
    }

    async fn cleanup_staging(&self, retention_days: i32) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM voip.cdr_queue
            WHERE processed_at IS NOT NULL
              AND processed_at < now() - INTERVAL '1 day' * $1
            "#,
        )
        .bind(retention_days)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
