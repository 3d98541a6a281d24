//! CDR pipeline integration tests
//!
//! These drive the staging -> parse -> enrich -> persist cycle against a
//! real PostgreSQL instance (DATABASE_URL). Each test uses its own UUIDs
//! so they can run in any order.

use chrono::{TimeZone, Utc};
use sqlx::PgPool;
use squawk::application::{parse_cdr_xml, CdrEnricher};
use squawk::domain::cdr::{CallType, CdrRepository};
use squawk::infrastructure::persistence::{
    run_migrations, PgCdrRepository, PgExtensionRepository, PgQueueRepository,
};
use std::sync::Arc;

async fn setup_database() -> PgPool {
    let url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://postgres@localhost/squawk_test".to_string());
    let pool = PgPool::connect(&url).await.expect("connect to database");
    run_migrations(&pool).await.expect("run migrations");
    pool
}

async fn seed_domain(pool: &PgPool, name: &str) -> i64 {
    sqlx::query_scalar(
        r#"
        INSERT INTO voip.domains (domain) VALUES ($1)
        ON CONFLICT (domain) DO UPDATE SET updated_at = now()
        RETURNING id
        "#,
    )
    .bind(name)
    .fetch_one(pool)
    .await
    .expect("seed domain")
}

async fn seed_queue(pool: &PgPool, domain_id: i64, extension: &str) -> i64 {
    sqlx::query_scalar(
        r#"
        INSERT INTO voip.queues (name, extension, domain_id)
        VALUES ('support', $1, $2)
        ON CONFLICT (domain_id, extension) DO UPDATE SET updated_at = now()
        RETURNING id
        "#,
    )
    .bind(extension)
    .bind(domain_id)
    .fetch_one(pool)
    .await
    .expect("seed queue")
}

async fn staging_row_count(pool: &PgPool, uuid: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM voip.cdr_queue WHERE uuid = $1")
        .bind(uuid)
        .fetch_one(pool)
        .await
        .expect("count staging rows")
}

async fn cleanup_uuid(pool: &PgPool, uuid: &str) {
    sqlx::query("DELETE FROM voip.cdr_queue WHERE uuid = $1")
        .bind(uuid)
        .execute(pool)
        .await
        .ok();
    sqlx::query("DELETE FROM voip.cdr WHERE uuid = $1")
        .bind(uuid)
        .execute(pool)
        .await
        .ok();
}

fn queue_cdr_xml(uuid: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<cdr>
  <variables>
    <uuid>{uuid}</uuid>
    <caller_id_number>1001</caller_id_number>
    <caller_id_name>Alice</caller_id_name>
    <destination_number>8000</destination_number>
    <context>default</context>
    <domain_name>pipeline.test</domain_name>
    <start_epoch>1700000000</start_epoch>
    <answer_epoch>1700000010</answer_epoch>
    <end_epoch>1700000060</end_epoch>
    <hangup_cause>NORMAL_CLEARING</hangup_cause>
    <sip_from_user>1001</sip_from_user>
    <sip_to_user>8000</sip_to_user>
    <sip_call_id>{uuid}@pipeline.test</sip_call_id>
    <read_codec>PCMU</read_codec>
    <write_codec>PCMU</write_codec>
    <rtp_audio_in_mos>4.20</rtp_audio_in_mos>
    <rtp_audio_in_packet_count>3000</rtp_audio_in_packet_count>
    <cc_queue>support</cc_queue>
    <cc_queue_joined_epoch>1700000000</cc_queue_joined_epoch>
    <cc_queue_answered_epoch>1700000010</cc_queue_answered_epoch>
    <cc_agent>1002</cc_agent>
  </variables>
</cdr>"#
    )
}

/// One worker tick: lease, drive each row, mark, commit.
async fn drain_staging(pool: &PgPool, enricher: &CdrEnricher, batch: i64) {
    let mut tx = pool.begin().await.expect("begin lease tx");
    let entries = PgCdrRepository::lease_pending(&mut *tx, batch)
        .await
        .expect("lease pending");

    for entry in &entries {
        let outcome = match parse_cdr_xml(&entry.xml_data) {
            Ok(mut cdr) => {
                enricher.enrich(&mut cdr).await;
                PgCdrRepository::insert_final(&mut *tx, &cdr)
                    .await
                    .map(|_| ())
            }
            Err(e) => Err(e),
        };
        match outcome {
            Ok(()) => PgCdrRepository::mark_processed(&mut *tx, entry.id)
                .await
                .expect("mark processed"),
            Err(e) => PgCdrRepository::mark_failed(&mut *tx, entry.id, &e.to_string())
                .await
                .expect("mark failed"),
        }
    }

    tx.commit().await.expect("commit lease tx");
}

fn enricher_for(pool: &PgPool) -> CdrEnricher {
    CdrEnricher::new(
        Arc::new(PgQueueRepository::new(pool.clone())),
        Arc::new(PgExtensionRepository::new(pool.clone())),
    )
}

#[tokio::test]
#[ignore] // Requires database
async fn test_ingest_is_idempotent_per_uuid() {
    let pool = setup_database().await;
    let repo = PgCdrRepository::new(pool.clone());
    let uuid = "pipeline-idem-0001";
    cleanup_uuid(&pool, uuid).await;

    let xml = queue_cdr_xml(uuid);
    for _ in 0..5 {
        repo.enqueue_raw(uuid, &xml).await.expect("enqueue");
    }

    assert_eq!(staging_row_count(&pool, uuid).await, 1);
    cleanup_uuid(&pool, uuid).await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_pipeline_round_trip() {
    let pool = setup_database().await;
    let repo = PgCdrRepository::new(pool.clone());
    let domain_id = seed_domain(&pool, "pipeline.test").await;
    let queue_id = seed_queue(&pool, domain_id, "8000").await;

    let uuid = "pipeline-roundtrip-0001";
    cleanup_uuid(&pool, uuid).await;
    repo.enqueue_raw(uuid, &queue_cdr_xml(uuid)).await.expect("enqueue");

    drain_staging(&pool, &enricher_for(&pool), 100).await;

    let cdr = repo
        .get_by_uuid(uuid)
        .await
        .expect("query cdr")
        .expect("cdr persisted");

    assert_eq!(cdr.duration, 60);
    assert_eq!(cdr.billsec, 50);
    assert_eq!(cdr.call_type, Some(CallType::Queue));
    assert_eq!(cdr.queue_wait_time, Some(10));
    assert_eq!(cdr.queue_id, Some(queue_id));
    assert_eq!(cdr.agent_extension.as_deref(), Some("1002"));
    assert_eq!(cdr.sip_from_user.as_deref(), Some("1001"));
    assert_eq!(cdr.read_codec.as_deref(), Some("PCMU"));
    assert_eq!(cdr.rtp_audio_in_mos, Some(4.2));
    assert_eq!(
        cdr.start_stamp,
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    );
    assert_eq!(cdr.end_stamp, Utc.timestamp_opt(1_700_000_060, 0).unwrap());

    // The staging row is marked processed
    let processed: Option<chrono::DateTime<Utc>> =
        sqlx::query_scalar("SELECT processed_at FROM voip.cdr_queue WHERE uuid = $1")
            .bind(uuid)
            .fetch_one(&pool)
            .await
            .expect("read staging row");
    assert!(processed.is_some());

    cleanup_uuid(&pool, uuid).await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_duplicate_drain_leaves_one_final_row() {
    let pool = setup_database().await;
    let repo = PgCdrRepository::new(pool.clone());
    seed_domain(&pool, "pipeline.test").await;

    let uuid = "pipeline-dup-0001";
    cleanup_uuid(&pool, uuid).await;

    for _ in 0..5 {
        repo.enqueue_raw(uuid, &queue_cdr_xml(uuid)).await.expect("enqueue");
    }
    let enricher = enricher_for(&pool);
    drain_staging(&pool, &enricher, 100).await;
    drain_staging(&pool, &enricher, 100).await;

    let final_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM voip.cdr WHERE uuid = $1")
        .bind(uuid)
        .fetch_one(&pool)
        .await
        .expect("count final rows");
    assert_eq!(final_count, 1);
    assert_eq!(staging_row_count(&pool, uuid).await, 1);

    cleanup_uuid(&pool, uuid).await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_unparseable_cdr_retries_then_stops() {
    let pool = setup_database().await;
    let repo = PgCdrRepository::new(pool.clone());

    let uuid = "pipeline-broken-0001";
    cleanup_uuid(&pool, uuid).await;
    repo.enqueue_raw(uuid, "<cdr><variables></variables></cdr>")
        .await
        .expect("enqueue");

    let enricher = enricher_for(&pool);
    for _ in 0..4 {
        drain_staging(&pool, &enricher, 100).await;
    }

    let (retry_count, error_message): (i32, Option<String>) = sqlx::query_as(
        "SELECT retry_count, error_message FROM voip.cdr_queue WHERE uuid = $1",
    )
    .bind(uuid)
    .fetch_one(&pool)
    .await
    .expect("read staging row");

    // Three attempts, then the row becomes invisible to the lease query
    assert_eq!(retry_count, 3);
    assert!(error_message.unwrap_or_default().contains("uuid"));

    let mut tx = pool.begin().await.expect("begin");
    let leased = PgCdrRepository::lease_pending(&mut *tx, 100)
        .await
        .expect("lease");
    assert!(leased.iter().all(|e| e.uuid != uuid));
    tx.rollback().await.ok();

    cleanup_uuid(&pool, uuid).await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_concurrent_leases_take_disjoint_rows() {
    let pool = setup_database().await;
    let repo = PgCdrRepository::new(pool.clone());

    let uuids = [
        "pipeline-lease-0001",
        "pipeline-lease-0002",
        "pipeline-lease-0003",
        "pipeline-lease-0004",
    ];
    for uuid in &uuids {
        cleanup_uuid(&pool, uuid).await;
        repo.enqueue_raw(uuid, &queue_cdr_xml(uuid)).await.expect("enqueue");
    }

    // Two workers lease concurrently: SKIP LOCKED must hand out disjoint sets
    let mut tx_a = pool.begin().await.expect("begin a");
    let mut tx_b = pool.begin().await.expect("begin b");

    let leased_a = PgCdrRepository::lease_pending(&mut *tx_a, 2)
        .await
        .expect("lease a");
    let leased_b = PgCdrRepository::lease_pending(&mut *tx_b, 2)
        .await
        .expect("lease b");

    for a in &leased_a {
        assert!(
            leased_b.iter().all(|b| b.id != a.id),
            "row {} leased by both workers",
            a.id
        );
    }

    tx_a.rollback().await.ok();
    tx_b.rollback().await.ok();
    for uuid in &uuids {
        cleanup_uuid(&pool, uuid).await;
    }
}

#[tokio::test]
#[ignore] // Requires database
async fn test_staging_janitor_spares_unprocessed_rows() {
    let pool = setup_database().await;
    let repo = PgCdrRepository::new(pool.clone());

    let processed_uuid = "pipeline-janitor-done";
    let pending_uuid = "pipeline-janitor-pending";
    for uuid in [processed_uuid, pending_uuid] {
        cleanup_uuid(&pool, uuid).await;
        repo.enqueue_raw(uuid, &queue_cdr_xml(uuid)).await.expect("enqueue");
    }

    // Age one processed row past the retention window
    sqlx::query(
        "UPDATE voip.cdr_queue SET processed_at = now() - INTERVAL '30 days' WHERE uuid = $1",
    )
    .bind(processed_uuid)
    .execute(&pool)
    .await
    .expect("age row");

    let deleted = repo.cleanup_staging(7).await.expect("cleanup");
    assert!(deleted >= 1);

    assert_eq!(staging_row_count(&pool, processed_uuid).await, 0);
    // Unprocessed rows are never touched
    assert_eq!(staging_row_count(&pool, pending_uuid).await, 1);

    cleanup_uuid(&pool, pending_uuid).await;
}
