//! Background CDR workers
//!
//! `CdrProcessor` drains the staging table: each tick leases a batch with
//! `FOR UPDATE SKIP LOCKED`, drives parse -> enrich -> insert for every
//! row, and marks the per-row outcome on the same transaction. Multiple
//! service instances can drain one table without coordination.
//!
//! `CleanupWorker` deletes processed staging rows past the retention
//! window. Failed rows are kept until an operator acts.

use super::cdr_enricher::CdrEnricher;
use super::cdr_parser::parse_cdr_xml;
use crate::config::CdrConfig;
use crate::domain::cdr::CdrQueueEntry;
use crate::domain::cdr::CdrRepository;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::infrastructure::persistence::PgCdrRepository;
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub struct CdrProcessor {
    pool: PgPool,
    enricher: CdrEnricher,
    batch_size: i64,
    interval: Duration,
}

impl CdrProcessor {
    pub fn new(pool: PgPool, enricher: CdrEnricher, config: &CdrConfig) -> Self {
        Self {
            pool,
            enricher,
            batch_size: config.batch_size,
            interval: config.processing_interval(),
        }
    }

    /// Tick until shutdown. An in-flight batch always completes before the
    /// worker acknowledges the stop.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            batch_size = self.batch_size,
            interval_secs = self.interval.as_secs(),
            "cdr processor started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.process_batch().await {
                        error!("cdr batch failed: {}", e);
                    }
                }
                _ = shutdown.changed() => {
                    info!("cdr processor shutting down");
                    return;
                }
            }
        }
    }

    /// Lease and drive one batch. Row failures are isolated: a bad row is
    /// marked and the rest of the batch continues.
    async fn process_batch(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let entries = PgCdrRepository::lease_pending(&mut *tx, self.batch_size).await?;
        if entries.is_empty() {
            return Ok(());
        }

        debug!("processing {} staged cdrs", entries.len());

        let mut succeeded = 0usize;
        let mut failed = 0usize;

        for entry in &entries {
            match self.process_one(&mut *tx, entry).await {
                Ok(()) => {
                    PgCdrRepository::mark_processed(&mut *tx, entry.id).await?;
                    succeeded += 1;
                }
                Err(e) => {
                    warn!("failed to process cdr {} (id={}): {}", entry.uuid, entry.id, e);
                    PgCdrRepository::mark_failed(&mut *tx, entry.id, &e.to_string()).await?;
                    failed += 1;
                }
            }
        }

        tx.commit().await?;

        info!(succeeded, failed, "cdr batch complete");
        Ok(())
    }

    async fn process_one(&self, conn: &mut PgConnection, entry: &CdrQueueEntry) -> Result<()> {
        let mut cdr = parse_cdr_xml(&entry.xml_data)?;

        if cdr.uuid != entry.uuid {
            return Err(DomainError::Parse(format!(
                "uuid mismatch: staged={}, parsed={}",
                entry.uuid, cdr.uuid
            )));
        }

        // Enrichment never blocks persistence; it logs and continues.
        self.enricher.enrich(&mut cdr).await;

        let inserted = PgCdrRepository::insert_final(conn, &cdr).await?;
        if inserted {
            debug!(
                "processed cdr {} (caller={}, dest={}, duration={}s)",
                cdr.uuid, cdr.caller_id_number, cdr.destination_number, cdr.duration
            );
        } else {
            debug!("cdr {} already persisted, skipping duplicate", cdr.uuid);
        }

        Ok(())
    }
}

pub struct CleanupWorker {
    cdrs: Arc<dyn CdrRepository>,
    interval: Duration,
    retention_days: i32,
}

impl CleanupWorker {
    pub fn new(cdrs: Arc<dyn CdrRepository>, config: &CdrConfig) -> Self {
        Self {
            cdrs,
            interval: config.cleanup_interval(),
            retention_days: config.retention_days,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            retention_days = self.retention_days,
            "cdr cleanup worker started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.cdrs.cleanup_staging(self.retention_days).await {
                        Ok(0) => {}
                        Ok(deleted) => info!(deleted, "removed old staged cdrs"),
                        Err(e) => error!("cdr cleanup failed: {}", e),
                    }
                }
                _ = shutdown.changed() => {
                    info!("cdr cleanup worker shutting down");
                    return;
                }
            }
        }
    }
}
