//! PostgreSQL implementation of the queue repository

use crate::domain::queue::{
    NewQueue, NewQueueAgent, Queue, QueueAgent, QueueAgentUpdate, QueueRepository, QueueUpdate,
};
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::{debug, error};

const QUEUE_COLUMNS: &str = r#"
    q.id, q.name, q.extension, q.domain_id, q.strategy, q.moh,
    q.record_template, q.time_base_score, q.max_wait_time,
    q.max_wait_time_no_agent, q.tier_rules_apply, q.tier_rule_wait_second,
    q.discard_abandoned_after, q.abandoned_resume_allowed, q.active,
    q.created_at, q.updated_at, d.domain
"#;

const AGENT_COLUMNS: &str = r#"
    qa.id, qa.queue_id, qa.extension_id, qa.state, qa.status,
    qa.tier, qa.position, qa.active, qa.created_at, qa.updated_at,
    e.extension, e.display_name
"#;

#[derive(FromRow)]
struct QueueRow {
    id: i64,
    name: String,
    extension: String,
    domain_id: i64,
    strategy: String,
    moh: String,
    record_template: String,
    time_base_score: String,
    max_wait_time: i32,
    max_wait_time_no_agent: i32,
    tier_rules_apply: bool,
    tier_rule_wait_second: i32,
    discard_abandoned_after: i32,
    abandoned_resume_allowed: bool,
    active: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    domain: String,
}

impl From<QueueRow> for Queue {
    fn from(r: QueueRow) -> Self {
        Queue {
            id: r.id,
            name: r.name,
            extension: r.extension,
            domain_id: r.domain_id,
            strategy: r.strategy,
            moh: r.moh,
            record_template: r.record_template,
            time_base_score: r.time_base_score,
            max_wait_time: r.max_wait_time,
            max_wait_time_no_agent: r.max_wait_time_no_agent,
            tier_rules_apply: r.tier_rules_apply,
            tier_rule_wait_second: r.tier_rule_wait_second,
            discard_abandoned_after: r.discard_abandoned_after,
            abandoned_resume_allowed: r.abandoned_resume_allowed,
            active: r.active,
            created_at: r.created_at,
            updated_at: r.updated_at,
            domain: r.domain,
        }
    }
}

#[derive(FromRow)]
struct QueueAgentRow {
    id: i64,
    queue_id: i64,
    extension_id: i64,
    state: String,
    status: String,
    tier: i32,
    position: i32,
    active: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    extension: String,
    display_name: String,
}

impl From<QueueAgentRow> for QueueAgent {
    fn from(r: QueueAgentRow) -> Self {
        QueueAgent {
            id: r.id,
            queue_id: r.queue_id,
            extension_id: r.extension_id,
            state: r.state,
            status: r.status,
            tier: r.tier,
            position: r.position,
            active: r.active,
            created_at: r.created_at,
            updated_at: r.updated_at,
            extension: r.extension,
            display_name: r.display_name,
        }
    }
}

pub struct PgQueueRepository {
    pool: PgPool,
}

impl PgQueueRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueueRepository for PgQueueRepository {
    async fn get(&self, id: i64) -> Result<Option<Queue>> {
        let row: Option<QueueRow> = sqlx::query_as(&format!(
            r#"
            SELECT {QUEUE_COLUMNS}
            FROM voip.queues q
            INNER JOIN voip.domains d ON q.domain_id = d.id
            WHERE q.id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn get_by_extension(&self, extension: &str, domain: &str) -> Result<Option<Queue>> {
        debug!("looking up queue {}@{}", extension, domain);

        let row: Option<QueueRow> = sqlx::query_as(&format!(
            r#"
            SELECT {QUEUE_COLUMNS}
            FROM voip.queues q
            INNER JOIN voip.domains d ON q.domain_id = d.id
            WHERE q.extension = $1 AND d.domain = $2
            "#
        ))
        .bind(extension)
        .bind(domain)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to query queue {}@{}: {}", extension, domain, e);
            DomainError::from(e)
        })?;

        Ok(row.map(Into::into))
    }

    async fn list(&self, domain_id: Option<i64>, active: Option<bool>) -> Result<Vec<Queue>> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            r#"
            SELECT {QUEUE_COLUMNS}
            FROM voip.queues q
            INNER JOIN voip.domains d ON q.domain_id = d.id
            "#
        ));
        let mut sep = " WHERE ";
        if let Some(domain_id) = domain_id {
            qb.push(sep).push("q.domain_id = ").push_bind(domain_id);
            sep = " AND ";
        }
        if let Some(active) = active {
            qb.push(sep).push("q.active = ").push_bind(active);
        }
        qb.push(" ORDER BY q.name");

        let rows: Vec<QueueRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create(&self, data: NewQueue) -> Result<Queue> {
        debug!("creating queue {} ({})", data.name, data.extension);

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO voip.queues (
                name, extension, domain_id, strategy, moh, record_template,
                time_base_score, max_wait_time, max_wait_time_no_agent,
                tier_rules_apply, tier_rule_wait_second, discard_abandoned_after,
                abandoned_resume_allowed, active
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id
            "#,
        )
        .bind(&data.name)
        .bind(&data.extension)
        .bind(data.domain_id)
        .bind(&data.strategy)
        .bind(&data.moh)
        .bind(&data.record_template)
        .bind(&data.time_base_score)
        .bind(data.max_wait_time)
        .bind(data.max_wait_time_no_agent)
        .bind(data.tier_rules_apply)
        .bind(data.tier_rule_wait_second)
        .bind(data.discard_abandoned_after)
        .bind(data.abandoned_resume_allowed)
        .bind(data.active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to insert queue {}: {}", data.name, e);
            DomainError::from(e)
        })?;

        self.get(id)
            .await?
            .ok_or_else(|| DomainError::Internal(format!("queue {} vanished after insert", id)))
    }

    async fn update(&self, id: i64, data: QueueUpdate) -> Result<Queue> {
        let QueueUpdate {
            name,
            strategy,
            moh,
            record_template,
            time_base_score,
            max_wait_time,
            max_wait_time_no_agent,
            tier_rules_apply,
            tier_rule_wait_second,
            discard_abandoned_after,
            abandoned_resume_allowed,
            active,
        } = data;

        let no_changes = name.is_none()
            && strategy.is_none()
            && moh.is_none()
            && record_template.is_none()
            && time_base_score.is_none()
            && max_wait_time.is_none()
            && max_wait_time_no_agent.is_none()
            && tier_rules_apply.is_none()
            && tier_rule_wait_second.is_none()
            && discard_abandoned_after.is_none()
            && abandoned_resume_allowed.is_none()
            && active.is_none();
        if no_changes {
            return self
                .get(id)
                .await?
                .ok_or_else(|| DomainError::NotFound(format!("queue {}", id)));
        }

        let mut qb = QueryBuilder::new("UPDATE voip.queues SET ");
        let mut set = qb.separated(", ");
        if let Some(v) = name {
            set.push("name = ").push_bind_unseparated(v);
        }
        if let Some(v) = strategy {
            set.push("strategy = ").push_bind_unseparated(v);
        }
        if let Some(v) = moh {
            set.push("moh = ").push_bind_unseparated(v);
        }
        if let Some(v) = record_template {
            set.push("record_template = ").push_bind_unseparated(v);
        }
        if let Some(v) = time_base_score {
            set.push("time_base_score = ").push_bind_unseparated(v);
        }
        if let Some(v) = max_wait_time {
            set.push("max_wait_time = ").push_bind_unseparated(v);
        }
        if let Some(v) = max_wait_time_no_agent {
            set.push("max_wait_time_no_agent = ").push_bind_unseparated(v);
        }
        if let Some(v) = tier_rules_apply {
            set.push("tier_rules_apply = ").push_bind_unseparated(v);
        }
        if let Some(v) = tier_rule_wait_second {
            set.push("tier_rule_wait_second = ").push_bind_unseparated(v);
        }
        if let Some(v) = discard_abandoned_after {
            set.push("discard_abandoned_after = ").push_bind_unseparated(v);
        }
        if let Some(v) = abandoned_resume_allowed {
            set.push("abandoned_resume_allowed = ").push_bind_unseparated(v);
        }
        if let Some(v) = active {
            set.push("active = ").push_bind_unseparated(v);
        }
        set.push("updated_at = now()");
        qb.push(" WHERE id = ").push_bind(id);

        let result = qb.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("queue {}", id)));
        }

        self.get(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("queue {}", id)))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM voip.queues WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("queue {}", id)));
        }
        Ok(())
    }

    async fn get_agent(&self, id: i64) -> Result<Option<QueueAgent>> {
        let row: Option<QueueAgentRow> = sqlx::query_as(&format!(
            r#"
            SELECT {AGENT_COLUMNS}
            FROM voip.queue_agents qa
            INNER JOIN voip.extensions e ON qa.extension_id = e.id
            WHERE qa.id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_agents(&self, queue_id: i64, active: Option<bool>) -> Result<Vec<QueueAgent>> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            r#"
            SELECT {AGENT_COLUMNS}
            FROM voip.queue_agents qa
            INNER JOIN voip.extensions e ON qa.extension_id = e.id
            WHERE qa.queue_id =
            "#
        ));
        qb.push_bind(queue_id);
        if let Some(active) = active {
            qb.push(" AND qa.active = ").push_bind(active);
        }
        qb.push(" ORDER BY qa.tier, qa.position");

        let rows: Vec<QueueAgentRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn add_agent(&self, data: NewQueueAgent) -> Result<QueueAgent> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO voip.queue_agents (queue_id, extension_id, state, tier, position, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(data.queue_id)
        .bind(data.extension_id)
        .bind(&data.state)
        .bind(data.tier)
        .bind(data.position)
        .bind(data.active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "failed to add agent {} to queue {}: {}",
                data.extension_id, data.queue_id, e
            );
            DomainError::from(e)
        })?;

        self.get_agent(id)
            .await?
            .ok_or_else(|| DomainError::Internal(format!("queue agent {} vanished after insert", id)))
    }

    async fn update_agent(&self, id: i64, data: QueueAgentUpdate) -> Result<QueueAgent> {
        let QueueAgentUpdate {
            state,
            status,
            tier,
            position,
            active,
        } = data;

        let no_changes = state.is_none()
            && status.is_none()
            && tier.is_none()
            && position.is_none()
            && active.is_none();
        if no_changes {
            return self
                .get_agent(id)
                .await?
                .ok_or_else(|| DomainError::NotFound(format!("queue agent {}", id)));
        }

        let mut qb = QueryBuilder::new("UPDATE voip.queue_agents SET ");
        let mut set = qb.separated(", ");
        if let Some(v) = state {
            set.push("state = ").push_bind_unseparated(v);
        }
        if let Some(v) = status {
            set.push("status = ").push_bind_unseparated(v);
        }
        if let Some(v) = tier {
            set.push("tier = ").push_bind_unseparated(v);
        }
        if let Some(v) = position {
            set.push("position = ").push_bind_unseparated(v);
        }
        if let Some(v) = active {
            set.push("active = ").push_bind_unseparated(v);
        }
        set.push("updated_at = now()");
        qb.push(" WHERE id = ").push_bind(id);

        let result = qb.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("queue agent {}", id)));
        }

        self.get_agent(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("queue agent {}", id)))
    }

    async fn remove_agent(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM voip.queue_agents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("queue agent {}", id)));
        }
        Ok(())
    }
}
