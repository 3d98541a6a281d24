//! PostgreSQL implementation of the extension repository

use crate::domain::extension::{
    Extension, ExtensionFilter, ExtensionRepository, ExtensionType, ExtensionUpdate, NewExtension,
    SipDomain,
};
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::{debug, error};

const EXTENSION_COLUMNS: &str = r#"
    e.id, e.domain_id, e.extension, e.type, e.display_name,
    e.email, e.sip_password, e.sip_ha1, e.sip_ha1b,
    e.vm_password, e.vm_email, e.active, e.max_concurrent,
    e.call_timeout, e.created_at, e.updated_at,
    d.domain
"#;

#[derive(FromRow)]
struct ExtensionRow {
    id: i64,
    domain_id: i64,
    extension: String,
    #[sqlx(rename = "type")]
    ext_type: String,
    display_name: String,
    email: Option<String>,
    sip_password: String,
    sip_ha1: String,
    sip_ha1b: String,
    vm_password: Option<String>,
    vm_email: Option<String>,
    active: bool,
    max_concurrent: i32,
    call_timeout: i32,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    domain: String,
}

impl From<ExtensionRow> for Extension {
    fn from(r: ExtensionRow) -> Self {
        Extension {
            id: r.id,
            domain_id: r.domain_id,
            extension: r.extension,
            ext_type: ExtensionType::parse(&r.ext_type).unwrap_or(ExtensionType::User),
            display_name: r.display_name,
            email: r.email,
            sip_password: r.sip_password,
            sip_ha1: r.sip_ha1,
            sip_ha1b: r.sip_ha1b,
            vm_password: r.vm_password,
            vm_email: r.vm_email,
            active: r.active,
            max_concurrent: r.max_concurrent,
            call_timeout: r.call_timeout,
            created_at: r.created_at,
            updated_at: r.updated_at,
            domain: r.domain,
        }
    }
}

#[derive(FromRow)]
struct DomainRow {
    id: i64,
    domain: String,
    active: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<DomainRow> for SipDomain {
    fn from(r: DomainRow) -> Self {
        SipDomain {
            id: r.id,
            domain: r.domain,
            active: r.active,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

pub struct PgExtensionRepository {
    pool: PgPool,
}

impl PgExtensionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ExtensionFilter) {
        let mut sep = " WHERE ";
        if let Some(domain_id) = filter.domain_id {
            qb.push(sep).push("e.domain_id = ").push_bind(domain_id);
            sep = " AND ";
        }
        if let Some(ext_type) = filter.ext_type {
            qb.push(sep).push("e.type = ").push_bind(ext_type.as_str());
            sep = " AND ";
        }
        if let Some(active) = filter.active {
            qb.push(sep).push("e.active = ").push_bind(active);
        }
    }
}

#[async_trait]
impl ExtensionRepository for PgExtensionRepository {
    async fn get(&self, extension: &str, domain: &str) -> Result<Option<Extension>> {
        debug!("looking up extension {}@{}", extension, domain);

        let row: Option<ExtensionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {EXTENSION_COLUMNS}
            FROM voip.extensions e
            INNER JOIN voip.domains d ON e.domain_id = d.id
            WHERE e.extension = $1 AND d.domain = $2
            "#
        ))
        .bind(extension)
        .bind(domain)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to query extension {}@{}: {}", extension, domain, e);
            DomainError::from(e)
        })?;

        Ok(row.map(Into::into))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Extension>> {
        let row: Option<ExtensionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {EXTENSION_COLUMNS}
            FROM voip.extensions e
            INNER JOIN voip.domains d ON e.domain_id = d.id
            WHERE e.id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list(
        &self,
        filter: ExtensionFilter,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<Extension>, i64)> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM voip.extensions e");
        Self::push_filters(&mut count_qb, &filter);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::new(format!(
            r#"
            SELECT {EXTENSION_COLUMNS}
            FROM voip.extensions e
            INNER JOIN voip.domains d ON e.domain_id = d.id
            "#
        ));
        Self::push_filters(&mut qb, &filter);
        qb.push(" ORDER BY e.extension LIMIT ")
            .push_bind(per_page)
            .push(" OFFSET ")
            .push_bind((page - 1) * per_page);

        let rows: Vec<ExtensionRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    async fn create(&self, data: NewExtension) -> Result<Extension> {
        debug!(
            "creating extension {} (domain_id={})",
            data.extension, data.domain_id
        );

        // HA1 digests are filled in by the database trigger on insert.
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO voip.extensions (
                domain_id, extension, type, display_name, email,
                sip_password, vm_password, vm_email, active,
                max_concurrent, call_timeout
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(data.domain_id)
        .bind(&data.extension)
        .bind(data.ext_type.as_str())
        .bind(&data.display_name)
        .bind(&data.email)
        .bind(&data.sip_password)
        .bind(&data.vm_password)
        .bind(&data.vm_email)
        .bind(data.active)
        .bind(data.max_concurrent)
        .bind(data.call_timeout)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to insert extension {}: {}", data.extension, e);
            DomainError::from(e)
        })?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DomainError::Internal(format!("extension {} vanished after insert", id)))
    }

    async fn update(&self, id: i64, data: ExtensionUpdate) -> Result<Extension> {
        let ExtensionUpdate {
            display_name,
            email,
            vm_password,
            vm_email,
            active,
            max_concurrent,
            call_timeout,
        } = data;

        let no_changes = display_name.is_none()
            && email.is_none()
            && vm_password.is_none()
            && vm_email.is_none()
            && active.is_none()
            && max_concurrent.is_none()
            && call_timeout.is_none();
        if no_changes {
            return self
                .get_by_id(id)
                .await?
                .ok_or_else(|| DomainError::NotFound(format!("extension {}", id)));
        }

        let mut qb = QueryBuilder::new("UPDATE voip.extensions SET ");
        let mut set = qb.separated(", ");
        if let Some(v) = display_name {
            set.push("display_name = ").push_bind_unseparated(v);
        }
        if let Some(v) = email {
            set.push("email = ").push_bind_unseparated(v);
        }
        if let Some(v) = vm_password {
            set.push("vm_password = ").push_bind_unseparated(v);
        }
        if let Some(v) = vm_email {
            set.push("vm_email = ").push_bind_unseparated(v);
        }
        if let Some(v) = active {
            set.push("active = ").push_bind_unseparated(v);
        }
        if let Some(v) = max_concurrent {
            set.push("max_concurrent = ").push_bind_unseparated(v);
        }
        if let Some(v) = call_timeout {
            set.push("call_timeout = ").push_bind_unseparated(v);
        }
        set.push("updated_at = now()");
        qb.push(" WHERE id = ").push_bind(id);

        let result = qb.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("extension {}", id)));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("extension {}", id)))
    }

    async fn update_password(&self, id: i64, password: &str) -> Result<()> {
        // Digest trigger recalculates HA1/HA1B on this write.
        let result = sqlx::query(
            "UPDATE voip.extensions SET sip_password = $1, updated_at = now() WHERE id = $2",
        )
        .bind(password)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("extension {}", id)));
        }
        Ok(())
    }

    async fn deactivate(&self, id: i64) -> Result<()> {
        let result =
            sqlx::query("UPDATE voip.extensions SET active = false, updated_at = now() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("extension {}", id)));
        }
        Ok(())
    }

    async fn get_domain(&self, id: i64) -> Result<Option<SipDomain>> {
        let row: Option<DomainRow> = sqlx::query_as(
            "SELECT id, domain, active, created_at, updated_at FROM voip.domains WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }
}
