//! Audit log repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use andes_core::{AuditLogId, UserId};

use super::RepositoryError;
use crate::models::{AuditEntry, Pagination};

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: i32,
    actor_id: Option<i32>,
    action: String,
    entity_type: String,
    entity_id: String,
    changes: serde_json::Value,
    ip_address: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<AuditRow> for AuditEntry {
    fn from(row: AuditRow) -> Self {
        Self {
            id: AuditLogId::new(row.id),
            actor_id: row.actor_id.map(UserId::new),
            action: row.action,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            changes: row.changes,
            ip_address: row.ip_address,
            created_at: row.created_at,
        }
    }
}

/// A row to append to the audit log.
#[derive(Debug, Clone)]
pub struct NewAuditEntry<'a> {
    pub actor_id: Option<UserId>,
    pub action: &'a str,
    pub entity_type: &'a str,
    pub entity_id: String,
    pub changes: serde_json::Value,
    pub ip_address: Option<String>,
}

/// Filters for [`AuditRepository::list`], already parsed.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery<'a> {
    pub entity_type: Option<&'a str>,
    pub entity_id: Option<&'a str>,
    pub actor_id: Option<UserId>,
}

const AUDIT_FILTER: &str = r"
    ($1::TEXT IS NULL OR entity_type = $1)
    AND ($2::TEXT IS NULL OR entity_id = $2)
    AND ($3::INT IS NULL OR actor_id = $3)
";

/// Repository for the audit log.
pub struct AuditRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AuditRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append an entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert(&self, entry: &NewAuditEntry<'_>) -> Result<AuditLogId, RepositoryError> {
        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO audit_log (actor_id, action, entity_type, entity_id, changes, ip_address)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(entry.actor_id)
        .bind(entry.action)
        .bind(entry.entity_type)
        .bind(&entry.entity_id)
        .bind(&entry.changes)
        .bind(entry.ip_address.as_deref())
        .fetch_one(self.pool)
        .await?;

        Ok(AuditLogId::new(id))
    }

    /// Entries matching `query`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        query: &AuditQuery<'_>,
        pagination: Pagination,
    ) -> Result<(Vec<AuditEntry>, i64), RepositoryError> {
        let rows = sqlx::query_as::<_, AuditRow>(&format!(
            r"
            SELECT id, actor_id, action, entity_type, entity_id, changes, ip_address, created_at
            FROM audit_log
            WHERE {AUDIT_FILTER}
            ORDER BY created_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "
        ))
        .bind(query.entity_type)
        .bind(query.entity_id)
        .bind(query.actor_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM audit_log WHERE {AUDIT_FILTER}"))
                .bind(query.entity_type)
                .bind(query.entity_id)
                .bind(query.actor_id)
                .fetch_one(self.pool)
                .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }
}
