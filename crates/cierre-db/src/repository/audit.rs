//! # Audit Log Repository
//!
//! Append-only record of reversals. The repository offers no update or
//! delete, and the schema's triggers reject both at the SQLite level.

use sqlx::SqlitePool;
use tracing::debug;

use super::{decode_json, decode_timestamp, encode_json, encode_timestamp};
use crate::error::{DbError, DbResult};
use cierre_core::{AuditLogEntry, ClosingScope, DateKey};

const SELECT_ENTRY: &str = r#"
    SELECT id, scope, date_key, acting_admin, affected_courier, reverted_quantities, timestamp
    FROM audit_log
"#;

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: String,
    scope: ClosingScope,
    date_key: String,
    acting_admin: String,
    affected_courier: Option<String>,
    reverted_quantities: String,
    timestamp: String,
}

impl TryFrom<AuditRow> for AuditLogEntry {
    type Error = DbError;

    fn try_from(row: AuditRow) -> DbResult<Self> {
        Ok(AuditLogEntry {
            date_key: DateKey::parse(&row.date_key)
                .map_err(|e| DbError::corrupt("date_key", e))?,
            reverted_quantities: decode_json("reverted_quantities", &row.reverted_quantities)?,
            timestamp: decode_timestamp("timestamp", &row.timestamp)?,
            id: row.id,
            scope: row.scope,
            acting_admin: row.acting_admin,
            affected_courier: row.affected_courier,
        })
    }
}

/// Repository for the reversal audit log.
#[derive(Debug, Clone)]
pub struct AuditLogRepository {
    pool: SqlitePool,
}

impl AuditLogRepository {
    /// Creates a new AuditLogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AuditLogRepository { pool }
    }

    /// Appends one entry.
    pub async fn append(&self, entry: &AuditLogEntry) -> DbResult<()> {
        debug!(
            id = %entry.id,
            scope = %entry.scope,
            date_key = %entry.date_key,
            admin = %entry.acting_admin,
            "Appending audit entry"
        );

        sqlx::query(
            r#"
            INSERT INTO audit_log (
                id, scope, date_key, acting_admin, affected_courier,
                reverted_quantities, timestamp
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&entry.id)
        .bind(entry.scope)
        .bind(entry.date_key.to_string())
        .bind(&entry.acting_admin)
        .bind(&entry.affected_courier)
        .bind(encode_json("reverted_quantities", &entry.reverted_quantities)?)
        .bind(encode_timestamp(&entry.timestamp))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Entries for one day, oldest first.
    pub async fn entries_for(&self, date_key: DateKey) -> DbResult<Vec<AuditLogEntry>> {
        let rows = sqlx::query_as::<_, AuditRow>(&format!(
            "{SELECT_ENTRY} WHERE date_key = ?1 ORDER BY timestamp, id"
        ))
        .bind(date_key.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AuditLogEntry::try_from).collect()
    }

    /// Counts all entries.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_log")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
