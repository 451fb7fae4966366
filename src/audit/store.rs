//! Audit trail persistence

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::types::{AuditMessage, ConflictState};
use crate::error::{AppError, Result};
use crate::sync::SyncDirection;

/// Lookup and append operations on the audit trail
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Insert or overwrite a message
    async fn save(&self, message: &AuditMessage) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<AuditMessage>>;

    /// The message that first recorded the conflict
    async fn get_by_merge_conflict_uuid(&self, conflict_uuid: &str) -> Result<Option<AuditMessage>>;

    async fn list(&self, limit: u32) -> Result<Vec<AuditMessage>>;

    /// `id` followed by every message reachable through `next_audit`
    async fn chain(&self, id: &str) -> Result<Vec<AuditMessage>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = Some(id.to_string());

        while let Some(current) = cursor {
            if !seen.insert(current.clone()) {
                tracing::warn!("Audit chain starting at {} loops back to {}", id, current);
                break;
            }
            match self.get(&current).await? {
                Some(message) => {
                    cursor = message.next_audit.clone();
                    chain.push(message);
                }
                None => break,
            }
        }

        Ok(chain)
    }

    /// Append `next` to the chain that starts at `original`
    ///
    /// The first follow-up becomes `original.next_audit`; later attempts are
    /// linked behind the previous one so the history stays replayable.
    /// Concurrent appends to the same chain all end up in it.
    async fn set_next_audit(&self, original: &AuditMessage, next: &AuditMessage) -> Result<()>;

    async fn conflict_state(&self, conflict_uuid: &str) -> Result<Option<ConflictState>> {
        let Some(original) = self.get_by_merge_conflict_uuid(conflict_uuid).await? else {
            return Ok(None);
        };
        let resolved = self
            .chain(&original.id)
            .await?
            .iter()
            .skip(1)
            .any(|m| m.success);
        Ok(Some(if resolved {
            ConflictState::Resolved
        } else {
            ConflictState::Open
        }))
    }
}

/// SQLite-backed audit store
#[derive(Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
}

impl AuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, resource_name, action, operation, success, timestamp,
           available_resource_urls, used_resource_url, parent_url, local_url,
           details, creator_instance_id, merge_conflict_uuid, next_audit
    FROM audit_messages
"#;

#[async_trait]
impl AuditStore for AuditRepository {
    async fn save(&self, message: &AuditMessage) -> Result<()> {
        let urls = serde_json::to_string(&message.available_resource_urls)?;

        sqlx::query(
            r#"
            INSERT INTO audit_messages (
                id, resource_name, action, operation, success, timestamp,
                available_resource_urls, used_resource_url, parent_url, local_url,
                details, creator_instance_id, merge_conflict_uuid, next_audit
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                success = excluded.success,
                details = excluded.details,
                merge_conflict_uuid = excluded.merge_conflict_uuid,
                next_audit = excluded.next_audit
            "#,
        )
        .bind(&message.id)
        .bind(&message.resource_name)
        .bind(&message.action)
        .bind(message.operation.as_str())
        .bind(message.success)
        .bind(message.timestamp.to_rfc3339())
        .bind(&urls)
        .bind(&message.used_resource_url)
        .bind(&message.parent_url)
        .bind(&message.local_url)
        .bind(&message.details)
        .bind(&message.creator_instance_id)
        .bind(&message.merge_conflict_uuid)
        .bind(&message.next_audit)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<AuditMessage>> {
        let row = sqlx::query_as::<_, AuditRow>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(AuditRow::into_message).transpose()
    }

    async fn get_by_merge_conflict_uuid(&self, conflict_uuid: &str) -> Result<Option<AuditMessage>> {
        let row = sqlx::query_as::<_, AuditRow>(&format!(
            "{SELECT_COLUMNS} WHERE merge_conflict_uuid = ? ORDER BY rowid ASC LIMIT 1"
        ))
        .bind(conflict_uuid)
        .fetch_optional(&self.pool)
        .await?;

        row.map(AuditRow::into_message).transpose()
    }

    async fn set_next_audit(&self, original: &AuditMessage, next: &AuditMessage) -> Result<()> {
        loop {
            let chain = self.chain(&original.id).await?;
            let Some(tail) = chain.last() else {
                return Err(AppError::NotFound(format!("Audit message not found: {}", original.id)));
            };
            if chain.iter().any(|m| m.id == next.id) {
                return Ok(());
            }
            if let Some(dangling) = &tail.next_audit {
                return Err(AppError::Internal(format!(
                    "Audit chain {} is broken at {} -> {}",
                    original.id, tail.id, dangling
                )));
            }

            // Only an unlinked tail takes the new attempt
            let result = sqlx::query(
                "UPDATE audit_messages SET next_audit = ? WHERE id = ? AND next_audit IS NULL",
            )
            .bind(&next.id)
            .bind(&tail.id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 1 {
                return Ok(());
            }
            tracing::debug!("Audit chain {} grew while linking {}, retrying", original.id, next.id);
        }
    }

    async fn list(&self, limit: u32) -> Result<Vec<AuditMessage>> {
        let rows = sqlx::query_as::<_, AuditRow>(&format!(
            "{SELECT_COLUMNS} ORDER BY timestamp DESC LIMIT ?"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AuditRow::into_message).collect()
    }
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: String,
    resource_name: String,
    action: String,
    operation: String,
    success: bool,
    timestamp: String,
    available_resource_urls: String,
    used_resource_url: Option<String>,
    parent_url: Option<String>,
    local_url: Option<String>,
    details: Option<String>,
    creator_instance_id: String,
    merge_conflict_uuid: Option<String>,
    next_audit: Option<String>,
}

impl AuditRow {
    fn into_message(self) -> Result<AuditMessage> {
        let operation = match self.operation.as_str() {
            "PULL" => SyncDirection::Pull,
            _ => SyncDirection::Push,
        };

        let available_resource_urls: BTreeMap<String, String> =
            serde_json::from_str(&self.available_resource_urls)?;

        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| AppError::Internal(format!("Bad audit timestamp {}: {}", self.timestamp, e)))?
            .with_timezone(&Utc);

        Ok(AuditMessage {
            id: self.id,
            resource_name: self.resource_name,
            action: self.action,
            operation,
            success: self.success,
            timestamp,
            available_resource_urls,
            used_resource_url: self.used_resource_url,
            parent_url: self.parent_url,
            local_url: self.local_url,
            details: self.details,
            creator_instance_id: self.creator_instance_id,
            merge_conflict_uuid: self.merge_conflict_uuid,
            next_audit: self.next_audit,
        })
    }
}
