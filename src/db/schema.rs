//! Database schema initialization

use sqlx::SqlitePool;

use crate::error::Result;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_SQL).execute(pool).await?;

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- One row per sync attempt
CREATE TABLE IF NOT EXISTS audit_messages (
    id TEXT PRIMARY KEY,
    resource_name TEXT NOT NULL,
    action TEXT NOT NULL,
    operation TEXT NOT NULL,
    success INTEGER NOT NULL,
    timestamp TEXT NOT NULL,
    available_resource_urls TEXT NOT NULL DEFAULT '{}',
    used_resource_url TEXT,
    parent_url TEXT,
    local_url TEXT,
    details TEXT,
    creator_instance_id TEXT NOT NULL,
    merge_conflict_uuid TEXT,
    next_audit TEXT REFERENCES audit_messages(id)
);

CREATE INDEX IF NOT EXISTS idx_audit_merge_conflict ON audit_messages(merge_conflict_uuid);
CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_messages(timestamp);
"#;
