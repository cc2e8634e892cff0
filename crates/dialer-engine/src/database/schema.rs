//! Database schema definitions for the dialer
//!
//! One live queue entry per contact is enforced by a partial unique index,
//! and contact ownership lives in `contact_leases` rather than a flag on the
//! contact row.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::Result;

const TABLES: &[(&str, &str)] = &[
    (
        "campaigns",
        r#"
        CREATE TABLE IF NOT EXISTS campaigns (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            caller_id TEXT NOT NULL,
            dial_method TEXT NOT NULL,
            dial_speed REAL NOT NULL,
            max_concurrent_calls INTEGER NOT NULL,
            abandon_rate_threshold REAL NOT NULL,
            pacing_multiplier REAL NOT NULL,
            status TEXT NOT NULL DEFAULT 'draft',
            max_attempts INTEGER NOT NULL,
            retry_delay_secs INTEGER NOT NULL,
            created_at_ms INTEGER NOT NULL,
            updated_at_ms INTEGER NOT NULL
        )
        "#,
    ),
    (
        "data_lists",
        r#"
        CREATE TABLE IF NOT EXISTS data_lists (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            campaign_id TEXT REFERENCES campaigns(id),
            active INTEGER NOT NULL DEFAULT 1,
            weight INTEGER NOT NULL DEFAULT 50,
            created_at_ms INTEGER NOT NULL,
            updated_at_ms INTEGER NOT NULL
        )
        "#,
    ),
    (
        "contacts",
        r#"
        CREATE TABLE IF NOT EXISTS contacts (
            id TEXT PRIMARY KEY,
            list_id TEXT NOT NULL REFERENCES data_lists(id) ON DELETE CASCADE,
            first_name TEXT,
            last_name TEXT,
            email TEXT,
            phone TEXT,
            alternate_phones TEXT NOT NULL DEFAULT '[]',
            attempt_count INTEGER NOT NULL DEFAULT 0,
            max_attempts INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            last_outcome TEXT,
            last_attempt_at_ms INTEGER,
            created_at_ms INTEGER NOT NULL
        )
        "#,
    ),
    (
        "contact_leases",
        r#"
        CREATE TABLE IF NOT EXISTS contact_leases (
            contact_id TEXT PRIMARY KEY REFERENCES contacts(id) ON DELETE CASCADE,
            holder TEXT NOT NULL,
            acquired_at_ms INTEGER NOT NULL,
            expires_at_ms INTEGER NOT NULL
        )
        "#,
    ),
    (
        "queue_entries",
        r#"
        CREATE TABLE IF NOT EXISTS queue_entries (
            id TEXT PRIMARY KEY,
            campaign_id TEXT NOT NULL REFERENCES campaigns(id),
            contact_id TEXT NOT NULL REFERENCES contacts(id) ON DELETE CASCADE,
            list_id TEXT NOT NULL,
            priority INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'queued',
            queued_at_ms INTEGER NOT NULL,
            dialed_at_ms INTEGER,
            completed_at_ms INTEGER,
            actor_id TEXT,
            provider_call_id TEXT,
            outcome TEXT
        )
        "#,
    ),
    (
        "call_records",
        r#"
        CREATE TABLE IF NOT EXISTS call_records (
            id TEXT PRIMARY KEY,
            queue_entry_id TEXT,
            contact_id TEXT NOT NULL,
            campaign_id TEXT NOT NULL,
            actor_id TEXT NOT NULL,
            phone_dialed TEXT NOT NULL,
            started_at_ms INTEGER NOT NULL,
            provider_call_id TEXT,
            notes TEXT,
            outcome TEXT,
            completed_at_ms INTEGER
        )
        "#,
    ),
    (
        "dnc_numbers",
        r#"
        CREATE TABLE IF NOT EXISTS dnc_numbers (
            phone TEXT PRIMARY KEY,
            source TEXT,
            added_at_ms INTEGER NOT NULL
        )
        "#,
    ),
];

const INDEXES: &[&str] = &[
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_queue_entries_live_contact
        ON queue_entries(contact_id) WHERE status IN ('queued', 'dialing')",
    "CREATE INDEX IF NOT EXISTS idx_queue_entries_campaign_status
        ON queue_entries(campaign_id, status, priority, queued_at_ms)",
    "CREATE INDEX IF NOT EXISTS idx_queue_entries_completed
        ON queue_entries(campaign_id, completed_at_ms)",
    "CREATE INDEX IF NOT EXISTS idx_contacts_list_status ON contacts(list_id, status)",
    "CREATE INDEX IF NOT EXISTS idx_contacts_list_phone ON contacts(list_id, phone)",
    "CREATE INDEX IF NOT EXISTS idx_data_lists_campaign ON data_lists(campaign_id, active)",
    "CREATE INDEX IF NOT EXISTS idx_call_records_entry ON call_records(queue_entry_id)",
    "CREATE INDEX IF NOT EXISTS idx_call_records_contact ON call_records(contact_id, started_at_ms)",
];

/// Create every table and index; safe to run against an existing database
pub async fn create_all(pool: &SqlitePool) -> Result<()> {
    for (name, ddl) in TABLES {
        debug!("📋 Creating {} table", name);
        sqlx::query(ddl).execute(pool).await?;
    }

    for ddl in INDEXES {
        sqlx::query(ddl).execute(pool).await?;
    }

    debug!("✅ Dialer indexes created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::database::DialerDatabase;

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let db = DialerDatabase::new_in_memory().await.unwrap();
        super::create_all(db.pool()).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .unwrap();

        for expected in ["call_records", "campaigns", "contact_leases", "contacts", "data_lists", "dnc_numbers", "queue_entries"] {
            assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
        }
    }
}
