//! SQLite-based store implementation

use chrono::{DateTime, Local};
use rusqlite::{Connection, OptionalExtension, params};
use siteward_api::UsageRecord;
use siteward_util::DayKey;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{
    AuditEvent, LoadedState, PersistedState, STATE_SCHEMA_VERSION, Store, StoreResult, UsageDelta,
    migrate_state,
};

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        // A wedged database must fail the call, not hang the readiness gate
        conn.busy_timeout(Duration::from_secs(5))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            r#"
            -- State document (single row, versioned)
            CREATE TABLE IF NOT EXISTS state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                schema_version INTEGER NOT NULL,
                document TEXT NOT NULL
            );

            -- Usage accounting
            CREATE TABLE IF NOT EXISTS usage (
                day TEXT NOT NULL,
                host TEXT NOT NULL,
                time_ms INTEGER NOT NULL DEFAULT 0,
                views INTEGER NOT NULL DEFAULT 0,
                first_access TEXT,
                last_access TEXT,
                temp_access INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (day, host)
            );

            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_usage_day ON usage(day);
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

fn upsert_usage(
    conn: &Connection,
    day: DayKey,
    host: &str,
    delta: &UsageDelta,
) -> StoreResult<()> {
    conn.execute(
        r#"
        INSERT INTO usage (day, host, time_ms, views, first_access, last_access, temp_access)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(day, host)
        DO UPDATE SET
            time_ms = time_ms + excluded.time_ms,
            views = views + excluded.views,
            first_access = COALESCE(first_access, excluded.first_access),
            last_access = COALESCE(excluded.last_access, last_access),
            temp_access = temp_access + excluded.temp_access
        "#,
        params![
            day.to_string(),
            host,
            delta.time_ms as i64,
            delta.views as i64,
            delta.first_access.map(|t| t.to_rfc3339()),
            delta.last_access.map(|t| t.to_rfc3339()),
            delta.temp_access as i64,
        ],
    )?;

    Ok(())
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Local>> {
    value.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Local))
            .ok()
    })
}

impl Store for SqliteStore {
    fn load_state(&self) -> StoreResult<Option<LoadedState>> {
        let mut conn = self.conn.lock().unwrap();

        let row: Option<String> = conn
            .query_row("SELECT document FROM state WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        let Some(document) = row else {
            return Ok(None);
        };

        let doc: serde_json::Value = serde_json::from_str(&document)
            .map_err(|e| crate::StoreError::Corrupt(format!("state row is not JSON: {}", e)))?;

        let outcome = migrate_state(doc, siteward_util::now())?;

        // Fold legacy usage into the table and rewrite the document at the
        // current version, atomically.
        if outcome.migrated_from.is_some() {
            let tx = conn.transaction()?;
            for (day, host, record) in &outcome.legacy_usage {
                upsert_usage(&tx, *day, host, &UsageDelta::from(record))?;
            }
            let json = serde_json::to_string(&outcome.state)?;
            tx.execute(
                "UPDATE state SET schema_version = ?, document = ? WHERE id = 1",
                params![STATE_SCHEMA_VERSION, json],
            )?;
            tx.commit()?;

            info!(
                from = ?outcome.migrated_from,
                to = STATE_SCHEMA_VERSION,
                "Persisted state rewritten at current schema"
            );
        }

        Ok(Some(LoadedState {
            state: outcome.state,
            migrated_from: outcome.migrated_from,
        }))
    }

    fn save_state(&self, state: &PersistedState) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let json = serde_json::to_string(state)?;

        conn.execute(
            r#"
            INSERT INTO state (id, schema_version, document)
            VALUES (1, ?, ?)
            ON CONFLICT(id)
            DO UPDATE SET schema_version = excluded.schema_version,
                          document = excluded.document
            "#,
            params![state.schema_version, json],
        )?;

        debug!("State document saved");
        Ok(())
    }

    fn add_usage(&self, day: DayKey, host: &str, delta: &UsageDelta) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        upsert_usage(&conn, day, host, delta)?;

        debug!(
            day = %day,
            host,
            added_ms = delta.time_ms,
            views = delta.views,
            "Usage recorded"
        );
        Ok(())
    }

    fn usage_for_day(&self, day: DayKey) -> StoreResult<HashMap<String, UsageRecord>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT host, time_ms, views, first_access, last_access, temp_access
             FROM usage WHERE day = ?",
        )?;

        let rows = stmt.query_map([day.to_string()], |row| {
            let host: String = row.get(0)?;
            let time_ms: i64 = row.get(1)?;
            let views: i64 = row.get(2)?;
            let first_access: Option<String> = row.get(3)?;
            let last_access: Option<String> = row.get(4)?;
            let temp_access: i64 = row.get(5)?;
            Ok((host, time_ms, views, first_access, last_access, temp_access))
        })?;

        let mut usage = HashMap::new();
        for row in rows {
            let (host, time_ms, views, first_access, last_access, temp_access) = row?;
            usage.insert(
                host,
                UsageRecord {
                    time_ms: time_ms.max(0) as u64,
                    views: views.max(0) as u32,
                    first_access: parse_timestamp(first_access),
                    last_access: parse_timestamp(last_access),
                    temp_access_requests: temp_access.max(0) as u32,
                },
            );
        }

        Ok(usage)
    }

    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![event.timestamp.to_rfc3339(), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit], |row| {
            let id: i64 = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp_str, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_json) = row?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map(|dt| dt.with_timezone(&Local))
                .unwrap_or_else(|_| siteward_util::now());
            let event: crate::AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp,
                event,
            });
        }

        Ok(events)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}
