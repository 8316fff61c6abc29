use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use offpeak_core::types::ResourceKind;

use crate::error::{Result, StoreError};
use crate::types::{RecordDraft, ScalingRecord};
use crate::ScalingStore;

/// Embedded file-backed store.
///
/// SQLite is a single-writer engine, so all access goes through one shared
/// connection behind a mutex. That serialization is intentional: concurrent
/// job firings against the same database must queue here.
pub struct SqliteScalingStore {
    conn: Mutex<Connection>,
}

impl SqliteScalingStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Ok(Self::new(conn))
    }

    #[cfg(test)]
    fn in_memory() -> Self {
        Self::new(Connection::open_in_memory().unwrap())
    }
}

#[async_trait]
impl ScalingStore for SqliteScalingStore {
    async fn bootstrap(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS scaling_operations (
                id                    INTEGER PRIMARY KEY AUTOINCREMENT,
                namespace_name        TEXT    NOT NULL,
                rule_name_description TEXT,
                resource_name         TEXT    NOT NULL,
                resource_type         TEXT    NOT NULL,
                replicas              INTEGER NOT NULL,
                created_at            TEXT    NOT NULL DEFAULT current_timestamp,
                updated_at            TEXT    NOT NULL DEFAULT current_timestamp
            );
            CREATE INDEX IF NOT EXISTS idx_scaling_key
                ON scaling_operations(namespace_name, resource_name, resource_type);",
        )?;
        debug!("sqlite scaling_operations schema ready");
        Ok(())
    }

    async fn get(
        &self,
        namespace: &str,
        resource_name: &str,
        kind: ResourceKind,
    ) -> Result<ScalingRecord> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                "SELECT id, namespace_name, rule_name_description, resource_name,
                        resource_type, replicas, created_at, updated_at
                 FROM scaling_operations
                 WHERE namespace_name = ?1 AND resource_name = ?2 AND resource_type = ?3
                 ORDER BY updated_at DESC
                 LIMIT 1",
                rusqlite::params![namespace, resource_name, kind.as_str()],
                |row| {
                    Ok(ScalingRecord {
                        id: row.get(0)?,
                        namespace: row.get(1)?,
                        rule_description: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        resource_name: row.get(3)?,
                        resource_kind: row.get(4)?,
                        replicas: row.get(5)?,
                        created_at: row.get(6)?,
                        updated_at: row.get(7)?,
                    })
                },
            )
            .optional()?;

        record.ok_or_else(|| StoreError::NotFound {
            namespace: namespace.to_string(),
            resource_name: resource_name.to_string(),
            resource_kind: kind.to_string(),
        })
    }

    async fn insert(&self, draft: &RecordDraft) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO scaling_operations
             (namespace_name, rule_name_description, resource_name, resource_type, replicas)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                draft.namespace,
                draft.rule_description,
                draft.resource_name,
                draft.resource_kind.as_str(),
                draft.replicas,
            ],
        )?;
        Ok(())
    }

    async fn update(&self, draft: &RecordDraft) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE scaling_operations
             SET replicas = ?1, rule_name_description = ?2, updated_at = current_timestamp
             WHERE namespace_name = ?3 AND resource_name = ?4 AND resource_type = ?5",
            rusqlite::params![
                draft.replicas,
                draft.rule_description,
                draft.namespace,
                draft.resource_name,
                draft.resource_kind.as_str(),
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound {
                namespace: draft.namespace.clone(),
                resource_name: draft.resource_name.clone(),
                resource_kind: draft.resource_kind.to_string(),
            });
        }
        Ok(())
    }
}
