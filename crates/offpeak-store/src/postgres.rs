use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::debug;

use offpeak_core::types::ResourceKind;

use crate::error::{Result, StoreError};
use crate::types::{RecordDraft, ScalingRecord};
use crate::ScalingStore;

/// Client-server store for deployments where the operator's filesystem is
/// ephemeral and replica memory has to outlive the pod.
pub struct PostgresScalingStore {
    pool: PgPool,
}

impl PostgresScalingStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPool::connect(url).await?;
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScalingStore for PostgresScalingStore {
    async fn bootstrap(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS scaling_operations (
                id                    SERIAL PRIMARY KEY,
                namespace_name        TEXT    NOT NULL,
                rule_name_description TEXT,
                resource_name         TEXT    NOT NULL,
                resource_type         TEXT    NOT NULL,
                replicas              INTEGER NOT NULL,
                created_at            TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at            TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_scaling_key
             ON scaling_operations(namespace_name, resource_name, resource_type)",
        )
        .execute(&self.pool)
        .await?;
        debug!("postgres scaling_operations schema ready");
        Ok(())
    }

    async fn get(
        &self,
        namespace: &str,
        resource_name: &str,
        kind: ResourceKind,
    ) -> Result<ScalingRecord> {
        let row = sqlx::query(
            "SELECT id, namespace_name, rule_name_description, resource_name,
                    resource_type, replicas, created_at::text AS created_at,
                    updated_at::text AS updated_at
             FROM scaling_operations
             WHERE namespace_name = $1 AND resource_name = $2 AND resource_type = $3
             ORDER BY updated_at DESC
             LIMIT 1",
        )
        .bind(namespace)
        .bind(resource_name)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or_else(|| StoreError::NotFound {
            namespace: namespace.to_string(),
            resource_name: resource_name.to_string(),
            resource_kind: kind.to_string(),
        })?;

        Ok(ScalingRecord {
            id: i64::from(row.try_get::<i32, _>("id")?),
            namespace: row.try_get("namespace_name")?,
            rule_description: row
                .try_get::<Option<String>, _>("rule_name_description")?
                .unwrap_or_default(),
            resource_name: row.try_get("resource_name")?,
            resource_kind: row.try_get("resource_type")?,
            replicas: row.try_get("replicas")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn insert(&self, draft: &RecordDraft) -> Result<()> {
        sqlx::query(
            "INSERT INTO scaling_operations
             (namespace_name, rule_name_description, resource_name, resource_type, replicas)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&draft.namespace)
        .bind(&draft.rule_description)
        .bind(&draft.resource_name)
        .bind(draft.resource_kind.as_str())
        .bind(draft.replicas)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, draft: &RecordDraft) -> Result<()> {
        let done = sqlx::query(
            "UPDATE scaling_operations
             SET replicas = $1, rule_name_description = $2, updated_at = now()
             WHERE namespace_name = $3 AND resource_name = $4 AND resource_type = $5",
        )
        .bind(draft.replicas)
        .bind(&draft.rule_description)
        .bind(&draft.namespace)
        .bind(&draft.resource_name)
        .bind(draft.resource_kind.as_str())
        .execute(&self.pool)
        .await?;

        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                namespace: draft.namespace.clone(),
                resource_name: draft.resource_name.clone(),
                resource_kind: draft.resource_kind.to_string(),
            });
        }
        Ok(())
    }
}
