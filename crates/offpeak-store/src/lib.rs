//! `offpeak-store` — replica memory store.
//!
//! One logical table, `scaling_operations`, holding the last known replica
//! count per (namespace, resource name, resource kind). Written on
//! downscale, read back on upscale, so the two operations are inverses.
//!
//! Upsert semantics live in the caller: an [`ScalingStore::update`] that hits
//! no rows returns [`error::StoreError::NotFound`] and the caller retries as
//! an [`ScalingStore::insert`]. The store itself never deletes rows.

pub mod error;
pub mod postgres;
pub mod sqlite;
pub mod types;

pub use error::{Result, StoreError};
pub use postgres::PostgresScalingStore;
pub use sqlite::SqliteScalingStore;
pub use types::{RecordDraft, ScalingRecord};

use async_trait::async_trait;
use offpeak_core::types::ResourceKind;

/// Keyed access to persisted scaling records.
#[async_trait]
pub trait ScalingStore: Send + Sync {
    /// Create the schema if absent. Idempotent; called on every
    /// reconciliation when persistence is enabled.
    async fn bootstrap(&self) -> Result<()>;

    /// Most recent record for the key, or [`StoreError::NotFound`].
    async fn get(
        &self,
        namespace: &str,
        resource_name: &str,
        kind: ResourceKind,
    ) -> Result<ScalingRecord>;

    /// Insert a fresh record for a key that has none yet.
    async fn insert(&self, draft: &RecordDraft) -> Result<()>;

    /// Update the existing record for the draft's key.
    /// Returns [`StoreError::NotFound`] when no row matches.
    async fn update(&self, draft: &RecordDraft) -> Result<()>;
}
