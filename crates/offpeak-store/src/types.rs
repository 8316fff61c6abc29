use serde::{Deserialize, Serialize};

use offpeak_core::types::ResourceKind;

/// A persisted scaling row. At most one live row exists per
/// (namespace, resource_name, resource_kind).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingRecord {
    pub id: i64,
    pub namespace: String,
    pub rule_description: String,
    pub resource_name: String,
    pub resource_kind: String,
    pub replicas: i32,
    pub created_at: String,
    pub updated_at: String,
}

/// Key + payload for an insert or update; timestamps are database-assigned.
#[derive(Debug, Clone)]
pub struct RecordDraft {
    pub namespace: String,
    pub rule_description: String,
    pub resource_name: String,
    pub resource_kind: ResourceKind,
    pub replicas: i32,
}
