//! `offpeak-cluster` — cluster API client boundary.
//!
//! The scaling engine only ever talks to [`ClusterClient`]: list the
//! workloads of one kind in one namespace, and patch a replica count. The
//! [`kube`] adapter backs it with the real API server; [`fake::FakeCluster`]
//! backs it with an in-memory set for tests.

pub mod error;
pub mod fake;
pub mod kube;

pub use error::{ClusterError, Result};

use async_trait::async_trait;
use offpeak_core::types::{ResourceKind, Workload};

/// Read/patch access to scalable cluster objects.
///
/// Lists are point-in-time reads; patches are single-field merge updates.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// All workloads of `kind` in `namespace`, with their current replica
    /// counts (minReplicas for autoscalers).
    async fn list_workloads(&self, namespace: &str, kind: ResourceKind) -> Result<Vec<Workload>>;

    /// Merge-patch the workload's replica count to `replicas`.
    async fn patch_replicas(&self, workload: &Workload, replicas: i32) -> Result<()>;
}

const SERVICEACCOUNT_NAMESPACE_PATH: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// Namespace the operator itself runs in, when running inside a cluster.
pub fn own_namespace() -> Option<String> {
    std::fs::read_to_string(SERVICEACCOUNT_NAMESPACE_PATH)
        .ok()
        .map(|s| s.trim().to_string())
}
