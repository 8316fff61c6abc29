use std::sync::Mutex;

use async_trait::async_trait;
use offpeak_core::types::{ResourceKind, Workload};

use crate::error::{ClusterError, Result};
use crate::ClusterClient;

/// In-memory [`ClusterClient`] used across the workspace's test suites.
///
/// Records every successful patch in order, so tests can assert both final
/// replica counts and patch ordering (the self-reference deferral cares
/// about the latter).
#[derive(Default)]
pub struct FakeCluster {
    workloads: Mutex<Vec<Workload>>,
    patch_log: Mutex<Vec<String>>,
    /// Workload names whose patches fail with an API error.
    fail_patches: Mutex<Vec<String>>,
}

impl FakeCluster {
    pub fn new(workloads: Vec<Workload>) -> Self {
        Self {
            workloads: Mutex::new(workloads),
            patch_log: Mutex::new(Vec::new()),
            fail_patches: Mutex::new(Vec::new()),
        }
    }

    /// Make every future patch of the named workload fail.
    pub fn fail_patches_for(&self, name: &str) {
        self.fail_patches.lock().unwrap().push(name.to_string());
    }

    /// Current replica count of one workload.
    pub fn replicas(&self, namespace: &str, name: &str, kind: ResourceKind) -> Option<i32> {
        self.workloads
            .lock()
            .unwrap()
            .iter()
            .find(|w| w.namespace == namespace && w.name == name && w.kind == kind)
            .map(|w| w.replicas)
    }

    /// Names of successfully patched workloads, in patch order.
    pub fn patch_order(&self) -> Vec<String> {
        self.patch_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn list_workloads(&self, namespace: &str, kind: ResourceKind) -> Result<Vec<Workload>> {
        Ok(self
            .workloads
            .lock()
            .unwrap()
            .iter()
            .filter(|w| w.namespace == namespace && w.kind == kind)
            .cloned()
            .collect())
    }

    async fn patch_replicas(&self, workload: &Workload, replicas: i32) -> Result<()> {
        if self
            .fail_patches
            .lock()
            .unwrap()
            .contains(&workload.name)
        {
            return Err(ClusterError::NotFound {
                namespace: workload.namespace.clone(),
                name: workload.name.clone(),
            });
        }

        let mut workloads = self.workloads.lock().unwrap();
        let target = workloads
            .iter_mut()
            .find(|w| {
                w.namespace == workload.namespace
                    && w.name == workload.name
                    && w.kind == workload.kind
            })
            .ok_or_else(|| ClusterError::NotFound {
                namespace: workload.namespace.clone(),
                name: workload.name.clone(),
            })?;
        target.replicas = replicas;
        self.patch_log.lock().unwrap().push(workload.name.clone());
        Ok(())
    }
}
