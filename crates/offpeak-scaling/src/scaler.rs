use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use offpeak_cluster::ClusterClient;
use offpeak_core::config::ScalingDefaults;
use offpeak_core::types::{Operation, ResourceKind, Workload};
use offpeak_store::{RecordDraft, ScalingStore, StoreError};

use crate::error::Result;

/// One scaling invocation: every workload of one kind in one namespace.
#[async_trait]
pub trait ResourceScaler: Send + Sync {
    async fn run(&self, rule_description: &str, namespace: &str, operation: Operation)
        -> Result<()>;
}

/// Identity of the operator's own workload. A downscale that matches it is
/// deferred to the end of the pass so the operator cannot terminate itself
/// before the sibling workloads are handled.
#[derive(Debug, Clone)]
pub struct SelfReference {
    /// The policy document's name, which the operator's workload shares.
    pub name: String,
    /// When known, the match additionally requires this namespace.
    pub namespace: Option<String>,
}

impl SelfReference {
    fn matches(&self, workload: &Workload) -> bool {
        if workload.name != self.name {
            return false;
        }
        match &self.namespace {
            Some(ns) => workload.namespace == *ns,
            None => true,
        }
    }
}

/// Kind-tagged scaler. All kinds share this code path; the kind decides what
/// the cluster client lists/patches and whether the floor is clamped.
pub struct KindScaler {
    kind: ResourceKind,
    client: Arc<dyn ClusterClient>,
    store: Option<Arc<dyn ScalingStore>>,
    defaults: ScalingDefaults,
    self_ref: Option<SelfReference>,
}

impl KindScaler {
    pub fn new(
        kind: ResourceKind,
        client: Arc<dyn ClusterClient>,
        store: Option<Arc<dyn ScalingStore>>,
        defaults: ScalingDefaults,
        self_ref: Option<SelfReference>,
    ) -> Self {
        Self {
            kind,
            client,
            store,
            defaults,
            self_ref,
        }
    }

    fn is_self(&self, workload: &Workload) -> bool {
        self.self_ref
            .as_ref()
            .is_some_and(|sr| sr.matches(workload))
    }

    fn downscale_target(&self) -> i32 {
        match self.kind {
            // An autoscaler cannot declare a zero minimum.
            ResourceKind::HorizontalPodAutoscaler => self.defaults.floor.max(1),
            _ => self.defaults.floor,
        }
    }

    /// Target replica count for an upscale: the remembered count when a
    /// record exists, the fixed default otherwise. A missing record and
    /// disabled persistence are expected conditions, not errors.
    async fn restore_target(&self, workload: &Workload) -> Result<i32> {
        let Some(store) = &self.store else {
            return Ok(self.defaults.restore);
        };

        match store
            .get(&workload.namespace, &workload.name, self.kind)
            .await
        {
            Ok(record) => {
                debug!(
                    namespace = %workload.namespace,
                    workload = %workload.name,
                    replicas = record.replicas,
                    "restoring remembered replica count"
                );
                Ok(record.replicas)
            }
            Err(StoreError::NotFound { .. }) => Ok(self.defaults.restore),
            Err(e) => Err(e.into()),
        }
    }

    /// Remember the current count before the downscale patch, so the next
    /// upscale can undo it. Update first; a no-row update means the key is
    /// new and we insert instead.
    async fn remember(&self, rule_description: &str, workload: &Workload) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };

        let draft = RecordDraft {
            namespace: workload.namespace.clone(),
            rule_description: rule_description.to_string(),
            resource_name: workload.name.clone(),
            resource_kind: self.kind,
            replicas: workload.replicas,
        };

        match store.update(&draft).await {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound { .. }) => {
                store.insert(&draft).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn scale_one(
        &self,
        rule_description: &str,
        workload: &Workload,
        operation: Operation,
    ) -> Result<()> {
        let before = workload.replicas;
        let target = match operation {
            Operation::Downscale => {
                self.remember(rule_description, workload).await?;
                self.downscale_target()
            }
            Operation::Upscale => self.restore_target(workload).await?,
        };

        self.client.patch_replicas(workload, target).await?;

        info!(
            rule = rule_description,
            namespace = %workload.namespace,
            workload = %workload.name,
            kind = %self.kind,
            %operation,
            before,
            after = target,
            "replicas patched"
        );
        Ok(())
    }
}

#[async_trait]
impl ResourceScaler for KindScaler {
    async fn run(
        &self,
        rule_description: &str,
        namespace: &str,
        operation: Operation,
    ) -> Result<()> {
        let workloads = self.client.list_workloads(namespace, self.kind).await?;

        let mut deferred: Option<Workload> = None;
        let mut outcome = Ok(());

        for workload in workloads {
            if operation == Operation::Downscale && self.is_self(&workload) {
                debug!(
                    namespace,
                    workload = %workload.name,
                    "deferring own workload until end of pass"
                );
                deferred = Some(workload);
                continue;
            }

            if let Err(e) = self.scale_one(rule_description, &workload, operation).await {
                // A failed patch aborts the rest of this invocation; the
                // deferred self-patch below still runs.
                outcome = Err(e);
                break;
            }
        }

        if let Some(own) = deferred {
            let result = self.scale_one(rule_description, &own, operation).await;
            if outcome.is_ok() {
                outcome = result;
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offpeak_cluster::fake::FakeCluster;
    use offpeak_store::SqliteScalingStore;
    use rusqlite::Connection;

    fn workload(namespace: &str, name: &str, kind: ResourceKind, replicas: i32) -> Workload {
        Workload {
            namespace: namespace.to_string(),
            name: name.to_string(),
            kind,
            replicas,
        }
    }

    async fn memory_store() -> Arc<dyn ScalingStore> {
        let store = SqliteScalingStore::new(Connection::open_in_memory().unwrap());
        store.bootstrap().await.unwrap();
        Arc::new(store)
    }

    fn scaler(
        kind: ResourceKind,
        client: Arc<FakeCluster>,
        store: Option<Arc<dyn ScalingStore>>,
        self_ref: Option<SelfReference>,
    ) -> KindScaler {
        KindScaler::new(kind, client, store, ScalingDefaults::default(), self_ref)
    }

    #[tokio::test]
    async fn downscale_then_upscale_restores_remembered_count() {
        let client = Arc::new(FakeCluster::new(vec![workload(
            "ns-a",
            "web",
            ResourceKind::Deployment,
            5,
        )]));
        let store = memory_store().await;
        let sc = scaler(
            ResourceKind::Deployment,
            Arc::clone(&client),
            Some(Arc::clone(&store)),
            None,
        );

        sc.run("nightly", "ns-a", Operation::Downscale).await.unwrap();
        assert_eq!(client.replicas("ns-a", "web", ResourceKind::Deployment), Some(0));

        let record = store
            .get("ns-a", "web", ResourceKind::Deployment)
            .await
            .unwrap();
        assert_eq!(record.replicas, 5);
        assert_eq!(record.rule_description, "nightly");

        sc.run("nightly", "ns-a", Operation::Upscale).await.unwrap();
        assert_eq!(client.replicas("ns-a", "web", ResourceKind::Deployment), Some(5));
    }

    #[tokio::test]
    async fn upscale_without_persistence_uses_fixed_default() {
        let client = Arc::new(FakeCluster::new(vec![workload(
            "ns-a",
            "web",
            ResourceKind::Deployment,
            3,
        )]));
        let sc = scaler(ResourceKind::Deployment, Arc::clone(&client), None, None);

        sc.run("nightly", "ns-a", Operation::Downscale).await.unwrap();
        assert_eq!(client.replicas("ns-a", "web", ResourceKind::Deployment), Some(0));

        sc.run("nightly", "ns-a", Operation::Upscale).await.unwrap();
        assert_eq!(client.replicas("ns-a", "web", ResourceKind::Deployment), Some(1));
    }

    #[tokio::test]
    async fn upscale_without_record_falls_back_to_default() {
        let client = Arc::new(FakeCluster::new(vec![workload(
            "ns-a",
            "web",
            ResourceKind::Deployment,
            0,
        )]));
        let store = memory_store().await;
        let sc = scaler(
            ResourceKind::Deployment,
            Arc::clone(&client),
            Some(store),
            None,
        );

        sc.run("nightly", "ns-a", Operation::Upscale).await.unwrap();
        assert_eq!(client.replicas("ns-a", "web", ResourceKind::Deployment), Some(1));
    }

    #[tokio::test]
    async fn second_downscale_updates_record_in_place() {
        let client = Arc::new(FakeCluster::new(vec![workload(
            "ns-a",
            "web",
            ResourceKind::Deployment,
            5,
        )]));
        let store = memory_store().await;
        let sc = scaler(
            ResourceKind::Deployment,
            Arc::clone(&client),
            Some(Arc::clone(&store)),
            None,
        );

        sc.run("nightly", "ns-a", Operation::Downscale).await.unwrap();
        sc.run("nightly", "ns-a", Operation::Upscale).await.unwrap();
        sc.run("weekly", "ns-a", Operation::Downscale).await.unwrap();

        let record = store
            .get("ns-a", "web", ResourceKind::Deployment)
            .await
            .unwrap();
        assert_eq!(record.replicas, 5);
        assert_eq!(record.rule_description, "weekly");
    }

    #[tokio::test]
    async fn autoscaler_floor_never_goes_below_one() {
        let client = Arc::new(FakeCluster::new(vec![workload(
            "ns-a",
            "web-hpa",
            ResourceKind::HorizontalPodAutoscaler,
            4,
        )]));
        let sc = scaler(
            ResourceKind::HorizontalPodAutoscaler,
            Arc::clone(&client),
            None,
            None,
        );

        sc.run("nightly", "ns-a", Operation::Downscale).await.unwrap();
        assert_eq!(
            client.replicas("ns-a", "web-hpa", ResourceKind::HorizontalPodAutoscaler),
            Some(1)
        );
    }

    #[tokio::test]
    async fn own_workload_is_patched_last() {
        let client = Arc::new(FakeCluster::new(vec![
            workload("ns-ops", "offpeak", ResourceKind::Deployment, 1),
            workload("ns-ops", "api", ResourceKind::Deployment, 3),
            workload("ns-ops", "worker", ResourceKind::Deployment, 2),
        ]));
        let sc = scaler(
            ResourceKind::Deployment,
            Arc::clone(&client),
            None,
            Some(SelfReference {
                name: "offpeak".to_string(),
                namespace: Some("ns-ops".to_string()),
            }),
        );

        sc.run("nightly", "ns-ops", Operation::Downscale).await.unwrap();
        assert_eq!(client.patch_order(), vec!["api", "worker", "offpeak"]);
        assert_eq!(client.replicas("ns-ops", "offpeak", ResourceKind::Deployment), Some(0));
    }

    #[tokio::test]
    async fn deferred_self_patch_runs_even_after_a_sibling_failure() {
        let client = Arc::new(FakeCluster::new(vec![
            workload("ns-ops", "offpeak", ResourceKind::Deployment, 1),
            workload("ns-ops", "api", ResourceKind::Deployment, 3),
        ]));
        client.fail_patches_for("api");
        let sc = scaler(
            ResourceKind::Deployment,
            Arc::clone(&client),
            None,
            Some(SelfReference {
                name: "offpeak".to_string(),
                namespace: None,
            }),
        );

        let result = sc.run("nightly", "ns-ops", Operation::Downscale).await;
        assert!(result.is_err());
        // The cleanup step still scaled the operator itself.
        assert_eq!(client.replicas("ns-ops", "offpeak", ResourceKind::Deployment), Some(0));
    }

    #[tokio::test]
    async fn patch_failure_aborts_remaining_workloads() {
        let client = Arc::new(FakeCluster::new(vec![
            workload("ns-a", "a", ResourceKind::Deployment, 3),
            workload("ns-a", "b", ResourceKind::Deployment, 3),
            workload("ns-a", "c", ResourceKind::Deployment, 3),
        ]));
        client.fail_patches_for("b");
        let sc = scaler(ResourceKind::Deployment, Arc::clone(&client), None, None);

        let result = sc.run("nightly", "ns-a", Operation::Downscale).await;
        assert!(result.is_err());
        assert_eq!(client.replicas("ns-a", "a", ResourceKind::Deployment), Some(0));
        assert_eq!(client.replicas("ns-a", "c", ResourceKind::Deployment), Some(3));
    }

    #[tokio::test]
    async fn self_reference_does_not_defer_upscale() {
        let client = Arc::new(FakeCluster::new(vec![
            workload("ns-ops", "offpeak", ResourceKind::Deployment, 0),
            workload("ns-ops", "api", ResourceKind::Deployment, 0),
        ]));
        let sc = scaler(
            ResourceKind::Deployment,
            Arc::clone(&client),
            None,
            Some(SelfReference {
                name: "offpeak".to_string(),
                namespace: None,
            }),
        );

        sc.run("nightly", "ns-ops", Operation::Upscale).await.unwrap();
        assert_eq!(client.patch_order(), vec!["offpeak", "api"]);
    }
}
