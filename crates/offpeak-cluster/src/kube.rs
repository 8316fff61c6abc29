use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::{Client, ResourceExt};
use serde_json::json;

use async_trait::async_trait;
use offpeak_core::types::{ResourceKind, Workload};

use crate::error::Result;
use crate::ClusterClient;

/// API-server-backed [`ClusterClient`].
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    /// Connect using in-cluster config or the local kubeconfig.
    pub async fn connect() -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self { client })
    }

    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterClient for KubeCluster {
    async fn list_workloads(&self, namespace: &str, kind: ResourceKind) -> Result<Vec<Workload>> {
        let lp = ListParams::default();
        let workloads = match kind {
            ResourceKind::Deployment => {
                let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
                api.list(&lp)
                    .await?
                    .items
                    .into_iter()
                    .map(|d| Workload {
                        namespace: namespace.to_string(),
                        name: d.name_any(),
                        kind,
                        replicas: d.spec.as_ref().and_then(|s| s.replicas).unwrap_or(0),
                    })
                    .collect()
            }
            ResourceKind::StatefulSet => {
                let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
                api.list(&lp)
                    .await?
                    .items
                    .into_iter()
                    .map(|s| Workload {
                        namespace: namespace.to_string(),
                        name: s.name_any(),
                        kind,
                        replicas: s.spec.as_ref().and_then(|s| s.replicas).unwrap_or(0),
                    })
                    .collect()
            }
            ResourceKind::HorizontalPodAutoscaler => {
                let api: Api<HorizontalPodAutoscaler> =
                    Api::namespaced(self.client.clone(), namespace);
                api.list(&lp)
                    .await?
                    .items
                    .into_iter()
                    .map(|h| Workload {
                        namespace: namespace.to_string(),
                        name: h.name_any(),
                        kind,
                        // An HPA's scalable knob is its minimum.
                        replicas: h.spec.as_ref().and_then(|s| s.min_replicas).unwrap_or(1),
                    })
                    .collect()
            }
        };
        Ok(workloads)
    }

    async fn patch_replicas(&self, workload: &Workload, replicas: i32) -> Result<()> {
        let pp = PatchParams::default();
        match workload.kind {
            ResourceKind::Deployment => {
                let api: Api<Deployment> =
                    Api::namespaced(self.client.clone(), &workload.namespace);
                let patch = json!({ "spec": { "replicas": replicas } });
                api.patch(&workload.name, &pp, &Patch::Merge(&patch)).await?;
            }
            ResourceKind::StatefulSet => {
                let api: Api<StatefulSet> =
                    Api::namespaced(self.client.clone(), &workload.namespace);
                let patch = json!({ "spec": { "replicas": replicas } });
                api.patch(&workload.name, &pp, &Patch::Merge(&patch)).await?;
            }
            ResourceKind::HorizontalPodAutoscaler => {
                let api: Api<HorizontalPodAutoscaler> =
                    Api::namespaced(self.client.clone(), &workload.namespace);
                let patch = json!({ "spec": { "minReplicas": replicas } });
                api.patch(&workload.name, &pp, &Patch::Merge(&patch)).await?;
            }
        }
        Ok(())
    }
}
