use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use offpeak_cluster::{own_namespace, ClusterClient};
use offpeak_core::config::OperatorConfig;
use offpeak_core::policy::ScalingPolicy;
use offpeak_scaling::{ScalerRegistry, SelfReference};
use offpeak_scheduler::Reconciler;
use offpeak_store::ScalingStore;

/// Polls the policy document and reconciles whenever its raw content
/// changes. Reconciliations run one at a time, in this task.
pub struct PolicyWatcher {
    config: OperatorConfig,
    client: Arc<dyn ClusterClient>,
    store: Option<Arc<dyn ScalingStore>>,
    last_seen: Option<String>,
    reconciler: Option<Reconciler>,
}

impl PolicyWatcher {
    pub fn new(
        config: OperatorConfig,
        client: Arc<dyn ClusterClient>,
        store: Option<Arc<dyn ScalingStore>>,
    ) -> Self {
        Self {
            config,
            client,
            store,
            last_seen: None,
            reconciler: None,
        }
    }

    /// Poll until the shutdown signal flips, then tear the job set down.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.policy.poll));
        loop {
            tokio::select! {
                _ = ticker.tick() => self.sync().await,
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        if let Some(reconciler) = &mut self.reconciler {
            if let Err(e) = reconciler.shutdown().await {
                error!(error = %e, "job set shutdown failed");
            }
        }
        info!("policy watcher stopped");
    }

    async fn sync(&mut self) {
        let path = self.config.policy.path.clone();
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path, error = %e, "policy document unreadable");
                return;
            }
        };
        self.apply(&raw).await;
    }

    /// Dedupe on raw content, parse, reconcile. A document that fails to
    /// parse or validate is remembered anyway so the same broken content is
    /// logged once, not on every poll.
    async fn apply(&mut self, raw: &str) {
        if self.last_seen.as_deref() == Some(raw) {
            return;
        }
        self.last_seen = Some(raw.to_string());

        let policy = match ScalingPolicy::from_json(raw) {
            Ok(policy) => policy,
            Err(e) => {
                error!(error = %e, "policy document is not valid JSON, keeping current jobs");
                return;
            }
        };

        let reconciler = self.reconciler.get_or_insert_with(|| {
            let self_name = self
                .config
                .selfname
                .clone()
                .unwrap_or_else(|| policy.name.clone());
            let self_ref = SelfReference {
                name: self_name,
                namespace: own_namespace(),
            };
            let registry = Arc::new(ScalerRegistry::new(
                Arc::clone(&self.client),
                self.store.clone(),
                self.config.scaling,
                Some(self_ref),
            ));
            Reconciler::new(registry, self.store.clone())
        });

        if let Err(e) = reconciler.reconcile(&policy).await {
            error!(policy = %policy.name, error = %e, "reconciliation failed, keeping current jobs");
        }
    }

    #[cfg(test)]
    fn job_count(&self) -> usize {
        self.reconciler.as_ref().map_or(0, Reconciler::job_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offpeak_cluster::fake::FakeCluster;

    const VALID: &str = r#"{
        "name": "offpeak",
        "spec": {
            "schedule": { "timeZone": "America/Sao_Paulo" },
            "options": {
                "resourceScaling": ["deployments"],
                "timeRules": {
                    "rules": [{
                        "name": "nightly",
                        "namespaces": ["ns-a"],
                        "upscaleTime": "08:00",
                        "downscaleTime": "18:00"
                    }]
                }
            }
        }
    }"#;

    fn watcher() -> PolicyWatcher {
        PolicyWatcher::new(
            OperatorConfig::default(),
            Arc::new(FakeCluster::default()),
            None,
        )
    }

    #[tokio::test]
    async fn valid_document_builds_jobs() {
        let mut w = watcher();
        w.apply(VALID).await;
        assert_eq!(w.job_count(), 2);
    }

    #[tokio::test]
    async fn unchanged_content_is_skipped() {
        let mut w = watcher();
        w.apply(VALID).await;
        let before = w.job_count();
        w.apply(VALID).await;
        assert_eq!(w.job_count(), before);
    }

    #[tokio::test]
    async fn broken_json_keeps_previous_jobs() {
        let mut w = watcher();
        w.apply(VALID).await;
        assert_eq!(w.job_count(), 2);

        w.apply("{ not json").await;
        assert_eq!(w.job_count(), 2);
    }

    #[tokio::test]
    async fn invalid_policy_keeps_previous_jobs() {
        let mut w = watcher();
        w.apply(VALID).await;
        assert_eq!(w.job_count(), 2);

        let bad = VALID.replace("America/Sao_Paulo", "UTC");
        w.apply(&bad).await;
        assert_eq!(w.job_count(), 2);
    }
}
