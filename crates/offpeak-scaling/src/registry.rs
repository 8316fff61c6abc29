use std::collections::HashMap;
use std::sync::Arc;

use tracing::error;

use offpeak_cluster::ClusterClient;
use offpeak_core::config::ScalingDefaults;
use offpeak_core::types::{Operation, ResourceKind};
use offpeak_store::ScalingStore;

use crate::scaler::{KindScaler, ResourceScaler, SelfReference};

/// Static mapping from kind tag to scaler, built once per process and shared
/// read-only across every job firing.
pub struct ScalerRegistry {
    scalers: HashMap<ResourceKind, Arc<dyn ResourceScaler>>,
}

impl ScalerRegistry {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        store: Option<Arc<dyn ScalingStore>>,
        defaults: ScalingDefaults,
        self_ref: Option<SelfReference>,
    ) -> Self {
        let mut scalers: HashMap<ResourceKind, Arc<dyn ResourceScaler>> = HashMap::new();
        for kind in ResourceKind::ALL {
            scalers.insert(
                kind,
                Arc::new(KindScaler::new(
                    kind,
                    Arc::clone(&client),
                    store.clone(),
                    defaults,
                    self_ref.clone(),
                )),
            );
        }
        Self { scalers }
    }

    pub fn resolve(&self, kind: ResourceKind) -> Option<&Arc<dyn ResourceScaler>> {
        self.scalers.get(&kind)
    }

    /// Run one firing against every applicable kind. Kinds are independent:
    /// a failing scaler is logged and the remaining kinds still run.
    pub async fn dispatch(
        &self,
        kinds: &[ResourceKind],
        rule_description: &str,
        namespace: &str,
        operation: Operation,
    ) {
        for kind in kinds {
            let Some(scaler) = self.resolve(*kind) else {
                error!(%kind, "no scaler registered for resource kind");
                continue;
            };
            if let Err(e) = scaler.run(rule_description, namespace, operation).await {
                error!(
                    rule = rule_description,
                    namespace,
                    %kind,
                    %operation,
                    error = %e,
                    "scaling failed"
                );
            }
        }
    }
}
