use std::sync::Arc;

use tracing::{error, info, warn};

use offpeak_core::policy::ScalingPolicy;
use offpeak_scaling::ScalerRegistry;
use offpeak_store::ScalingStore;

use crate::error::{Result, ScheduleError};
use crate::manager::JobSet;
use crate::validate::validate_policy;

/// Drives one policy document into the live job set.
///
/// Reconciliations are serialized through `&mut self`; the caller decides
/// when a new document warrants a run.
pub struct Reconciler {
    registry: Arc<ScalerRegistry>,
    store: Option<Arc<dyn ScalingStore>>,
    jobs: JobSet,
}

impl Reconciler {
    pub fn new(registry: Arc<ScalerRegistry>, store: Option<Arc<dyn ScalingStore>>) -> Self {
        Self {
            registry,
            store,
            jobs: JobSet::new(),
        }
    }

    pub fn job_count(&self) -> usize {
        self.jobs.entry_count()
    }

    /// Validate, make sure the store schema exists, then rebuild the job set.
    ///
    /// A rejected policy leaves the previous job set running untouched. A
    /// failed schema bootstrap is logged but does not block the rebuild; the
    /// scalers surface store errors per firing.
    pub async fn reconcile(&mut self, policy: &ScalingPolicy) -> Result<()> {
        let problems = validate_policy(policy);
        if !problems.is_empty() {
            for problem in &problems {
                warn!(policy = %policy.name, "{problem}");
            }
            return Err(ScheduleError::PolicyRejected(problems.len()));
        }

        if let Some(store) = &self.store {
            if let Err(e) = store.bootstrap().await {
                error!(error = %e, "store bootstrap failed, continuing without schema guarantee");
            }
        }

        self.jobs
            .rebuild(policy, Arc::clone(&self.registry))
            .await?;
        info!(
            policy = %policy.name,
            jobs = self.jobs.entry_count(),
            "policy reconciled"
        );
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.jobs.reset().await
    }
}
