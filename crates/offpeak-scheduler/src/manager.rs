use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};
use uuid::Uuid;

use offpeak_core::policy::{Rule, ScalingPolicy};
use offpeak_core::types::{Operation, ResourceKind};
use offpeak_scaling::ScalerRegistry;

use crate::error::{Result, ScheduleError};
use crate::expression::build_cron_expression;

/// Notifier cadence when the policy leaves cronLoggerInterval unset or
/// non-positive.
const DEFAULT_NOTIFY_SECS: i64 = 300;

/// What a registered job is for; kept alongside the timer's job id for the
/// notifier and for inspection.
#[derive(Debug, Clone)]
pub struct EntryMeta {
    pub rule_description: String,
    pub namespace: String,
    pub operation: Operation,
}

/// Everything a firing needs, captured at build time. A rebuild swaps the
/// whole context, so in-flight firings keep seeing the policy they were
/// compiled from.
struct FireContext {
    policy: ScalingPolicy,
    registry: Arc<ScalerRegistry>,
}

impl FireContext {
    /// One job firing: resolve the applicable kinds for every rule matching
    /// this namespace and dispatch each kind independently.
    async fn fire(&self, namespace: &str, operation: Operation) {
        for rule in self.policy.rules() {
            if !rule.applies_to(namespace) {
                continue;
            }
            let kinds: &[ResourceKind] = if rule.override_scaling.is_empty() {
                self.policy.default_kinds()
            } else {
                &rule.override_scaling
            };
            self.registry
                .dispatch(kinds, &rule.name, namespace, operation)
                .await;
        }
    }
}

/// The live job set. Idle (no timer, no jobs) until the first successful
/// rebuild; Active (timer running, notifier running) afterwards.
///
/// Not safe to rebuild concurrently with itself — callers hold `&mut self`,
/// which makes the serialization a compile-time fact.
pub struct JobSet {
    timer: Option<JobScheduler>,
    entries: HashMap<Uuid, EntryMeta>,
    notifier_stop: Option<watch::Sender<bool>>,
    notifier: Option<JoinHandle<()>>,
}

impl Default for JobSet {
    fn default() -> Self {
        Self::new()
    }
}

impl JobSet {
    pub fn new() -> Self {
        Self {
            timer: None,
            entries: HashMap::new(),
            notifier_stop: None,
            notifier: None,
        }
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Uuid, &EntryMeta)> {
        self.entries.iter()
    }

    /// Tear down the Active state: stop the notifier (and wait for it, so it
    /// can never log against discarded jobs), shut the timer down, drop all
    /// entries. A reset of an Idle set is a no-op.
    pub async fn reset(&mut self) -> Result<()> {
        if let Some(stop) = self.notifier_stop.take() {
            let _ = stop.send(true);
        }
        if let Some(handle) = self.notifier.take() {
            let _ = handle.await;
        }
        if let Some(mut timer) = self.timer.take() {
            timer.shutdown().await?;
        }
        self.entries.clear();
        Ok(())
    }

    /// Replace the job set with one compiled from `policy`.
    ///
    /// The timezone is resolved before anything is torn down: an unknown
    /// zone is a hard error that leaves the previous job set running, never
    /// a half-built one. In-flight firings are not cancelled; they finish
    /// against the context they captured.
    pub async fn rebuild(
        &mut self,
        policy: &ScalingPolicy,
        registry: Arc<ScalerRegistry>,
    ) -> Result<()> {
        let tz: Tz = policy
            .time_zone()
            .parse()
            .map_err(|_| ScheduleError::UnknownTimeZone(policy.time_zone().to_string()))?;

        self.reset().await?;

        let timer = JobScheduler::new().await?;
        let ctx = Arc::new(FireContext {
            policy: policy.clone(),
            registry,
        });

        for rule in policy.rules() {
            for namespace in &rule.namespaces {
                self.register(&timer, &ctx, tz, policy.recurrence(), rule, namespace, Operation::Upscale)
                    .await;
                self.register(&timer, &ctx, tz, policy.recurrence(), rule, namespace, Operation::Downscale)
                    .await;
            }
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let notifier = tokio::spawn(notify_entries(
            timer.clone(),
            self.entries.clone(),
            policy.cron_logger_interval(),
            stop_rx,
        ));

        // Stored before start so a start failure still has a tear-down path
        // for the timer and the just-spawned notifier.
        self.timer = Some(timer.clone());
        self.notifier_stop = Some(stop_tx);
        self.notifier = Some(notifier);

        if let Err(start_err) = timer.start().await {
            if let Err(e) = self.reset().await {
                error!(error = %e, "teardown after failed timer start also failed");
            }
            return Err(start_err.into());
        }
        Ok(())
    }

    /// Compile and register one job. Registration failures are logged and
    /// skipped — sibling rules still get their jobs.
    #[allow(clippy::too_many_arguments)]
    async fn register(
        &mut self,
        timer: &JobScheduler,
        ctx: &Arc<FireContext>,
        tz: Tz,
        recurrence: &str,
        rule: &Rule,
        namespace: &str,
        operation: Operation,
    ) {
        let time_str = match operation {
            Operation::Upscale => &rule.upscale_time,
            Operation::Downscale => &rule.downscale_time,
        };
        let expression = build_cron_expression(recurrence, time_str, &rule.name);

        let fire_ctx = Arc::clone(ctx);
        let ns = namespace.to_string();
        let job = match Job::new_async_tz(expression.as_str(), tz, move |_id, _timer| {
            let ctx = Arc::clone(&fire_ctx);
            let namespace = ns.clone();
            Box::pin(async move {
                ctx.fire(&namespace, operation).await;
            })
        }) {
            Ok(job) => job,
            Err(e) => {
                error!(
                    rule = %rule.name,
                    namespace,
                    %operation,
                    %expression,
                    error = %e,
                    "job compilation failed, rule entry skipped"
                );
                return;
            }
        };

        match timer.add(job).await {
            Ok(id) => {
                self.entries.insert(
                    id,
                    EntryMeta {
                        rule_description: rule.name.clone(),
                        namespace: namespace.to_string(),
                        operation,
                    },
                );
                info!(
                    job_id = %id,
                    rule = %rule.name,
                    namespace,
                    %operation,
                    %expression,
                    "job registered"
                );
            }
            Err(e) => {
                error!(
                    rule = %rule.name,
                    namespace,
                    %operation,
                    error = %e,
                    "job registration failed"
                );
            }
        }
    }
}

/// Observational background task: periodically logs every registered job and
/// its next fire time. Exits on the watch signal, which [`JobSet::reset`]
/// awaits, so it never outlives the job set it describes.
async fn notify_entries(
    mut timer: JobScheduler,
    entries: HashMap<Uuid, EntryMeta>,
    interval_secs: i64,
    mut stop: watch::Receiver<bool>,
) {
    let secs = if interval_secs <= 0 {
        DEFAULT_NOTIFY_SECS
    } else {
        interval_secs
    } as u64;

    let mut ticker = tokio::time::interval(Duration::from_secs(secs));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for (id, meta) in &entries {
                    let next_run = match timer.next_tick_for_job(*id).await {
                        Ok(next) => next,
                        Err(e) => {
                            warn!(job_id = %id, error = %e, "next fire time unavailable");
                            None
                        }
                    };
                    info!(
                        job_id = %id,
                        rule = %meta.rule_description,
                        namespace = %meta.namespace,
                        operation = %meta.operation,
                        next_run = ?next_run,
                        "scheduled job"
                    );
                }
            }
            changed = stop.changed() => {
                // A closed channel means the owning job set is gone.
                if changed.is_err() || *stop.borrow() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offpeak_cluster::fake::FakeCluster;
    use offpeak_core::config::ScalingDefaults;
    use offpeak_core::policy::{
        PolicySpec, RuntimeConfig, ScalingOptions, ScheduleSpec, TimeRules,
    };
    use offpeak_core::types::Workload;

    fn registry() -> Arc<ScalerRegistry> {
        Arc::new(ScalerRegistry::new(
            Arc::new(FakeCluster::default()),
            None,
            ScalingDefaults::default(),
            None,
        ))
    }

    fn rule(name: &str, namespaces: &[&str], up: &str, down: &str) -> Rule {
        Rule {
            name: name.to_string(),
            namespaces: namespaces.iter().map(|s| s.to_string()).collect(),
            upscale_time: up.to_string(),
            downscale_time: down.to_string(),
            override_scaling: Vec::new(),
        }
    }

    fn policy(time_zone: &str, rules: Vec<Rule>) -> ScalingPolicy {
        ScalingPolicy {
            name: "offpeak".to_string(),
            spec: PolicySpec {
                config: RuntimeConfig {
                    cron_logger_interval: 60,
                },
                schedule: ScheduleSpec {
                    time_zone: time_zone.to_string(),
                    recurrence: "@daily".to_string(),
                },
                options: ScalingOptions {
                    resource_scaling: vec![ResourceKind::Deployment],
                    time_rules: Some(TimeRules { rules }),
                },
            },
        }
    }

    #[tokio::test]
    async fn two_jobs_per_rule_namespace_pair() {
        let mut jobs = JobSet::new();
        let p = policy(
            "America/Sao_Paulo",
            vec![rule("nightly", &["ns-a", "ns-b"], "08:00:00", "18:00:00")],
        );

        jobs.rebuild(&p, registry()).await.unwrap();
        assert_eq!(jobs.entry_count(), 4);

        let upscales = jobs
            .entries()
            .filter(|(_, m)| m.operation == Operation::Upscale)
            .count();
        assert_eq!(upscales, 2);

        jobs.reset().await.unwrap();
        assert_eq!(jobs.entry_count(), 0);
    }

    #[tokio::test]
    async fn rebuild_does_not_accumulate_jobs() {
        let mut jobs = JobSet::new();
        let p = policy(
            "America/Sao_Paulo",
            vec![rule("nightly", &["ns-a"], "08:00", "18:00")],
        );

        jobs.rebuild(&p, registry()).await.unwrap();
        assert_eq!(jobs.entry_count(), 2);

        jobs.rebuild(&p, registry()).await.unwrap();
        assert_eq!(jobs.entry_count(), 2);

        jobs.reset().await.unwrap();
    }

    #[tokio::test]
    async fn malformed_time_does_not_block_sibling_rules() {
        let mut jobs = JobSet::new();
        let p = policy(
            "America/Sao_Paulo",
            vec![
                rule("broken", &["ns-a"], "08:00", "not-a-time"),
                rule("fine", &["ns-b"], "07:30", "19:45:00"),
            ],
        );

        jobs.rebuild(&p, registry()).await.unwrap();
        // The malformed downscale time got the midnight fallback, so all
        // four entries still exist.
        assert_eq!(jobs.entry_count(), 4);
        assert!(jobs
            .entries()
            .any(|(_, m)| m.rule_description == "fine" && m.namespace == "ns-b"));

        jobs.reset().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_time_zone_keeps_previous_job_set() {
        let mut jobs = JobSet::new();
        let good = policy(
            "America/Sao_Paulo",
            vec![rule("nightly", &["ns-a"], "08:00", "18:00")],
        );
        jobs.rebuild(&good, registry()).await.unwrap();
        assert_eq!(jobs.entry_count(), 2);

        let bad = policy(
            "Nowhere/Invalid",
            vec![rule("nightly", &["ns-a"], "08:00", "18:00")],
        );
        let err = jobs.rebuild(&bad, registry()).await.unwrap_err();
        assert!(matches!(err, ScheduleError::UnknownTimeZone(_)));
        assert_eq!(jobs.entry_count(), 2);

        jobs.reset().await.unwrap();
    }

    #[tokio::test]
    async fn rule_override_restricts_the_fired_kinds() {
        let client = Arc::new(FakeCluster::new(vec![
            Workload {
                namespace: "ns-a".to_string(),
                name: "web".to_string(),
                kind: ResourceKind::Deployment,
                replicas: 5,
            },
            Workload {
                namespace: "ns-a".to_string(),
                name: "db".to_string(),
                kind: ResourceKind::StatefulSet,
                replicas: 3,
            },
        ]));
        let registry = Arc::new(ScalerRegistry::new(
            Arc::clone(&client) as Arc<dyn offpeak_cluster::ClusterClient>,
            None,
            ScalingDefaults::default(),
            None,
        ));

        let mut p = policy(
            "America/Sao_Paulo",
            vec![rule("nightly", &["ns-a"], "08:00", "18:00")],
        );
        // Default kinds include deployments; the override narrows the rule
        // to statefulsets only.
        p.spec.options.resource_scaling =
            vec![ResourceKind::Deployment, ResourceKind::StatefulSet];
        if let Some(tr) = p.spec.options.time_rules.as_mut() {
            tr.rules[0].override_scaling = vec![ResourceKind::StatefulSet];
        }

        let ctx = FireContext {
            policy: p,
            registry,
        };
        ctx.fire("ns-a", Operation::Downscale).await;

        assert_eq!(client.replicas("ns-a", "web", ResourceKind::Deployment), Some(5));
        assert_eq!(client.replicas("ns-a", "db", ResourceKind::StatefulSet), Some(0));
    }

    #[tokio::test]
    async fn reset_of_idle_set_is_a_noop() {
        let mut jobs = JobSet::new();
        jobs.reset().await.unwrap();
        assert_eq!(jobs.entry_count(), 0);
    }

    #[tokio::test]
    async fn notifier_exits_when_its_stop_sender_is_dropped() {
        let timer = JobScheduler::new().await.unwrap();
        let (stop_tx, stop_rx) = watch::channel(false);
        // Dropping the sender without signalling models a job set torn down
        // without a reset; the notifier must still exit.
        drop(stop_tx);

        let handle = tokio::spawn(notify_entries(timer, HashMap::new(), 60, stop_rx));
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("notifier kept running after its stop channel closed")
            .unwrap();
    }
}
