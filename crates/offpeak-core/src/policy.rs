use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::ResourceKind;

/// The declarative scaling policy the operator watches. Field names mirror
/// the cluster resource's camelCase wire form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingPolicy {
    /// Resource name. Also identifies the operator's own workload for the
    /// self-reference deferral.
    pub name: String,
    pub spec: PolicySpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySpec {
    #[serde(default)]
    pub config: RuntimeConfig,
    #[serde(default)]
    pub schedule: ScheduleSpec,
    #[serde(default)]
    pub options: ScalingOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Seconds between background job-listing log lines. Values <= 0 fall
    /// back to 300.
    #[serde(default)]
    pub cron_logger_interval: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSpec {
    /// IANA zone name, `Region/City`.
    #[serde(default)]
    pub time_zone: String,
    /// `"*"`, `"@daily"`, or a verbatim day-of-week token.
    #[serde(default = "default_recurrence")]
    pub recurrence: String,
}

impl Default for ScheduleSpec {
    fn default() -> Self {
        Self {
            time_zone: String::new(),
            recurrence: default_recurrence(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalingOptions {
    /// Kinds scaled when a rule carries no override.
    #[serde(default)]
    pub resource_scaling: Vec<ResourceKind>,
    pub time_rules: Option<TimeRules>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeRules {
    pub rules: Vec<Rule>,
}

/// One named schedule binding namespaces to an up/down time pair. Rules are
/// replaced wholesale on every reconfiguration, never edited in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub name: String,
    pub namespaces: Vec<String>,
    /// `HH:MM` or `HH:MM:SS`.
    pub upscale_time: String,
    pub downscale_time: String,
    /// When non-empty, restricts this rule to exactly these kinds.
    #[serde(default)]
    pub override_scaling: Vec<ResourceKind>,
}

impl Rule {
    pub fn applies_to(&self, namespace: &str) -> bool {
        self.namespaces.iter().any(|ns| ns == namespace)
    }
}

fn default_recurrence() -> String {
    "@daily".to_string()
}

impl ScalingPolicy {
    /// Parse a policy document from its JSON wire form.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// All rules, or an empty slice when the timeRules block is absent.
    pub fn rules(&self) -> &[Rule] {
        self.spec
            .options
            .time_rules
            .as_ref()
            .map(|tr| tr.rules.as_slice())
            .unwrap_or(&[])
    }

    pub fn default_kinds(&self) -> &[ResourceKind] {
        &self.spec.options.resource_scaling
    }

    pub fn recurrence(&self) -> &str {
        &self.spec.schedule.recurrence
    }

    pub fn time_zone(&self) -> &str {
        &self.spec.schedule.time_zone
    }

    pub fn cron_logger_interval(&self) -> i64 {
        self.spec.config.cron_logger_interval
    }
}
