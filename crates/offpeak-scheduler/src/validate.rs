use offpeak_core::policy::ScalingPolicy;

/// One syntactic problem with the policy document, addressed by field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

impl FieldError {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Syntactic gate in front of the job-set rebuild. Collects every problem
/// rather than stopping at the first, so one log pass shows the operator the
/// whole repair list.
pub fn validate_policy(policy: &ScalingPolicy) -> Vec<FieldError> {
    let mut errors = Vec::new();

    let tz = policy.time_zone();
    if tz.is_empty() || !tz.contains('/') {
        errors.push(FieldError::new(
            "spec.schedule.timeZone",
            "expected an IANA 'Region/City' zone",
        ));
    }

    let Some(time_rules) = policy.spec.options.time_rules.as_ref() else {
        errors.push(FieldError::new(
            "spec.options.timeRules",
            "timeRules block is missing",
        ));
        return errors;
    };

    if time_rules.rules.is_empty() {
        errors.push(FieldError::new(
            "spec.options.timeRules.rules",
            "at least one rule is required",
        ));
        return errors;
    }

    for (index, rule) in time_rules.rules.iter().enumerate() {
        let base = format!("spec.options.timeRules.rules[{index}]");

        if rule.namespaces.is_empty() {
            errors.push(FieldError::new(
                format!("{base}.namespaces"),
                "namespace list cannot be empty",
            ));
        }
        if !rule.upscale_time.contains(':') {
            errors.push(FieldError::new(
                format!("{base}.upscaleTime"),
                "expected HH:MM or HH:MM:SS",
            ));
        }
        if !rule.downscale_time.contains(':') {
            errors.push(FieldError::new(
                format!("{base}.downscaleTime"),
                "expected HH:MM or HH:MM:SS",
            ));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use offpeak_core::policy::{
        PolicySpec, Rule, RuntimeConfig, ScalingOptions, ScheduleSpec, TimeRules,
    };

    fn policy_with(time_zone: &str, rules: Vec<Rule>) -> ScalingPolicy {
        ScalingPolicy {
            name: "offpeak".to_string(),
            spec: PolicySpec {
                config: RuntimeConfig::default(),
                schedule: ScheduleSpec {
                    time_zone: time_zone.to_string(),
                    recurrence: "@daily".to_string(),
                },
                options: ScalingOptions {
                    resource_scaling: Vec::new(),
                    time_rules: Some(TimeRules { rules }),
                },
            },
        }
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

    #[test]
    fn well_formed_policy_passes() {
        let policy = policy_with(
            "America/Sao_Paulo",
            vec![rule("nightly", &["ns-a"], "08:00", "18:00:00")],
        );
        assert!(validate_policy(&policy).is_empty());
    }

    #[test]
    fn city_less_zone_is_rejected() {
        let policy = policy_with("UTC", vec![rule("nightly", &["ns-a"], "08:00", "18:00")]);
        let errors = validate_policy(&policy);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "spec.schedule.timeZone");
    }

    #[test]
    fn missing_time_rules_block_is_reported() {
        let mut policy = policy_with("America/Sao_Paulo", Vec::new());
        policy.spec.options.time_rules = None;
        let errors = validate_policy(&policy);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "spec.options.timeRules");
    }

    #[test]
    fn every_rule_problem_is_collected() {
        let policy = policy_with(
            "",
            vec![
                rule("no-namespaces", &[], "08:00", "18:00"),
                rule("bad-times", &["ns-a"], "8am", "6pm"),
            ],
        );
        let errors = validate_policy(&policy);
        let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "spec.schedule.timeZone",
                "spec.options.timeRules.rules[0].namespaces",
                "spec.options.timeRules.rules[1].upscaleTime",
                "spec.options.timeRules.rules[1].downscaleTime",
            ]
        );
    }
}
