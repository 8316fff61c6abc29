use serde::{Deserialize, Serialize};

/// The two scheduled operations. Each (rule, namespace) pair produces exactly
/// one job of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Drive replicas down to the configured floor, remembering the current
    /// count when persistence is enabled.
    Downscale,
    /// Restore replicas from the remembered count, or a fixed default.
    Upscale,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Operation::Downscale => "downscale",
            Operation::Upscale => "upscale",
        };
        write!(f, "{s}")
    }
}

/// Closed set of workload kinds the scaler knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "deployments")]
    Deployment,
    #[serde(rename = "statefulsets")]
    StatefulSet,
    #[serde(rename = "horizontalpodautoscalers")]
    HorizontalPodAutoscaler,
}

impl ResourceKind {
    /// Every kind, in registry order.
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Deployment,
        ResourceKind::StatefulSet,
        ResourceKind::HorizontalPodAutoscaler,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Deployment => "deployments",
            ResourceKind::StatefulSet => "statefulsets",
            ResourceKind::HorizontalPodAutoscaler => "horizontalpodautoscalers",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "deployments" => Ok(ResourceKind::Deployment),
            "statefulsets" => Ok(ResourceKind::StatefulSet),
            "horizontalpodautoscalers" => Ok(ResourceKind::HorizontalPodAutoscaler),
            other => Err(format!("unknown resource kind: {other}")),
        }
    }
}

/// Point-in-time view of one scalable object, as returned by the cluster
/// client. `replicas` is the spec'd count (minReplicas for autoscalers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    pub namespace: String,
    pub name: String,
    pub kind: ResourceKind,
    pub replicas: i32,
}
