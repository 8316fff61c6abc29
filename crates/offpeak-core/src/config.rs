use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Operator process configuration (offpeak.toml + OFFPEAK_* env overrides).
///
/// This is distinct from the [`crate::policy::ScalingPolicy`] document: the
/// policy says *what* to scale and when, this says how the process itself is
/// wired (store driver, policy file location, scaling bounds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorConfig {
    #[serde(default)]
    pub policy: PolicySourceConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub scaling: ScalingDefaults,
    /// Name of the operator's own workload, for the self-reference deferral.
    /// Defaults to the policy document's name when unset.
    #[serde(default)]
    pub selfname: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySourceConfig {
    /// Path of the JSON policy document to watch.
    #[serde(default = "default_policy_path")]
    pub path: String,
    /// Seconds between change polls.
    #[serde(default = "default_poll_secs")]
    pub poll: u64,
}

impl Default for PolicySourceConfig {
    fn default() -> Self {
        Self {
            path: default_policy_path(),
            poll: default_poll_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreDriver {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// When false, no replica counts are remembered and upscale always
    /// restores the fixed default.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_driver")]
    pub driver: StoreDriver,
    /// SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Postgres connection string, required when driver = "postgres".
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            driver: default_driver(),
            path: default_db_path(),
            url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScalingDefaults {
    /// Downscale patch target (autoscalers are clamped to a floor of 1).
    #[serde(default)]
    pub floor: i32,
    /// Upscale target when no record is available.
    #[serde(default = "default_restore")]
    pub restore: i32,
}

impl Default for ScalingDefaults {
    fn default() -> Self {
        Self {
            floor: 0,
            restore: default_restore(),
        }
    }
}

fn default_policy_path() -> String {
    "offpeak.policy.json".to_string()
}
fn default_poll_secs() -> u64 {
    30
}
fn default_driver() -> StoreDriver {
    StoreDriver::Sqlite
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.offpeak/offpeak.db")
}
fn default_restore() -> i32 {
    1
}

impl OperatorConfig {
    /// Load config from a TOML file with OFFPEAK_* env var overrides.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path.unwrap_or("offpeak.toml");

        let config: OperatorConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("OFFPEAK_").split("_"))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;

        Ok(config)
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            policy: PolicySourceConfig::default(),
            persistence: PersistenceConfig::default(),
            scaling: ScalingDefaults::default(),
            selfname: None,
        }
    }
}
