//! `offpeak-core` — shared types for the offpeak workload scaler.
//!
//! Holds the scaling policy document model, the operation/kind tags shared by
//! every other crate, and the operator's own configuration (TOML file +
//! `OFFPEAK_*` env overrides).

pub mod config;
pub mod error;
pub mod policy;
pub mod types;

pub use config::OperatorConfig;
pub use error::{CoreError, Result};
pub use policy::{Rule, ScalingPolicy};
pub use types::{Operation, ResourceKind, Workload};
