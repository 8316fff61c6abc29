//! `offpeak-scheduler` — rule compilation and the live job set.
//!
//! Translates a scaling policy into recurring timer jobs: two per
//! (rule, namespace) pair, one upscale and one downscale, in the policy's
//! timezone. Every reconfiguration tears the previous set down completely
//! (timer, jobs, background notifier) before building the next one, so jobs
//! from a superseded policy can never keep firing alongside new ones.

pub mod error;
pub mod expression;
pub mod manager;
pub mod reconciler;
pub mod validate;

pub use error::{Result, ScheduleError};
pub use manager::JobSet;
pub use reconciler::Reconciler;
pub use validate::{validate_policy, FieldError};
