//! `offpeak-scaling` — per-kind workload scalers and their dispatch registry.
//!
//! A [`scaler::KindScaler`] drives one workload kind in one namespace per
//! invocation: list, remember or restore replica counts through the store,
//! patch. The [`registry::ScalerRegistry`] maps kind tags to scalers and is
//! built once per process, shared read-only across all job firings.

pub mod error;
pub mod registry;
pub mod scaler;

pub use error::{Result, ScalingError};
pub use registry::ScalerRegistry;
pub use scaler::{KindScaler, ResourceScaler, SelfReference};
