use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScalingError {
    #[error(transparent)]
    Cluster(#[from] offpeak_cluster::ClusterError),

    #[error(transparent)]
    Store(#[from] offpeak_store::StoreError),
}

pub type Result<T> = std::result::Result<T, ScalingError>;
